//! Conversation Session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::Message;

use super::history::MessageHistory;

/// Session metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// When the session last committed a turn
    pub updated_at: DateTime<Utc>,
    /// Total committed turn count
    pub turn_count: usize,
}

impl SessionMetadata {
    /// Create new metadata
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            turn_count: 0,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for SessionMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a turn writes back in one step
#[derive(Debug, Clone)]
pub(crate) struct TurnCommit {
    pub user_message: String,
    pub reply: String,
    pub affect_state: String,
    pub expression_state: String,
}

/// Per-conversation state.
///
/// Readable by anyone holding the session; only the turn pipeline inside this crate can
/// change it, and only through [`Session::commit`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    id: String,
    history: MessageHistory,
    affect_state: String,
    expression_state: String,
    metadata: SessionMetadata,
}

impl Session {
    /// Create a fresh session
    pub fn new(
        id: impl Into<String>,
        default_affect: impl Into<String>,
        default_expression: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            history: MessageHistory::new(),
            affect_state: default_affect.into(),
            expression_state: default_expression.into(),
            metadata: SessionMetadata::new(),
        }
    }

    /// Get session ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Latest affect label
    pub fn affect_state(&self) -> &str {
        &self.affect_state
    }

    /// Latest expression label
    pub fn expression_state(&self) -> &str {
        &self.expression_state
    }

    /// Get message history
    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    /// Messages in insertion order
    pub fn messages(&self) -> &[Message] {
        self.history.messages()
    }

    /// Get metadata
    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    /// Apply a finished turn.
    ///
    /// Appends the user message and reply, replaces both states, and then trims history to
    /// `max_stored_messages` if a cap is set. Returns the number of messages trimmed.
    pub(crate) fn commit(&mut self, turn: TurnCommit, max_stored_messages: Option<usize>) -> usize {
        self.history.push_exchange(turn.user_message, turn.reply);
        self.affect_state = turn.affect_state;
        self.expression_state = turn.expression_state;
        self.metadata.turn_count += 1;
        self.metadata.touch();

        match max_stored_messages {
            Some(max) => self.history.trim_to(max.max(2)),
            None => 0,
        }
    }
}
