//! Message History Management

use serde::{Deserialize, Serialize};

use crate::llm::{Message, MessageRole};

/// Ordered message log for one conversation.
///
/// Messages are only ever appended as a user/assistant pair, so the log always has
/// even length and alternates roles starting with the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageHistory {
    messages: Vec<Message>,
}

impl MessageHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Append one exchange
    pub fn push_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.messages.push(Message::user(user));
        self.messages.push(Message::assistant(assistant));
    }

    /// All messages in insertion order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if history is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The last `n` messages (oldest dropped first).
    ///
    /// The window never starts on an assistant message, so an odd `n` yields `n - 1`
    /// messages rather than a reply without its question.
    pub fn recent(&self, n: usize) -> &[Message] {
        let mut start = self.messages.len().saturating_sub(n);
        if self
            .messages
            .get(start)
            .is_some_and(|m| m.role == MessageRole::Assistant)
        {
            start += 1;
        }
        &self.messages[start..]
    }

    /// Drop the oldest exchanges until at most `max` messages remain.
    ///
    /// Returns the number of messages removed.
    pub fn trim_to(&mut self, max: usize) -> usize {
        if self.messages.len() <= max {
            return 0;
        }
        let excess = self.messages.len() - max;
        // round up to a whole exchange
        let remove = excess + (excess % 2);
        let remove = remove.min(self.messages.len());
        self.messages.drain(..remove);
        remove
    }
}
