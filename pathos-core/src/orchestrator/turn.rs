//! Turn request, result, and wire response types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One user message addressed to a session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnRequest {
    /// Existing session to continue; absent or unknown ids start a new session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    pub user_message: String,

    /// Overrides the stored affect as this turn's "previous affect" input
    #[serde(default, alias = "affect", skip_serializing_if = "Option::is_none")]
    pub hint_affect: Option<String>,

    /// Overrides the stored expression as the previous-expression hint, if valid
    #[serde(default, alias = "avatar_state", skip_serializing_if = "Option::is_none")]
    pub hint_expression: Option<String>,

    /// Webcam frame, bare base64 or a `data:` URL, described before the reply
    #[serde(default, alias = "image", skip_serializing_if = "Option::is_none")]
    pub image_b64: Option<String>,
}

impl TurnRequest {
    pub fn new(user_message: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            ..Default::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_hint_affect(mut self, affect: impl Into<String>) -> Self {
        self.hint_affect = Some(affect.into());
        self
    }

    pub fn with_hint_expression(mut self, expression: impl Into<String>) -> Self {
        self.hint_expression = Some(expression.into());
        self
    }

    pub fn with_image(mut self, image_b64: impl Into<String>) -> Self {
        self.image_b64 = Some(image_b64.into());
        self
    }
}

/// Per-stage wall-clock timings of a turn, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnTiming {
    /// Zero when the turn carried no frame
    pub observation_call_ms: u64,
    pub affect_call_ms: u64,
    pub reply_call_ms: u64,
    pub expression_call_ms: u64,
    pub total_ms: u64,
}

impl TurnTiming {
    pub(crate) fn from_durations(
        observation: Duration,
        affect: Duration,
        reply: Duration,
        expression: Duration,
        total: Duration,
    ) -> Self {
        Self {
            observation_call_ms: observation.as_millis() as u64,
            affect_call_ms: affect.as_millis() as u64,
            reply_call_ms: reply.as_millis() as u64,
            expression_call_ms: expression.as_millis() as u64,
            total_ms: total.as_millis() as u64,
        }
    }
}

/// How the expression label was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionOutcome {
    /// The model named a valid candidate
    Matched,
    /// The model answered with something outside the set
    Unmatched,
    /// The expression call itself failed
    CallFailed,
}

/// What happened to the turn's camera frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationOutcome {
    /// No usable frame was sent
    #[default]
    NotRequested,
    /// The frame was described and fed to the reply
    Described,
    /// The observation call failed; the reply went ahead without it
    CallFailed,
}

/// Which stages fell back instead of using model output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOutcomes {
    pub observation: ObservationOutcome,
    pub affect_fallback: bool,
    pub reply_fallback: bool,
    pub expression: ExpressionOutcome,
}

impl TurnOutcomes {
    /// True if every stage used model output as-is
    pub fn is_clean(&self) -> bool {
        self.observation != ObservationOutcome::CallFailed
            && !self.affect_fallback
            && !self.reply_fallback
            && self.expression == ExpressionOutcome::Matched
    }
}

/// Everything a completed turn produced. Built once, never modified.
#[derive(Debug, Clone, Serialize)]
pub struct TurnResult {
    pub session_id: String,
    pub reply: String,
    pub affect_state: String,
    pub expression_state: String,
    /// Description of the turn's camera frame, if one was made
    pub observation: Option<String>,
    /// Session history length after commit
    pub num_messages: usize,
    pub timing: TurnTiming,
    pub outcomes: TurnOutcomes,
}

impl TurnResult {
    /// Wire shape returned to clients
    pub fn to_response(&self) -> TurnResponse {
        TurnResponse {
            session_id: self.session_id.clone(),
            reply: self.reply.clone(),
            expression_state: self.expression_state.clone(),
            debug: TurnDebug {
                session_id: self.session_id.clone(),
                num_messages: self.num_messages,
                affect_state: self.affect_state.clone(),
                expression_state: self.expression_state.clone(),
                use_vision: self.observation.is_some(),
                vision_text: self.observation.clone().unwrap_or_default(),
                vision_ms: self.timing.observation_call_ms,
                affect_call_ms: self.timing.affect_call_ms,
                reply_call_ms: self.timing.reply_call_ms,
                expression_call_ms: self.timing.expression_call_ms,
                total_ms: self.timing.total_ms,
            },
        }
    }
}

/// Debug block of a turn response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnDebug {
    pub session_id: String,
    pub num_messages: usize,
    pub affect_state: String,
    pub expression_state: String,
    pub use_vision: bool,
    pub vision_text: String,
    pub vision_ms: u64,
    pub affect_call_ms: u64,
    pub reply_call_ms: u64,
    pub expression_call_ms: u64,
    pub total_ms: u64,
}

/// Response body for one turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnResponse {
    pub session_id: String,
    pub reply: String,
    pub expression_state: String,
    pub debug: TurnDebug,
}
