//! Error types for Pathos operations

use std::time::Duration;

/// Result type for Pathos operations
pub type Result<T> = std::result::Result<T, PathosError>;

/// Error types for the turn orchestrator
#[derive(Debug, thiserror::Error)]
pub enum PathosError {
    /// The inference service could not be reached or answered with an error status
    #[error("Inference unavailable: {0}")]
    InferenceUnavailable(String),

    /// An inference call exceeded its deadline
    #[error("Inference timed out after {0:?}")]
    InferenceTimeout(Duration),

    /// The user message was empty (rejected before any state is touched)
    #[error("User message is empty")]
    EmptyMessage,

    /// The turn could not produce a usable result; session state was left untouched
    #[error("Turn failed (affect: {affect}; reply: {reply})")]
    TurnFailed { affect: String, reply: String },

    /// The camera-frame observation failed while errors are configured to surface
    #[error("Observation failed: {0}")]
    ObservationFailed(String),

    /// The candidate expression set is malformed
    #[error("Invalid expression set: {0}")]
    InvalidExpressionSet(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl PathosError {
    /// Whether this error came from the inference boundary (and is eligible for fallback)
    pub fn is_inference_failure(&self) -> bool {
        matches!(
            self,
            PathosError::InferenceUnavailable(_) | PathosError::InferenceTimeout(_)
        )
    }
}

impl From<String> for PathosError {
    fn from(s: String) -> Self {
        PathosError::Other(s)
    }
}

impl From<&str> for PathosError {
    fn from(s: &str) -> Self {
        PathosError::Other(s.to_string())
    }
}
