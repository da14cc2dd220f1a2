//! # Pathos - Affect-Aware Dialogue Turns for Avatar Clinicians
//!
//! Pathos runs the turn pipeline behind a conversational clinician avatar:
//! - Optionally describes a webcam frame and folds the description into the persona
//! - Estimates the user's emotional state from each message, carried across turns
//! - Generates a short persona-constrained reply over a bounded history window
//! - Selects an avatar expression from a finite, externally supplied label set
//! - Keeps per-session state in a concurrent store with per-session locking
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pathos_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = PathosConfig::load()?;
//!     let orchestrator = TurnOrchestrator::from_config(&config)?;
//!
//!     let result = orchestrator
//!         .run_turn(TurnRequest::new("I haven't been sleeping well."))
//!         .await?;
//!     println!("[{}] {}", result.expression_state, result.reply);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Each turn runs affect estimation and reply generation concurrently, then expression
//! selection, then commits to the session in one step. Every model call goes through a
//! shared [`llm::InferenceClient`] that pools connections, enforces per-call deadlines,
//! and bounds how many calls are in flight across all sessions.
//!
//! ## Feature Flags
//!
//! - `llm-ollama` (default): HTTP provider for an Ollama-compatible chat endpoint

pub mod affect;
pub mod config;
pub mod conversation;
pub mod error;
pub mod expression;
pub mod llm;
pub mod observation;
pub mod orchestrator;
pub mod prompts;
pub mod reply;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::affect::AffectEstimator;
    pub use crate::config::{
        AffectFallback, ExpressionsConfig, FallbackConfig, InferenceConfig, InferenceProvider,
        PathosConfig, ServerConfig, SessionConfig,
    };
    pub use crate::conversation::{
        MessageHistory, Session, SessionEntry, SessionMetadata, SessionStore,
    };
    pub use crate::error::{PathosError, Result};
    pub use crate::expression::{CandidateExpressionSet, ExpressionSelector, Selection};
    pub use crate::llm::{
        CallKind, Inference, InferenceClient, InferenceOptions, LLMProvider, LLMRequest,
        LLMResponse, Message, MessageRole, ScriptedOutcome, ScriptedProvider,
    };
    pub use crate::observation::FrameObserver;
    pub use crate::orchestrator::{
        ExpressionOutcome, ObservationOutcome, TurnOrchestrator, TurnOutcomes, TurnPhase,
        TurnRequest, TurnResponse, TurnResult, TurnTiming,
    };
    pub use crate::prompts::PromptTemplates;
    pub use crate::reply::ReplyGenerator;

    #[cfg(feature = "llm-ollama")]
    pub use crate::llm::providers::OllamaProvider;
}
