//! Turn orchestration
//!
//! Runs one user message through the pipeline:
//!
//! ```text
//! RECEIVED -> [OBSERVATION] -> DUAL_INFERENCE -> EXPRESSION_SELECT -> COMMIT -> COMPLETE
//!     \             \                \                  \
//!      `-------------`----------------`------------------`--> FAILED
//! ```
//!
//! OBSERVATION runs only when the request carries a camera frame. Affect estimation and
//! reply generation run concurrently against the same snapshot of the session; expression
//! selection starts only when both have resolved. The session stays locked from RECEIVED
//! until COMMIT, so turns on one session never interleave.

mod turn;

pub use turn::{
    ExpressionOutcome, ObservationOutcome, TurnDebug, TurnOutcomes, TurnRequest, TurnResponse,
    TurnResult, TurnTiming,
};

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{Span, debug, info, instrument, warn};

use crate::affect::AffectEstimator;
use crate::config::{FallbackConfig, PathosConfig};
use crate::conversation::{SessionStore, TurnCommit};
use crate::error::{PathosError, Result};
use crate::expression::{CandidateExpressionSet, ExpressionSelector};
use crate::llm::{CallKind, Inference, InferenceClient};
use crate::observation::{FrameObserver, frame_payload};
use crate::reply::ReplyGenerator;

/// Stage of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Received,
    Observation,
    DualInference,
    ExpressionSelect,
    Commit,
    Complete,
    Failed,
}

impl TurnPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnPhase::Received => "received",
            TurnPhase::Observation => "observation",
            TurnPhase::DualInference => "dual_inference",
            TurnPhase::ExpressionSelect => "expression_select",
            TurnPhase::Commit => "commit",
            TurnPhase::Complete => "complete",
            TurnPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnPhase::Complete | TurnPhase::Failed)
    }

    /// Whether `next` is a legal successor of this phase
    pub fn can_advance_to(&self, next: TurnPhase) -> bool {
        use TurnPhase::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Received, Observation)
            | (Received, DualInference)
            | (Observation, DualInference)
            | (DualInference, ExpressionSelect)
            | (ExpressionSelect, Commit)
            | (Commit, Complete) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn advance(phase: &mut TurnPhase, next: TurnPhase) {
    debug_assert!(phase.can_advance_to(next), "{} -> {}", phase, next);
    debug!(from = %phase, to = %next, "Turn phase");
    *phase = next;
}

async fn timed<F: Future>(future: F) -> (F::Output, Duration) {
    let start = Instant::now();
    let output = future.await;
    (output, start.elapsed())
}

/// Blank model output counts as a failed call.
fn require_text(kind: CallKind, result: Result<Inference>) -> Result<Inference> {
    match result {
        Ok(inference) if inference.text.is_empty() => Err(PathosError::InferenceUnavailable(
            format!("{} call returned no text", kind),
        )),
        other => other,
    }
}

fn status<T>(result: &Result<T>) -> String {
    match result {
        Ok(_) => "ok".to_string(),
        Err(e) => e.to_string(),
    }
}

/// Coordinates the stages of a turn against the shared session store.
///
/// Share one orchestrator (behind an `Arc`) across all request handlers.
pub struct TurnOrchestrator {
    store: SessionStore,
    expressions: RwLock<Arc<CandidateExpressionSet>>,
    observer: FrameObserver,
    affect: AffectEstimator,
    reply: ReplyGenerator,
    selector: ExpressionSelector,
    fallback: FallbackConfig,
    max_stored_messages: Option<usize>,
    prompt_version: String,
}

impl std::fmt::Debug for TurnOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnOrchestrator")
            .field("sessions", &self.store.len())
            .field("expressions", &self.expressions().labels())
            .field("prompt_version", &self.prompt_version)
            .finish()
    }
}

impl TurnOrchestrator {
    /// Create an orchestrator over `client` with the given candidate set.
    pub fn new(
        client: InferenceClient,
        expressions: CandidateExpressionSet,
        config: &PathosConfig,
    ) -> Self {
        let templates = Arc::new(config.prompts.clone());
        let inference = &config.inference;

        Self {
            store: SessionStore::new(&config.session.default_affect, expressions.fallback()),
            expressions: RwLock::new(Arc::new(expressions)),
            observer: FrameObserver::new(
                client.clone(),
                templates.clone(),
                inference.options_for(CallKind::Observation),
            ),
            affect: AffectEstimator::new(
                client.clone(),
                templates.clone(),
                inference.options_for(CallKind::Affect),
            ),
            reply: ReplyGenerator::new(
                client.clone(),
                templates.clone(),
                inference.options_for(CallKind::Reply),
                config.session.history_window,
            ),
            selector: ExpressionSelector::new(
                client,
                templates,
                inference.options_for(CallKind::Expression),
            ),
            fallback: config.fallback.clone(),
            max_stored_messages: config.session.max_stored_messages,
            prompt_version: config.prompts.version.clone(),
        }
    }

    /// Build the configured inference client and candidate set, then the orchestrator.
    #[cfg(feature = "llm-ollama")]
    pub fn from_config(config: &PathosConfig) -> Result<Self> {
        let client = InferenceClient::from_config(&config.inference)?;
        let expressions = config.expressions.candidate_set()?;
        Ok(Self::new(client, expressions, config))
    }

    /// Session store
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Current candidate set
    pub fn expressions(&self) -> Arc<CandidateExpressionSet> {
        self.expressions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the candidate set. Turns already running keep the set they started with.
    pub fn refresh_expressions(&self, expressions: CandidateExpressionSet) {
        self.store.set_default_expression(expressions.fallback());
        info!(
            count = expressions.len(),
            fallback = %expressions.fallback(),
            "Expression set refreshed"
        );
        *self.expressions.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(expressions);
    }

    /// Run one turn.
    ///
    /// # Errors
    ///
    /// * [`PathosError::EmptyMessage`] if the message is blank; nothing is created
    /// * [`PathosError::TurnFailed`] if both parallel calls fail, or any inference call
    ///   fails while errors are configured to surface; the session is left untouched
    /// * [`PathosError::ObservationFailed`] if a frame can't be described while errors
    ///   are configured to surface
    #[instrument(
        name = "turn",
        skip_all,
        fields(session_id = tracing::field::Empty, prompt_version = %self.prompt_version)
    )]
    pub async fn run_turn(&self, request: TurnRequest) -> Result<TurnResult> {
        let started = Instant::now();
        let mut phase = TurnPhase::Received;

        let user_message = request.user_message.trim();
        if user_message.is_empty() {
            advance(&mut phase, TurnPhase::Failed);
            return Err(PathosError::EmptyMessage);
        }

        let expressions = self.expressions();
        let entry = self.store.get_or_create(request.session_id.as_deref());
        Span::current().record("session_id", entry.id.as_str());
        if entry.created {
            debug!("New session for turn");
        }

        let mut session = entry.handle.lock_owned().await;

        let previous_affect = request
            .hint_affect
            .as_deref()
            .map(str::trim)
            .filter(|hint| !hint.is_empty())
            .unwrap_or(session.affect_state())
            .to_string();
        let previous_expression = request
            .hint_expression
            .as_deref()
            .and_then(|hint| expressions.resolve(hint))
            .map(str::to_string)
            .unwrap_or_else(|| session.expression_state().to_string());

        let frame = request.image_b64.as_deref().and_then(frame_payload);
        let (observation, observation_outcome, observation_elapsed) = match frame {
            None => (None, ObservationOutcome::NotRequested, Duration::ZERO),
            Some(payload) => {
                advance(&mut phase, TurnPhase::Observation);
                let (result, elapsed) = timed(self.observer.observe(payload)).await;
                match require_text(CallKind::Observation, result) {
                    Ok(inference) => (
                        Some(inference.text),
                        ObservationOutcome::Described,
                        elapsed,
                    ),
                    Err(e) if self.fallback.surface_errors => {
                        advance(&mut phase, TurnPhase::Failed);
                        let error = PathosError::ObservationFailed(e.to_string());
                        warn!(error = %error, "Turn failed; session unchanged");
                        return Err(error);
                    }
                    Err(e) => {
                        warn!(error = %e, "Frame observation failed; replying without it");
                        (None, ObservationOutcome::CallFailed, elapsed)
                    }
                }
            }
        };

        advance(&mut phase, TurnPhase::DualInference);
        let ((affect_result, affect_elapsed), (reply_result, reply_elapsed)) = tokio::join!(
            timed(self.affect.estimate(&previous_affect, user_message)),
            timed(self.reply.generate(
                session.history(),
                &previous_affect,
                observation.as_deref(),
                user_message,
            )),
        );
        let affect_result = require_text(CallKind::Affect, affect_result);
        let reply_result = require_text(CallKind::Reply, reply_result);

        let both_failed = affect_result.is_err() && reply_result.is_err();
        let any_failed = affect_result.is_err() || reply_result.is_err();
        if both_failed || (self.fallback.surface_errors && any_failed) {
            advance(&mut phase, TurnPhase::Failed);
            let error = PathosError::TurnFailed {
                affect: status(&affect_result),
                reply: status(&reply_result),
            };
            warn!(error = %error, "Turn failed; session unchanged");
            return Err(error);
        }

        let (affect_state, affect_fallback) = match affect_result {
            Ok(inference) => (inference.text, false),
            Err(e) => {
                let fallback = self.fallback.affect.resolve(&previous_affect);
                warn!(error = %e, fallback = %fallback, "Affect estimation failed; using fallback");
                (fallback, true)
            }
        };
        let (reply, reply_fallback) = match reply_result {
            Ok(inference) => (inference.text, false),
            Err(e) => {
                warn!(error = %e, "Reply generation failed; using unavailable reply");
                (self.fallback.unavailable_reply.clone(), true)
            }
        };

        advance(&mut phase, TurnPhase::ExpressionSelect);
        let (expression_result, expression_elapsed) = timed(self.selector.select(
            &expressions,
            &affect_state,
            &reply,
            &previous_expression,
        ))
        .await;

        let (expression_state, expression_outcome) = match expression_result {
            Ok(choice) => {
                let outcome = if choice.selection.is_fallback() {
                    ExpressionOutcome::Unmatched
                } else {
                    ExpressionOutcome::Matched
                };
                (choice.selection.into_label(), outcome)
            }
            Err(e) if self.fallback.surface_errors => {
                advance(&mut phase, TurnPhase::Failed);
                let error = PathosError::TurnFailed {
                    affect: "ok".to_string(),
                    reply: format!("ok (expression: {})", e),
                };
                warn!(error = %error, "Turn failed; session unchanged");
                return Err(error);
            }
            Err(e) => {
                warn!(
                    error = %e,
                    fallback = %expressions.fallback(),
                    "Expression selection failed; using fallback"
                );
                (
                    expressions.fallback().to_string(),
                    ExpressionOutcome::CallFailed,
                )
            }
        };

        advance(&mut phase, TurnPhase::Commit);
        let trimmed = session.commit(
            TurnCommit {
                user_message: user_message.to_string(),
                reply: reply.clone(),
                affect_state: affect_state.clone(),
                expression_state: expression_state.clone(),
            },
            self.max_stored_messages,
        );
        if trimmed > 0 {
            debug!(trimmed = trimmed, "Trimmed stored history");
        }
        let num_messages = session.messages().len();
        let total = started.elapsed();
        drop(session);
        advance(&mut phase, TurnPhase::Complete);

        let timing = TurnTiming::from_durations(
            observation_elapsed,
            affect_elapsed,
            reply_elapsed,
            expression_elapsed,
            total,
        );
        let outcomes = TurnOutcomes {
            observation: observation_outcome,
            affect_fallback,
            reply_fallback,
            expression: expression_outcome,
        };

        info!(
            num_messages = num_messages,
            affect = %affect_state,
            expression = %expression_state,
            observation_call_ms = timing.observation_call_ms,
            affect_call_ms = timing.affect_call_ms,
            reply_call_ms = timing.reply_call_ms,
            expression_call_ms = timing.expression_call_ms,
            total_ms = timing.total_ms,
            clean = outcomes.is_clean(),
            "Turn complete"
        );

        Ok(TurnResult {
            session_id: entry.id,
            reply,
            affect_state,
            expression_state,
            observation,
            num_messages,
            timing,
            outcomes,
        })
    }
}
