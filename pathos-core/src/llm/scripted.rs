//! Scripted provider for deterministic, offline turns
//!
//! Returns predetermined responses per [`CallKind`], optionally after a simulated delay,
//! and records every request it receives. Used by the test suites and by the CLI's
//! offline chat mode.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{PathosError, Result};

use super::{CallKind, LLMProvider, LLMRequest, LLMResponse, ModelInfo};

/// Predetermined outcome for one scripted call
#[derive(Debug, Clone)]
pub struct ScriptedOutcome {
    result: std::result::Result<String, String>,
    delay: Duration,
}

impl ScriptedOutcome {
    /// Successful response with the given text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            result: Ok(text.into()),
            delay: Duration::ZERO,
        }
    }

    /// Failure reported as an unavailable service
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            result: Err(message.into()),
            delay: Duration::ZERO,
        }
    }

    /// Add a simulated delay
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Responder = Arc<dyn Fn(&LLMRequest) -> ScriptedOutcome + Send + Sync>;

enum Script {
    /// Returned in order; the last one repeats
    Sequence(Vec<ScriptedOutcome>),
    /// Computed from the request
    Dynamic(Responder),
}

/// A request seen by the scripted provider
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub model: Option<String>,
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub images: Vec<String>,
}

/// Provider that answers from scripts instead of a model
pub struct ScriptedProvider {
    scripts: HashMap<CallKind, Script>,
    cursors: Mutex<HashMap<CallKind, usize>>,
    history: Mutex<Vec<RecordedCall>>,
    call_count: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    /// Create a provider with no scripts (every call fails until scripted)
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            cursors: Mutex::new(HashMap::new()),
            history: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Append an outcome to the sequence for `kind`
    pub fn on(mut self, kind: CallKind, outcome: ScriptedOutcome) -> Self {
        match self.scripts.get_mut(&kind) {
            Some(Script::Sequence(seq)) => seq.push(outcome),
            _ => {
                self.scripts.insert(kind, Script::Sequence(vec![outcome]));
            }
        }
        self
    }

    /// Answer calls of `kind` with a function of the request
    pub fn on_fn<F>(mut self, kind: CallKind, responder: F) -> Self
    where
        F: Fn(&LLMRequest) -> ScriptedOutcome + Send + Sync + 'static,
    {
        self.scripts.insert(kind, Script::Dynamic(Arc::new(responder)));
        self
    }

    /// Total number of calls received
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Every call received, in arrival order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Calls of one kind, in arrival order
    pub fn calls_for(&self, kind: CallKind) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.kind == kind).collect()
    }

    fn next_outcome(&self, request: &LLMRequest) -> ScriptedOutcome {
        match self.scripts.get(&request.kind) {
            Some(Script::Dynamic(responder)) => responder(request),
            Some(Script::Sequence(seq)) if !seq.is_empty() => {
                let mut cursors = self.cursors.lock().unwrap_or_else(|e| e.into_inner());
                let cursor = cursors.entry(request.kind).or_insert(0);
                let index = (*cursor).min(seq.len() - 1);
                *cursor += 1;
                seq[index].clone()
            }
            _ => ScriptedOutcome::unavailable(format!("no script for {} calls", request.kind)),
        }
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight counter even when the call future is dropped by a deadline
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn generate_request(&self, request: &LLMRequest) -> Result<LLMResponse> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                kind: request.kind,
                model: request.model.clone(),
                prompt: request.prompt().to_string(),
                system_prompt: request.system_prompt().map(str::to_string),
                images: request.images.clone(),
            });

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(self.in_flight.clone());
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        let outcome = self.next_outcome(request);
        if !outcome.delay.is_zero() {
            tokio::time::sleep(outcome.delay).await;
        }

        match outcome.result {
            Ok(content) => Ok(LLMResponse {
                content,
                usage: None,
            }),
            Err(message) => Err(PathosError::InferenceUnavailable(message)),
        }
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "scripted".to_string(),
            model_name: "none".to_string(),
        }
    }
}
