//! Pooled, deadline-bounded inference client

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{PathosError, Result};

use super::{CallKind, InferenceOptions, LLMProvider, LLMRequest, ModelInfo, TokenUsage};

/// Outcome of a successful inference call
#[derive(Debug, Clone)]
pub struct Inference {
    /// Returned text, trimmed
    pub text: String,
    /// Wall-clock time of the call, including any wait for an in-flight slot
    pub elapsed: Duration,
    /// Token usage if the provider reported it
    pub usage: Option<TokenUsage>,
}

/// Client shared by every stage of every turn.
///
/// Cloning is cheap: clones share the provider (and therefore its connection pool) and
/// the in-flight limit.
#[derive(Clone)]
pub struct InferenceClient {
    provider: Arc<dyn LLMProvider>,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
}

impl std::fmt::Debug for InferenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let info = self.provider.model_info();
        f.debug_struct("InferenceClient")
            .field("provider", &info.provider)
            .field("model", &info.model_name)
            .field("max_in_flight", &self.max_in_flight)
            .finish()
    }
}

impl InferenceClient {
    /// Create a client over `provider` allowing at most `max_in_flight` concurrent calls.
    pub fn new(provider: Arc<dyn LLMProvider>, max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            provider,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        }
    }

    /// Build the configured provider and wrap it.
    #[cfg(feature = "llm-ollama")]
    pub fn from_config(config: &crate::config::InferenceConfig) -> Result<Self> {
        use crate::config::InferenceProvider;
        use crate::llm::providers::OllamaProvider;

        let provider: Arc<dyn LLMProvider> = match config.provider {
            InferenceProvider::Ollama => Arc::new(OllamaProvider::from_config(config)?),
        };
        Ok(Self::new(provider, config.max_in_flight))
    }

    /// Get model information from the underlying provider
    pub fn model_info(&self) -> ModelInfo {
        self.provider.model_info()
    }

    /// Configured in-flight limit
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Slots currently free
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run one inference call.
    ///
    /// # Errors
    ///
    /// * [`PathosError::InferenceTimeout`] if `options.timeout` elapses first
    /// * [`PathosError::InferenceUnavailable`] for transport or status failures
    pub async fn invoke(
        &self,
        kind: CallKind,
        prompt: &str,
        options: &InferenceOptions,
    ) -> Result<Inference> {
        let request = LLMRequest::from_prompt(kind, prompt, options);
        self.invoke_request(&request, options.timeout).await
    }

    /// Run a prebuilt request (for example one carrying images) under `timeout`.
    ///
    /// # Errors
    ///
    /// Same as [`InferenceClient::invoke`].
    pub async fn invoke_request(
        &self,
        request: &LLMRequest,
        timeout: Duration,
    ) -> Result<Inference> {
        let kind = request.kind;
        let start = Instant::now();

        let call = async {
            let _permit = self.permits.acquire().await.map_err(|_| {
                PathosError::InferenceUnavailable("Inference client is shut down".to_string())
            })?;
            self.provider.generate_request(request).await
        };

        let outcome = match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(PathosError::InferenceTimeout(timeout)),
        };
        let elapsed = start.elapsed();

        match outcome {
            Ok(response) => {
                debug!(
                    call = %kind,
                    elapsed_ms = elapsed.as_millis() as u64,
                    prompt_len = request.prompt().len(),
                    images = request.images.len(),
                    "Inference call completed"
                );
                Ok(Inference {
                    text: response.content.trim().to_string(),
                    elapsed,
                    usage: response.usage,
                })
            }
            Err(e) => {
                warn!(
                    call = %kind,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "Inference call failed"
                );
                Err(e)
            }
        }
    }
}
