//! Ollama inference provider

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::InferenceConfig;
use crate::error::{PathosError, Result};
use crate::llm::{LLMProvider, LLMRequest, LLMResponse, MessageRole, ModelInfo, TokenUsage};

/// Default Ollama endpoint
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Connection pool settings for the shared HTTP client.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Idle keep-alive connections kept per host
    pub max_idle_per_host: usize,
    /// How long an idle connection stays in the pool
    pub idle_timeout: Duration,
    /// Deadline for establishing a new TCP connection
    pub connect_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_idle_per_host: 16,
            idle_timeout: Duration::from_secs(90),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Ollama provider (local model server, `POST /api/chat`).
///
/// Holds a single `reqwest::Client`; every call reuses its keep-alive pool, so the
/// TCP handshake is paid once per pooled connection rather than once per request.
pub struct OllamaProvider {
    client: reqwest::Client,
    model: String,
    base_url: String,
}

impl OllamaProvider {
    /// Create a provider with default pool settings.
    ///
    /// # Arguments
    ///
    /// * `model` - Model name (e.g., "llama3")
    /// * `base_url` - Base URL for Ollama API (defaults to "http://localhost:11434")
    pub fn new(model: impl Into<String>, base_url: Option<impl Into<String>>) -> Result<Self> {
        Self::with_pool(model, base_url, PoolSettings::default())
    }

    /// Create a provider with explicit pool settings.
    pub fn with_pool(
        model: impl Into<String>,
        base_url: Option<impl Into<String>>,
        pool: PoolSettings,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(pool.max_idle_per_host)
            .pool_idle_timeout(pool.idle_timeout)
            .connect_timeout(pool.connect_timeout)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .build()
            .map_err(|e| {
                PathosError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        let base_url = base_url
            .map(|u| u.into())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            client,
            model: model.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create from the `[inference]` configuration section.
    pub fn from_config(config: &InferenceConfig) -> Result<Self> {
        let pool = PoolSettings {
            max_idle_per_host: config.pool_max_idle_per_host,
            idle_timeout: config.pool_idle_timeout,
            ..PoolSettings::default()
        };
        Self::with_pool(config.model.clone(), Some(config.base_url.clone()), pool)
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    images: &'a [String],
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<usize>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    message: Option<OllamaMessageResponse>,
    /// `/api/generate`-style payloads put the text here instead
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<usize>,
    #[serde(default)]
    eval_count: Option<usize>,
}

#[derive(Deserialize)]
struct OllamaMessageResponse {
    #[serde(default)]
    content: String,
    #[serde(default)]
    thinking: Option<String>,
}

impl OllamaResponse {
    fn into_content(self) -> Option<String> {
        let from_message = self.message.and_then(|m| {
            let content = m.content.trim();
            if !content.is_empty() {
                return Some(content.to_string());
            }
            m.thinking
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        });

        from_message.or_else(|| {
            self.response
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
        })
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    async fn generate_request(&self, request: &LLMRequest) -> Result<LLMResponse> {
        let last_user = request
            .messages
            .iter()
            .rposition(|m| m.role == MessageRole::User);
        let messages = request
            .messages
            .iter()
            .enumerate()
            .map(|(i, m)| OllamaMessage {
                role: match m.role {
                    MessageRole::System => "system",
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                },
                content: &m.content,
                images: if Some(i) == last_user {
                    request.images.as_slice()
                } else {
                    &[]
                },
            })
            .collect();

        let options = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            })
        } else {
            None
        };

        let body = OllamaRequest {
            model: request.model.as_deref().unwrap_or(&self.model),
            messages,
            stream: false,
            options,
        };

        let url = format!("{}/api/chat", self.base_url);
        debug!(call = %request.kind, model = %body.model, url = %url, "Sending Ollama request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                PathosError::InferenceUnavailable(format!(
                    "Failed to send request to Ollama: {}. Make sure Ollama is running.",
                    e
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PathosError::InferenceUnavailable(format!(
                "Ollama API error ({}): {}",
                status, text
            )));
        }

        let response_text = response.text().await.map_err(|e| {
            PathosError::InferenceUnavailable(format!("Failed to read Ollama response: {}", e))
        })?;

        let parsed: OllamaResponse = serde_json::from_str(&response_text).map_err(|e| {
            PathosError::InferenceUnavailable(format!("Failed to parse Ollama response: {}", e))
        })?;

        let usage = match (parsed.prompt_eval_count, parsed.eval_count) {
            (Some(prompt_tokens), Some(completion_tokens)) => Some(TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
            _ => None,
        };

        let content = parsed.into_content().ok_or_else(|| {
            PathosError::InferenceUnavailable("Ollama returned no content".to_string())
        })?;

        Ok(LLMResponse { content, usage })
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "ollama".to_string(),
            model_name: self.model.clone(),
        }
    }
}
