//! Inference boundary: provider trait, request/response types and the pooled client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::Result;

pub mod client;
pub mod providers;
pub mod scripted;

pub use client::{Inference, InferenceClient};
pub use scripted::{ScriptedOutcome, ScriptedProvider};

/// Which stage of a turn an inference call belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Observation,
    Affect,
    Reply,
    Expression,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Observation => "observation",
            CallKind::Affect => "affect",
            CallKind::Reply => "reply",
            CallKind::Expression => "expression",
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call options for an inference invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceOptions {
    /// Model to use instead of the provider's default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// System instruction sent ahead of the prompt
    pub system_prompt: Option<String>,

    /// Temperature for generation (0.0-2.0)
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    pub max_tokens: Option<usize>,

    /// Deadline for the whole call, including waiting for an in-flight slot
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            model: None,
            system_prompt: None,
            temperature: None,
            max_tokens: None,
            timeout: Duration::from_secs(20),
        }
    }
}

impl InferenceOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 2.0));
        self
    }

    pub fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Request handed to an LLM provider
#[derive(Debug, Clone)]
pub struct LLMRequest {
    /// Stage this request belongs to (used for logging and scripted providers)
    pub kind: CallKind,

    /// Model override; the provider's default when unset
    pub model: Option<String>,

    /// Messages in the conversation
    pub messages: Vec<Message>,

    /// Base64-encoded images attached to the final user message
    pub images: Vec<String>,

    /// Temperature for generation (0.0-2.0)
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    pub max_tokens: Option<usize>,
}

impl LLMRequest {
    /// Build a request from a single prompt and the call's options
    pub fn from_prompt(
        kind: CallKind,
        prompt: impl Into<String>,
        options: &InferenceOptions,
    ) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = options.system_prompt {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message::user(prompt));

        Self {
            kind,
            model: options.model.clone(),
            messages,
            images: Vec::new(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        }
    }

    /// Attach images to the prompt
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    /// The user-facing prompt (last user message)
    pub fn prompt(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    /// The system instruction, if any
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
    }
}

/// Response from an LLM provider
#[derive(Debug, Clone)]
pub struct LLMResponse {
    /// Generated content
    pub content: String,

    /// Token usage information
    pub usage: Option<TokenUsage>,
}

/// Token usage information
#[derive(Debug, Clone)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub provider: String,
    pub model_name: String,
}

/// Trait for inference service implementations.
///
/// Implementors perform exactly one network round trip per call and map transport
/// failures onto [`PathosError::InferenceUnavailable`](crate::error::PathosError).
/// Deadlines and concurrency limits are enforced by [`InferenceClient`], not here.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate text from a structured request.
    async fn generate_request(&self, request: &LLMRequest) -> Result<LLMResponse>;

    /// Get model information
    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "unknown".to_string(),
            model_name: "unknown".to_string(),
        }
    }
}
