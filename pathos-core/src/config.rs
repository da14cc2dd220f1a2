//! Configuration types for the Pathos orchestrator

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PathosError, Result};
use crate::expression::CandidateExpressionSet;
use crate::llm::{CallKind, InferenceOptions};
use crate::prompts::PromptTemplates;

/// Name of the configuration file looked up in the working directory
pub const CONFIG_FILE: &str = "pathos.toml";

/// Environment variable pointing at an additional configuration file
pub const CONFIG_PATH_ENV: &str = "PATHOS_CONFIG_PATH";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PathosConfig {
    /// Inference service and call deadlines
    pub inference: InferenceConfig,

    /// Session defaults and history bounds
    pub session: SessionConfig,

    /// Candidate expression labels
    pub expressions: ExpressionsConfig,

    /// What to do when an inference call fails
    pub fallback: FallbackConfig,

    /// Prompt templates
    pub prompts: PromptTemplates,

    /// HTTP transport
    pub server: ServerConfig,
}

/// Inference provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InferenceProvider {
    #[default]
    Ollama,
}

/// Inference service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Provider type
    pub provider: InferenceProvider,

    /// Model name
    pub model: String,

    /// Image-capable model used to describe camera frames
    pub vision_model: String,

    /// Base URL of the inference service
    pub base_url: String,

    /// Maximum inference calls in flight across all sessions
    pub max_in_flight: usize,

    /// Deadline for the camera-frame observation call
    #[serde(with = "humantime_serde")]
    pub observation_timeout: Duration,

    /// Deadline for the affect estimation call
    #[serde(with = "humantime_serde")]
    pub affect_timeout: Duration,

    /// Deadline for the reply generation call
    #[serde(with = "humantime_serde")]
    pub reply_timeout: Duration,

    /// Deadline for the expression selection call
    #[serde(with = "humantime_serde")]
    pub expression_timeout: Duration,

    /// How long idle pooled connections are kept
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Duration,

    /// Idle pooled connections kept per host
    pub pool_max_idle_per_host: usize,

    /// Sampling temperature passed to every call (provider default when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            provider: InferenceProvider::Ollama,
            model: "llama3".to_string(),
            vision_model: "llava".to_string(),
            base_url: "http://localhost:11434".to_string(),
            max_in_flight: 8,
            observation_timeout: Duration::from_secs(30),
            affect_timeout: Duration::from_secs(20),
            reply_timeout: Duration::from_secs(60),
            expression_timeout: Duration::from_secs(20),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 16,
            temperature: None,
        }
    }
}

impl InferenceConfig {
    /// Deadline for a call kind
    pub fn timeout_for(&self, kind: CallKind) -> Duration {
        match kind {
            CallKind::Observation => self.observation_timeout,
            CallKind::Affect => self.affect_timeout,
            CallKind::Reply => self.reply_timeout,
            CallKind::Expression => self.expression_timeout,
        }
    }

    /// Base options for a call kind
    pub fn options_for(&self, kind: CallKind) -> InferenceOptions {
        let mut options = InferenceOptions::new(self.timeout_for(kind));
        if kind == CallKind::Observation {
            options = options.with_model(self.vision_model.clone());
        }
        match self.temperature {
            Some(t) => options.with_temperature(t),
            None => options,
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Affect descriptor a new session starts with
    pub default_affect: String,

    /// Number of trailing messages included in the reply prompt
    pub history_window: usize,

    /// Cap on stored messages per session (unbounded when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_stored_messages: Option<usize>,

    /// Evict sessions idle for longer than this (never when unset)
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub idle_ttl: Option<Duration>,

    /// How often the idle sweep runs when `idle_ttl` is set
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_affect: "emotionally neutral".to_string(),
            history_window: 12,
            max_stored_messages: None,
            idle_ttl: None,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Candidate expression configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionsConfig {
    /// Explicit labels (take precedence over `dir`)
    pub labels: Vec<String>,

    /// Label used when the model's choice cannot be matched
    pub fallback: String,

    /// Directory of avatar images whose file stems are the labels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for ExpressionsConfig {
    fn default() -> Self {
        Self {
            labels: Vec::new(),
            fallback: "welcoming".to_string(),
            dir: None,
        }
    }
}

impl ExpressionsConfig {
    /// Resolve the candidate set from explicit labels or the image directory.
    ///
    /// # Errors
    ///
    /// Returns an error if neither source yields a valid, non-empty set.
    pub fn candidate_set(&self) -> Result<CandidateExpressionSet> {
        if !self.labels.is_empty() {
            return CandidateExpressionSet::new(self.labels.clone(), &self.fallback);
        }
        match &self.dir {
            Some(dir) => CandidateExpressionSet::from_dir(dir, &self.fallback),
            None => Err(PathosError::Configuration(
                "No expressions configured: set expressions.labels or expressions.dir".to_string(),
            )),
        }
    }
}

/// Affect value used when the affect call fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AffectFallback {
    /// Carry the previous affect forward
    #[default]
    Previous,
    /// Use a fixed descriptor
    Fixed(String),
}

impl AffectFallback {
    pub fn resolve(&self, previous: &str) -> String {
        match self {
            AffectFallback::Previous => previous.to_string(),
            AffectFallback::Fixed(value) => value.clone(),
        }
    }
}

/// Failure policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Affect used when the affect call fails
    pub affect: AffectFallback,

    /// Reply used when the reply call fails
    pub unavailable_reply: String,

    /// Fail the turn on any inference error instead of falling back
    pub surface_errors: bool,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            affect: AffectFallback::Previous,
            unavailable_reply:
                "I'm sorry, I'm having trouble responding right now. Could you say that again?"
                    .to_string(),
            surface_errors: false,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl PathosConfig {
    /// Load configuration from files and environment variables.
    ///
    /// Loads in this order (later wins):
    /// 1. Default configuration
    /// 2. `pathos.toml` in the working directory
    /// 3. File named by `PATHOS_CONFIG_PATH`
    /// 4. `PATHOS_`-prefixed environment variables, nested with `__`
    ///    (e.g. `PATHOS_INFERENCE__MODEL=mistral`)
    ///
    /// # Errors
    ///
    /// Returns an error if a file is malformed or the result fails validation.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Same layering as [`PathosConfig::load`], with `path` taking the place of
    /// `PATHOS_CONFIG_PATH` when given. Environment variables are always applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if the named file is missing or malformed, or the result fails
    /// validation.
    pub fn load_with(path: Option<&Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(PathosConfig::default()))
            .merge(Toml::file(CONFIG_FILE));

        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
        if let Some(explicit) = explicit {
            if !explicit.exists() {
                return Err(PathosError::Configuration(format!(
                    "Configuration file not found: {}",
                    explicit.display()
                )));
            }
            figment = figment.merge(Toml::file(explicit));
        }

        let config: PathosConfig = figment
            .merge(Env::prefixed("PATHOS_").split("__"))
            .extract()
            .map_err(|e| {
                PathosError::Configuration(format!("Failed to load configuration: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.inference.max_in_flight == 0 {
            return Err(PathosError::Configuration(
                "inference.max_in_flight must be at least 1".to_string(),
            ));
        }
        if self.inference.model.trim().is_empty() {
            return Err(PathosError::Configuration(
                "inference.model is empty".to_string(),
            ));
        }
        if self.inference.vision_model.trim().is_empty() {
            return Err(PathosError::Configuration(
                "inference.vision_model is empty".to_string(),
            ));
        }
        for kind in [
            CallKind::Observation,
            CallKind::Affect,
            CallKind::Reply,
            CallKind::Expression,
        ] {
            if self.inference.timeout_for(kind).is_zero() {
                return Err(PathosError::Configuration(format!(
                    "inference.{}_timeout must be non-zero",
                    kind
                )));
            }
        }
        if self.session.history_window == 0 {
            return Err(PathosError::Configuration(
                "session.history_window must be at least 1".to_string(),
            ));
        }
        if matches!(self.session.max_stored_messages, Some(n) if n < 2) {
            return Err(PathosError::Configuration(
                "session.max_stored_messages must keep at least one exchange".to_string(),
            ));
        }
        if self.expressions.fallback.trim().is_empty() {
            return Err(PathosError::Configuration(
                "expressions.fallback is empty".to_string(),
            ));
        }
        self.prompts.validate()
    }
}
