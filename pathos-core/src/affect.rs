//! Affect estimation
//!
//! Turns the latest user message into a short comma-separated list of emotional
//! descriptors, nudged toward continuity with the previous state.

use std::sync::Arc;

use crate::error::Result;
use crate::llm::{CallKind, Inference, InferenceClient, InferenceOptions};
use crate::prompts::{PromptTemplates, render};

/// Estimates the user's emotional state for one turn.
#[derive(Debug, Clone)]
pub struct AffectEstimator {
    client: InferenceClient,
    templates: Arc<PromptTemplates>,
    options: InferenceOptions,
}

impl AffectEstimator {
    pub fn new(
        client: InferenceClient,
        templates: Arc<PromptTemplates>,
        options: InferenceOptions,
    ) -> Self {
        Self {
            client,
            templates,
            options,
        }
    }

    pub fn build_prompt(&self, previous_affect: &str, message: &str) -> String {
        render(
            &self.templates.affect,
            &[("previous_affect", previous_affect), ("message", message)],
        )
    }

    /// Estimate the new affect. Any non-empty answer is taken as-is.
    pub async fn estimate(&self, previous_affect: &str, message: &str) -> Result<Inference> {
        let prompt = self.build_prompt(previous_affect, message);
        self.client
            .invoke(CallKind::Affect, &prompt, &self.options)
            .await
    }
}
