//! Constrained expression selection

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::error::Result;
use crate::llm::{CallKind, Inference, InferenceClient, InferenceOptions};
use crate::prompts::{PromptTemplates, render};

use super::catalog::CandidateExpressionSet;

/// How a label was arrived at
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Selection {
    /// The model's answer matched a candidate
    Matched { label: String },
    /// The answer didn't match; the set's fallback was used
    Fallback { label: String, raw: String },
}

impl Selection {
    /// The chosen label, always a member of the set it was parsed against
    pub fn label(&self) -> &str {
        match self {
            Selection::Matched { label } | Selection::Fallback { label, .. } => label,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Selection::Fallback { .. })
    }

    pub fn into_label(self) -> String {
        match self {
            Selection::Matched { label } | Selection::Fallback { label, .. } => label,
        }
    }
}

/// Validate a raw answer against `set`, falling back on no exact match.
pub fn parse_selection(raw: &str, set: &CandidateExpressionSet) -> Selection {
    if let Some(label) = set.resolve(raw) {
        Selection::Matched {
            label: label.to_string(),
        }
    } else {
        warn!(
            raw = %raw,
            fallback = %set.fallback(),
            "Expression choice not in candidate set; using fallback"
        );
        Selection::Fallback {
            label: set.fallback().to_string(),
            raw: raw.to_string(),
        }
    }
}

/// Selection together with the call that produced it
#[derive(Debug, Clone)]
pub struct ExpressionChoice {
    pub selection: Selection,
    pub inference: Inference,
}

/// Asks the model to pick one label from the candidate set.
#[derive(Debug, Clone)]
pub struct ExpressionSelector {
    client: InferenceClient,
    templates: Arc<PromptTemplates>,
    options: InferenceOptions,
}

impl ExpressionSelector {
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

    /// Render the selection prompt.
    pub fn build_prompt(
        &self,
        set: &CandidateExpressionSet,
        affect: &str,
        reply: &str,
        previous_expression: &str,
    ) -> String {
        render(
            &self.templates.expression,
            &[
                ("affect", affect),
                ("reply", reply),
                ("previous_expression", previous_expression),
                ("candidates", &set.to_prompt_list()),
            ],
        )
    }

    /// Choose an expression. An unmatched answer is not an error; a failed call is.
    pub async fn select(
        &self,
        set: &CandidateExpressionSet,
        affect: &str,
        reply: &str,
        previous_expression: &str,
    ) -> Result<ExpressionChoice> {
        let prompt = self.build_prompt(set, affect, reply, previous_expression);
        let inference = self
            .client
            .invoke(CallKind::Expression, &prompt, &self.options)
            .await?;
        let selection = parse_selection(&inference.text, set);
        Ok(ExpressionChoice {
            selection,
            inference,
        })
    }
}
