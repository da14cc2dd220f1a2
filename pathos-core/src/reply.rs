//! Clinician reply generation

use std::sync::Arc;

use crate::conversation::MessageHistory;
use crate::error::Result;
use crate::llm::{CallKind, Inference, InferenceClient, InferenceOptions, Message, MessageRole};
use crate::prompts::{PromptTemplates, render};

const EMPTY_TRANSCRIPT: &str = "(no earlier messages)";

/// Render messages as a `Patient:` / `Clinician:` transcript.
pub fn render_transcript(messages: &[Message]) -> String {
    if messages.is_empty() {
        return EMPTY_TRANSCRIPT.to_string();
    }
    messages
        .iter()
        .map(|m| {
            let speaker = match m.role {
                MessageRole::User => "Patient",
                MessageRole::Assistant => "Clinician",
                MessageRole::System => "System",
            };
            format!("{}: {}", speaker, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Generates the clinician's reply from persona, recent history, and the new message.
#[derive(Debug, Clone)]
pub struct ReplyGenerator {
    client: InferenceClient,
    templates: Arc<PromptTemplates>,
    options: InferenceOptions,
    history_window: usize,
}

impl ReplyGenerator {
    pub fn new(
        client: InferenceClient,
        templates: Arc<PromptTemplates>,
        options: InferenceOptions,
        history_window: usize,
    ) -> Self {
        Self {
            client,
            templates,
            options,
            history_window,
        }
    }

    /// Persona with the current affect filled in, plus the frame observation if any
    pub fn system_prompt(&self, affect: &str, observation: Option<&str>) -> String {
        let persona = render(&self.templates.persona, &[("affect", affect)]);
        match observation {
            Some(observation) => {
                let context = render(
                    &self.templates.observation_context,
                    &[("observation", observation)],
                );
                persona + &context
            }
            None => persona,
        }
    }

    /// Transcript prompt over the trailing window of `history`
    pub fn build_prompt(&self, history: &MessageHistory, message: &str) -> String {
        let transcript = render_transcript(history.recent(self.history_window));
        render(
            &self.templates.reply,
            &[("history", &transcript), ("message", message)],
        )
    }

    /// Generate a reply, returned verbatim apart from trimming.
    pub async fn generate(
        &self,
        history: &MessageHistory,
        affect: &str,
        observation: Option<&str>,
        message: &str,
    ) -> Result<Inference> {
        let prompt = self.build_prompt(history, message);
        let options = self
            .options
            .clone()
            .with_system_prompt(self.system_prompt(affect, observation));
        self.client.invoke(CallKind::Reply, &prompt, &options).await
    }
}
