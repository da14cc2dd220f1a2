//! Camera-frame observation
//!
//! When a turn carries a webcam frame, an image-capable model describes it in a sentence
//! or two before the reply is generated. The description reaches the reply only through
//! the persona; it is never stored in history.

use std::sync::Arc;

use crate::error::Result;
use crate::llm::{CallKind, Inference, InferenceClient, InferenceOptions, LLMRequest};
use crate::prompts::PromptTemplates;

/// Raw base64 payload of a frame, accepting either bare base64 or a `data:` URL.
///
/// Returns `None` when nothing is left to send.
pub fn frame_payload(frame: &str) -> Option<&str> {
    let frame = frame.trim();
    let payload = match frame.strip_prefix("data:") {
        Some(url) => url.split_once(',').map(|(_, data)| data).unwrap_or_default(),
        None => frame,
    };
    let payload = payload.trim();
    (!payload.is_empty()).then_some(payload)
}

/// Describes camera frames with the vision model.
#[derive(Debug, Clone)]
pub struct FrameObserver {
    client: InferenceClient,
    templates: Arc<PromptTemplates>,
    options: InferenceOptions,
}

impl FrameObserver {
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

    /// Describe one frame (already reduced by [`frame_payload`]).
    pub async fn observe(&self, payload: &str) -> Result<Inference> {
        let request = LLMRequest::from_prompt(
            CallKind::Observation,
            self.templates.observation.as_str(),
            &self.options,
        )
        .with_images(vec![payload.to_string()]);
        self.client
            .invoke_request(&request, self.options.timeout)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ScriptedOutcome, ScriptedProvider};

    #[test]
    fn test_frame_payload_strips_data_url() {
        assert_eq!(frame_payload("data:image/jpeg;base64,/9j/4AAQ"), Some("/9j/4AAQ"));
        assert_eq!(frame_payload("  iVBORw0KGgo=  "), Some("iVBORw0KGgo="));
    }

    #[test]
    fn test_empty_frames_are_skipped() {
        assert_eq!(frame_payload(""), None);
        assert_eq!(frame_payload("   "), None);
        assert_eq!(frame_payload("data:image/png;base64,"), None);
        assert_eq!(frame_payload("data:image/png;base64"), None);
    }

    #[tokio::test]
    async fn test_observe_sends_frame_to_vision_model() {
        let provider = Arc::new(ScriptedProvider::new().on(
            CallKind::Observation,
            ScriptedOutcome::text(" The patient looks tired. "),
        ));
        let observer = FrameObserver::new(
            InferenceClient::new(provider.clone(), 1),
            Arc::new(PromptTemplates::default()),
            InferenceOptions::default().with_model("llava"),
        );

        let inference = observer.observe("/9j/4AAQ").await.unwrap();

        assert_eq!(inference.text, "The patient looks tired.");
        let call = &provider.calls_for(CallKind::Observation)[0];
        assert_eq!(call.images, ["/9j/4AAQ"]);
        assert_eq!(call.model.as_deref(), Some("llava"));
        assert!(call.prompt.contains("single webcam frame"));
    }
}
