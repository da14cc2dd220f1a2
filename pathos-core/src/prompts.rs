//! Prompt templates
//!
//! Persona and behavioural constraints live here as data so they can be swapped through
//! configuration. Templates use `{{variable}}` placeholders.

use serde::{Deserialize, Serialize};

use crate::error::{PathosError, Result};

const AFFECT_TEMPLATE: &str = "Previous state: {{previous_affect}}\n\
Message: \"{{message}}\"\n\
Update the emotional state using 3-6 short emotional keywords. \
Favour continuity with the previous state over abrupt change.\n\
Output only the keywords, comma-separated.";

const OBSERVATION_TEMPLATE: &str =
    "You are a clinician character observing a single webcam frame.\n\
Briefly describe anything clinically or emotionally relevant.\n\
Use ONE or TWO short sentences.";

const OBSERVATION_CONTEXT_TEMPLATE: &str =
    "\n\nHere is the clinician's visual observation of the patient's current appearance:\n\
[VISION]: {{observation}}\n\
Use this information to guide your reply, but do not repeat it verbatim.";

const PERSONA_TEMPLATE: &str = "You are a character in a story representing a clinician.\n\
You speak in very short, warm replies (1-3 sentences).\n\
In the story, the patient appears: {{affect}}.\n\
You are warm, clear, and boundaried.\n\
You do not provide real medical advice.\n\
Use no more than 40-50 words.";

const REPLY_TEMPLATE: &str = "Conversation so far:\n\
{{history}}\n\n\
Patient: {{message}}\n\n\
Reply as the clinician.";

const EXPRESSION_TEMPLATE: &str =
    "You are selecting the best clinician facial expression for a VR avatar.\n\n\
User emotional state: \"{{affect}}\"\n\
Clinician reply: \"{{reply}}\"\n\
Current expression: {{previous_expression}}\n\n\
Available expressions: {{candidates}}\n\n\
Choose exactly one expression from the list. Do not invent new expressions.\n\
Respond with ONLY the expression name.";

/// Render `template`, replacing each `{{key}}` with its value.
///
/// Runs in one pass over the template: substituted values are copied verbatim and never
/// scanned for placeholders themselves. Unknown placeholders are left in place.
pub fn render(template: &str, variables: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let value = after.find("}}").and_then(|close| {
            let key = &after[..close];
            variables
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// The full set of templates used in a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptTemplates {
    /// Version tag, logged with each turn so prompt changes are traceable
    pub version: String,

    /// Sent with a camera frame to the vision model (no placeholders)
    pub observation: String,

    /// Appended to the persona when a frame was described (`observation`)
    pub observation_context: String,

    /// Affect estimation prompt (`previous_affect`, `message`)
    pub affect: String,

    /// Clinician persona, sent as the system instruction (`affect`)
    pub persona: String,

    /// Reply prompt (`history`, `message`)
    pub reply: String,

    /// Expression selection prompt (`affect`, `reply`, `previous_expression`, `candidates`)
    pub expression: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            version: "clinician-v1".to_string(),
            observation: OBSERVATION_TEMPLATE.to_string(),
            observation_context: OBSERVATION_CONTEXT_TEMPLATE.to_string(),
            affect: AFFECT_TEMPLATE.to_string(),
            persona: PERSONA_TEMPLATE.to_string(),
            reply: REPLY_TEMPLATE.to_string(),
            expression: EXPRESSION_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Check that every template carries the placeholders its stage relies on.
    pub fn validate(&self) -> Result<()> {
        let required: [(&str, &str, &[&str]); 6] = [
            ("observation", &self.observation, &[]),
            ("observation_context", &self.observation_context, &["observation"]),
            ("affect", &self.affect, &["message"]),
            ("persona", &self.persona, &[]),
            ("reply", &self.reply, &["message"]),
            ("expression", &self.expression, &["candidates"]),
        ];

        for (name, template, placeholders) in required {
            if template.trim().is_empty() {
                return Err(PathosError::Configuration(format!(
                    "prompts.{} is empty",
                    name
                )));
            }
            for key in placeholders {
                if !template.contains(&format!("{{{{{}}}}}", key)) {
                    return Err(PathosError::Configuration(format!(
                        "prompts.{} is missing the {{{{{}}}}} placeholder",
                        name, key
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_all_occurrences() {
        let out = render("{{a}} and {{a}} then {{b}}", &[("a", "x"), ("b", "y")]);
        assert_eq!(out, "x and x then y");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let out = render("{{known}} {{unknown}}", &[("known", "k")]);
        assert_eq!(out, "k {{unknown}}");
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let out = render(
            "Message: {{message}} / Reply: {{reply}}",
            &[("message", "{{reply}}"), ("reply", "ok {{message}}")],
        );
        assert_eq!(out, "Message: {{reply}} / Reply: ok {{message}}");
    }

    #[test]
    fn test_render_handles_stray_braces() {
        let out = render("{{ {{a}} }} {{b", &[("a", "x")]);
        assert_eq!(out, "{{ x }} {{b");
    }

    #[test]
    fn test_defaults_validate() {
        assert!(PromptTemplates::default().validate().is_ok());
    }

    #[test]
    fn test_default_persona_forbids_medical_advice() {
        let persona = PromptTemplates::default().persona;
        assert!(persona.contains("do not provide real medical advice"));
    }

    #[test]
    fn test_missing_placeholder_is_rejected() {
        let templates = PromptTemplates {
            expression: "Pick something nice.".to_string(),
            ..Default::default()
        };
        let err = templates.validate().unwrap_err();
        assert!(err.to_string().contains("candidates"));
    }

    #[test]
    fn test_observation_context_needs_its_placeholder() {
        let templates = PromptTemplates {
            observation_context: "\n[VISION]".to_string(),
            ..Default::default()
        };
        let err = templates.validate().unwrap_err();
        assert!(err.to_string().contains("observation_context"));
    }
}
