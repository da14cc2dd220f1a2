//! Candidate expression set

use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{PathosError, Result};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Reduce a label or a raw model answer to its comparison key: first non-empty line,
/// lower-cased, with surrounding whitespace, quotes, and punctuation removed.
pub fn normalize_label(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_lowercase()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

/// Finite, ordered set of expression labels plus the label used when a choice can't
/// be matched.
///
/// Labels are stored trimmed and lower-cased, so they still name their image files.
/// Matching goes through [`normalize_label`] on both sides; labels whose keys collide
/// keep the first occurrence, and labels with an empty key are dropped. The set is
/// never empty and always contains its fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateExpressionSet {
    labels: Vec<String>,
    #[serde(skip)]
    keys: Vec<String>,
    fallback: String,
}

impl CandidateExpressionSet {
    /// Build a set from explicit labels.
    ///
    /// # Errors
    ///
    /// [`PathosError::InvalidExpressionSet`] if no usable labels remain or the fallback
    /// is not one of them.
    pub fn new<I, S>(labels: I, fallback: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut stored: Vec<String> = Vec::new();
        let mut keys: Vec<String> = Vec::new();
        for label in labels {
            let label = label.as_ref().trim().to_lowercase();
            if label.is_empty() {
                continue;
            }
            let key = normalize_label(&label);
            if key.is_empty() {
                warn!(label = %label, "Expression label has no letters or digits; skipped");
                continue;
            }
            if !keys.contains(&key) {
                stored.push(label);
                keys.push(key);
            }
        }

        if stored.is_empty() {
            return Err(PathosError::InvalidExpressionSet(
                "expression set is empty".to_string(),
            ));
        }

        let fallback_key = normalize_label(fallback);
        let fallback = match keys.iter().position(|k| *k == fallback_key) {
            Some(index) => stored[index].clone(),
            None => {
                return Err(PathosError::InvalidExpressionSet(format!(
                    "fallback '{}' is not one of [{}]",
                    fallback.trim(),
                    stored.join(", ")
                )));
            }
        };

        Ok(Self {
            labels: stored,
            keys,
            fallback,
        })
    }

    /// Build a set from the image files in `dir`, using sorted file stems as labels.
    pub fn from_dir(dir: &Path, fallback: &str) -> Result<Self> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            PathosError::InvalidExpressionSet(format!(
                "cannot read expression directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let mut stems = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
            if !is_image {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                stems.push(stem.to_lowercase());
            }
        }
        stems.sort();

        debug!(dir = %dir.display(), count = stems.len(), "Discovered expression images");
        Self::new(stems, fallback)
    }

    /// Labels in order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Label used when a choice can't be matched
    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Exact membership test on a stored label
    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// The stored label whose key matches `raw`, if any
    pub fn resolve(&self, raw: &str) -> Option<&str> {
        let key = normalize_label(raw);
        if key.is_empty() {
            return None;
        }
        self.keys
            .iter()
            .position(|k| *k == key)
            .map(|index| self.labels[index].as_str())
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterate over labels
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    /// Labels joined for a prompt
    pub fn to_prompt_list(&self) -> String {
        self.labels.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_labels_are_normalized_and_deduplicated() {
        let set = CandidateExpressionSet::new(
            ["Welcoming", " listening ", "welcoming", "", "Concerned"],
            "WELCOMING",
        )
        .unwrap();

        assert_eq!(set.labels(), ["welcoming", "listening", "concerned"]);
        assert_eq!(set.fallback(), "welcoming");
        assert!(set.contains("listening"));
        assert!(!set.contains("Listening"));
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("LISTENING!!"), "listening");
        assert_eq!(normalize_label("  \"Concerned.\"  "), "concerned");
        assert_eq!(normalize_label("\n\n**listening**\nbecause the user"), "listening");
        assert_eq!(normalize_label(""), "");
    }

    #[test]
    fn test_labels_with_punctuation_resolve() {
        let set =
            CandidateExpressionSet::new(["Welcoming", "smile_", "🙂"], "welcoming").unwrap();

        assert_eq!(set.labels(), ["welcoming", "smile_"]);
        assert_eq!(set.resolve("smile_"), Some("smile_"));
        assert_eq!(set.resolve("**Smile**"), Some("smile_"));
        assert_eq!(set.resolve("🙂"), None);
        assert_eq!(set.resolve("frown"), None);
    }

    #[test]
    fn test_colliding_keys_keep_first() {
        let set = CandidateExpressionSet::new(["smile", "smile_", "-smile-"], "smile_").unwrap();

        assert_eq!(set.labels(), ["smile"]);
        assert_eq!(set.fallback(), "smile");
    }

    #[test]
    fn test_only_symbol_labels_is_empty() {
        let err = CandidateExpressionSet::new(["🙂", "__"], "🙂").unwrap_err();
        assert!(matches!(err, PathosError::InvalidExpressionSet(_)));
    }

    #[test]
    fn test_empty_set_is_rejected() {
        let err = CandidateExpressionSet::new(Vec::<String>::new(), "welcoming").unwrap_err();
        assert!(matches!(err, PathosError::InvalidExpressionSet(_)));
    }

    #[test]
    fn test_fallback_must_be_a_member() {
        let err = CandidateExpressionSet::new(["listening"], "welcoming").unwrap_err();
        assert!(err.to_string().contains("welcoming"));
    }

    #[test]
    fn test_from_dir_uses_image_stems() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["Welcoming.png", "listening.JPG", "concerned.webp", "notes.txt"] {
            File::create(dir.path().join(name)).unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let set = CandidateExpressionSet::from_dir(dir.path(), "welcoming").unwrap();

        assert_eq!(set.labels(), ["concerned", "listening", "welcoming"]);
        assert_eq!(set.to_prompt_list(), "concerned, listening, welcoming");
    }

    #[test]
    fn test_from_missing_dir_fails() {
        let err =
            CandidateExpressionSet::from_dir(Path::new("/definitely/not/here"), "welcoming")
                .unwrap_err();
        assert!(matches!(err, PathosError::InvalidExpressionSet(_)));
    }
}
