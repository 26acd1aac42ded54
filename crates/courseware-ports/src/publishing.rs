//! Publishing metadata: translation descriptors keyed by common language.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Where one translation of a course is published and which documents ship
/// with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    /// Common language name, e.g. `english`, `japanese`.
    pub language: String,
    /// Folder the rendered docs are published to.
    #[serde(default)]
    pub published_docs_folder: Option<String>,
    /// Human-facing documents (slides, PDFs), title → URL.
    #[serde(default)]
    pub document_links: BTreeMap<String, String>,
}

/// Publishing metadata attached to a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishingInfo {
    /// Address the published announcement is sent to.
    #[serde(default)]
    pub announcement_recipient: Option<String>,
    #[serde(default)]
    pub translations: BTreeMap<String, Translation>,
}

impl PublishingInfo {
    /// Look up the translation for a common language (case-insensitive).
    pub fn translation(&self, language: &str) -> Option<&Translation> {
        let key = language.to_ascii_lowercase();
        self.translations
            .get(&key)
            .or_else(|| {
                self.translations
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(language))
                    .map(|(_, t)| t)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> PublishingInfo {
        let mut translations = BTreeMap::new();
        translations.insert(
            "english".to_string(),
            Translation {
                language: "english".to_string(),
                published_docs_folder: Some("https://docs.example.com/en".to_string()),
                document_links: BTreeMap::new(),
            },
        );
        PublishingInfo {
            announcement_recipient: None,
            translations,
        }
    }

    #[test]
    fn test_translation_lookup_ignores_case() {
        let info = info();
        assert!(info.translation("english").is_some());
        assert!(info.translation("English").is_some());
        assert!(info.translation("japanese").is_none());
    }

    #[test]
    fn test_deserializes_with_defaults() {
        let json = r#"{"translations": {"korean": {"language": "korean"}}}"#;
        let info: PublishingInfo = serde_json::from_str(json).unwrap();
        let korean = info.translation("korean").unwrap();
        assert!(korean.document_links.is_empty());
        assert!(korean.published_docs_folder.is_none());
    }
}
