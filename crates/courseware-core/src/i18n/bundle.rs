//! Resource bundles: the translatable markdown of one notebook.
//!
//! A bundle lists every directive-tagged markdown cell as a `<hr>` header line
//! carrying the directive, followed by the raw body lines of the cell:
//!
//! ```text
//! <hr>--i18n-a6e39b59-1715-4750-bd5d-5d638cf57c3a
//! # MAGIC # Some Title
//! <hr>--i18n-9d06d80d-2381-42d5-8f9e-cc99ee3cd82a
//! # MAGIC Some text
//! ```
//!
//! Translators edit the bodies; a translated build loads the bundle back as
//! the directive → body map consumed by the directive parser.

use std::collections::BTreeMap;

use crate::domain::notebook::NotebookDef;
use crate::i18n::directive::I18nDirective;

const ENTRY_HEADER: &str = "<hr>";

/// Ordered directive → body entries of one notebook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceBundle {
    entries: Vec<(String, String)>,
}

impl ResourceBundle {
    /// Collect the directive-tagged markdown cells of `notebook`.
    ///
    /// Cells without a directive in the directive position are skipped.
    pub fn from_notebook(notebook: &NotebookDef) -> Self {
        let entries = notebook
            .cells
            .iter()
            .filter_map(|cell| {
                let directive = I18nDirective::inspect(cell)?.directive?;
                let body = cell
                    .source
                    .trim()
                    .split_once('\n')
                    .map(|(_, body)| body)
                    .unwrap_or_default();
                Some((directive, body.to_string()))
            })
            .collect();
        Self { entries }
    }

    /// Parse a bundle file. Text before the first header is ignored.
    pub fn parse(text: &str) -> Self {
        let mut entries: Vec<(String, Vec<&str>)> = Vec::new();
        for line in text.lines() {
            match line.strip_prefix(ENTRY_HEADER) {
                Some(directive) if directive.trim().starts_with(super::DIRECTIVE_PREFIX) => {
                    entries.push((directive.trim().to_string(), Vec::new()));
                }
                _ => {
                    if let Some((_, body)) = entries.last_mut() {
                        body.push(line);
                    }
                }
            }
        }
        Self {
            entries: entries
                .into_iter()
                .map(|(directive, body)| (directive, body.join("\n").trim_end().to_string()))
                .collect(),
        }
    }

    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(directive, body)| format!("{ENTRY_HEADER}{directive}\n{body}\n"))
            .collect()
    }

    pub fn get(&self, directive: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(d, _)| d == directive)
            .map(|(_, body)| body.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Directive → body map. A repeated directive keeps its first body.
    pub fn into_guid_map(self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for (directive, body) in self.entries {
            map.entry(directive).or_insert(body);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notebook::CellLanguage;

    #[test]
    fn test_collects_tagged_markdown_only() {
        let notebook = NotebookDef::new("EC 01 - Intro", CellLanguage::Python)
            .with_cell("# MAGIC %md --i18n-one\n# MAGIC # Title\n# MAGIC Intro")
            .with_cell("print('hi')")
            .with_cell("# MAGIC %md\n# MAGIC untagged")
            .with_cell("# MAGIC %md-sandbox --i18n-two\n# MAGIC <div>x</div>");

        let bundle = ResourceBundle::from_notebook(&notebook);
        assert_eq!(bundle.len(), 2);
        assert_eq!(
            bundle.render(),
            "<hr>--i18n-one\n# MAGIC # Title\n# MAGIC Intro\n<hr>--i18n-two\n# MAGIC <div>x</div>\n"
        );
    }

    #[test]
    fn test_parse_reads_rendered_bundle() {
        let text = "preamble\n<hr>--i18n-one\n# MAGIC # Titel\n# MAGIC Einleitung\n<hr>--i18n-two\n-- MAGIC Hallo\n\n";
        let bundle = ResourceBundle::parse(text);
        assert_eq!(bundle.get("--i18n-one"), Some("# MAGIC # Titel\n# MAGIC Einleitung"));
        assert_eq!(bundle.get("--i18n-two"), Some("-- MAGIC Hallo"));

        let map = bundle.into_guid_map();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_parse_ignores_plain_rules() {
        let bundle = ResourceBundle::parse("<hr>--i18n-a\nline\n<hr>\nstill a\n");
        assert_eq!(bundle.len(), 1);
        assert_eq!(bundle.get("--i18n-a"), Some("line\n<hr>\nstill a"));
    }

    #[test]
    fn test_empty_text_is_empty_bundle() {
        assert!(ResourceBundle::parse("").is_empty());
    }
}
