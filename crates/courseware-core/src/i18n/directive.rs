//! i18n directives on markdown cells.
//!
//! With i18n enabled, the first line of every markdown cell must carry exactly
//! one directive after the markdown tag:
//!
//! ```text
//! # MAGIC %md --i18n-a6e39b59-1715-4750-bd5d-5d638cf57c3a
//! # MAGIC # Some Title
//! ```
//!
//! A valid directive is rewritten to `<i18n value="<id>"/>` in place. Any
//! failure leaves the cell untouched and produces one [`ContentIssue`].

use std::collections::BTreeMap;

use crate::domain::notebook::{strip_magic, Cell, MarkdownTag};
use crate::domain::report::ContentIssue;

/// Prefix of every directive token.
pub const DIRECTIVE_PREFIX: &str = "--i18n-";

/// Facts about the header of one markdown cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I18nDirective {
    /// Comment marker of the cell, e.g. `# MAGIC` or `-- MAGIC`.
    pub marker: String,
    pub tag: MarkdownTag,
    /// First line with the marker removed, trimmed.
    pub first_line: String,
    /// Whitespace separated words on the first line, marker excluded.
    pub word_count: usize,
    pub line_count: usize,
    /// The directive token (`--i18n-<id>`), when the second word is one.
    pub directive: Option<String>,
}

impl I18nDirective {
    /// Inspect a cell. Returns `None` for non-markdown cells.
    pub fn inspect(cell: &Cell) -> Option<Self> {
        let tag = cell.markdown_tag()?;
        let source = cell.source.trim();
        let first = source.lines().next()?;
        let first_line = strip_magic(first, cell.language)?.to_string();
        let words: Vec<&str> = first_line.split_whitespace().collect();

        let directive = words
            .get(1)
            .filter(|w| w.starts_with(DIRECTIVE_PREFIX))
            .map(|w| w.to_string());

        Some(Self {
            marker: cell.language.magic_marker(),
            tag,
            word_count: words.len(),
            line_count: source.lines().count(),
            directive,
            first_line,
        })
    }

    /// The opaque id after the directive prefix.
    pub fn guid(&self) -> Option<&str> {
        self.directive
            .as_deref()
            .and_then(|d| d.strip_prefix(DIRECTIVE_PREFIX))
    }

    fn mentions_directive(&self) -> bool {
        self.first_line.contains(DIRECTIVE_PREFIX)
    }
}

/// Directives already accepted for one notebook in the current pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuidRegistry {
    guids: Vec<String>,
}

impl GuidRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, directive: &str) -> bool {
        self.guids.iter().any(|g| g == directive)
    }

    fn record(&mut self, directive: String) {
        self.guids.push(directive);
    }

    /// Accepted directives in cell order.
    pub fn guids(&self) -> &[String] {
        &self.guids
    }

    pub fn into_guids(self) -> Vec<String> {
        self.guids
    }
}

/// Validates and rewrites i18n directives of markdown cells.
#[derive(Debug, Clone, Copy)]
pub struct GuidDirectiveParser<'a> {
    guid_map: &'a BTreeMap<String, String>,
    translate: bool,
}

impl<'a> GuidDirectiveParser<'a> {
    /// Parser for a source (English) build: directives are rewritten only.
    pub fn new(guid_map: &'a BTreeMap<String, String>) -> Self {
        Self {
            guid_map,
            translate: false,
        }
    }

    /// Parser for a translated build: the body of every cell whose directive
    /// is in the map is replaced with the mapped source.
    pub fn translating(guid_map: &'a BTreeMap<String, String>) -> Self {
        Self {
            guid_map,
            translate: true,
        }
    }

    /// Validate `cell` and return its rewritten source.
    ///
    /// Non-markdown cells are returned unchanged. On failure the cell's
    /// original source is kept by the caller and the issue is returned.
    pub fn rewrite(
        &self,
        cell: &Cell,
        registry: &mut GuidRegistry,
    ) -> std::result::Result<String, ContentIssue> {
        let Some(header) = I18nDirective::inspect(cell) else {
            return Ok(cell.source.clone());
        };
        let cmd = cell.index + 1;

        if header.line_count <= 1 {
            return Err(ContentIssue::error(
                cell.index,
                format!(
                    "Cmd #{cmd} | Expected MD to have more than 1 line of code with i18n enabled: {}",
                    header.first_line
                ),
            ));
        }

        if !header.mentions_directive() {
            return Err(ContentIssue::error(
                cell.index,
                format!("Cmd #{cmd} | Missing the i18n directive: {}", header.tag.as_str()),
            ));
        }

        if header.word_count > 2 {
            return Err(ContentIssue::error(
                cell.index,
                format!(
                    "Cmd #{cmd} | Expected the first line of MD to have only two words, found {}: {}",
                    header.word_count, header.first_line
                ),
            ));
        }

        let (Some(directive), Some(guid)) = (header.directive.clone(), header.guid()) else {
            return Err(ContentIssue::error(
                cell.index,
                format!("Cmd #{cmd} | Missing the i18n directive: {}", header.tag.as_str()),
            ));
        };

        if registry.contains(&directive) {
            return Err(ContentIssue::error(
                cell.index,
                format!("Cmd #{cmd} | Duplicate i18n GUID found: {directive}"),
            ));
        }

        let source = cell.source.trim();
        let (first, body) = source.split_once('\n').unwrap_or((source, ""));
        let first = first.replacen(&directive, &format!("<i18n value=\"{guid}\"/>"), 1);

        let body = match self.guid_map.get(&directive) {
            Some(translated) if self.translate => translated.as_str(),
            _ => body,
        };

        registry.record(directive);
        Ok(format!("{first}\n{body}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notebook::CellLanguage;

    const GUID: &str = "--i18n-a6e39b59-1715-4750-bd5d-5d638cf57c3a";

    fn cell(index: usize, source: &str) -> Cell {
        Cell::new(index, CellLanguage::Python, source)
    }

    #[test]
    fn test_inspect_reads_header() {
        let header =
            I18nDirective::inspect(&cell(0, "# MAGIC %md  --i18n-TBD\n# MAGIC # Title")).unwrap();
        assert_eq!(header.marker, "# MAGIC");
        assert_eq!(header.tag, MarkdownTag::Md);
        assert_eq!(header.word_count, 2);
        assert_eq!(header.line_count, 2);
        assert_eq!(header.directive.as_deref(), Some("--i18n-TBD"));
        assert_eq!(header.guid(), Some("TBD"));
    }

    #[test]
    fn test_inspect_skips_code_cells() {
        assert!(I18nDirective::inspect(&cell(0, "print('--i18n-x')")).is_none());
    }

    #[test]
    fn test_double_space_is_preserved() {
        let map = BTreeMap::new();
        let parser = GuidDirectiveParser::new(&map);
        let mut registry = GuidRegistry::new();
        let out = parser
            .rewrite(&cell(3, "# MAGIC %md  --i18n-TBD\n# MAGIC # Title"), &mut registry)
            .unwrap();
        assert_eq!(out, "# MAGIC %md  <i18n value=\"TBD\"/>\n# MAGIC # Title");
    }

    #[test]
    fn test_source_build_keeps_body() {
        let mut map = BTreeMap::new();
        map.insert(GUID.to_string(), "# MAGIC # Translated".to_string());
        let parser = GuidDirectiveParser::new(&map);
        let out = parser
            .rewrite(&cell(0, &format!("# MAGIC %md {GUID}\n# MAGIC # Original")), &mut GuidRegistry::new())
            .unwrap();
        assert!(out.ends_with("# MAGIC # Original"));
    }

    #[test]
    fn test_translated_build_swaps_body() {
        let mut map = BTreeMap::new();
        map.insert(GUID.to_string(), "# MAGIC # Übersetzt".to_string());
        let parser = GuidDirectiveParser::translating(&map);
        let out = parser
            .rewrite(
                &cell(0, &format!("# MAGIC %md {GUID}\n# MAGIC # Original\n# MAGIC more")),
                &mut GuidRegistry::new(),
            )
            .unwrap();
        assert_eq!(
            out,
            "# MAGIC %md <i18n value=\"a6e39b59-1715-4750-bd5d-5d638cf57c3a\"/>\n# MAGIC # Übersetzt"
        );
    }

    #[test]
    fn test_translated_build_without_entry_keeps_body() {
        let map = BTreeMap::new();
        let parser = GuidDirectiveParser::translating(&map);
        let out = parser
            .rewrite(&cell(0, "# MAGIC %md --i18n-x\n# MAGIC # Original"), &mut GuidRegistry::new())
            .unwrap();
        assert_eq!(out, "# MAGIC %md <i18n value=\"x\"/>\n# MAGIC # Original");
    }

    #[test]
    fn test_directive_not_in_second_position() {
        let map = BTreeMap::new();
        let parser = GuidDirectiveParser::new(&map);
        let err = parser
            .rewrite(&cell(1, "# MAGIC %md x--i18n-y\n# MAGIC # Title"), &mut GuidRegistry::new())
            .unwrap_err();
        assert_eq!(err.message, "Cmd #2 | Missing the i18n directive: %md");
        assert_eq!(err.cell_index, Some(1));
    }

    #[test]
    fn test_registry_records_in_order() {
        let map = BTreeMap::new();
        let parser = GuidDirectiveParser::new(&map);
        let mut registry = GuidRegistry::new();
        parser
            .rewrite(&cell(0, "# MAGIC %md --i18n-b\n# MAGIC B"), &mut registry)
            .unwrap();
        parser
            .rewrite(&cell(1, "# MAGIC %md --i18n-a\n# MAGIC A"), &mut registry)
            .unwrap();
        assert_eq!(registry.guids(), ["--i18n-b", "--i18n-a"]);
    }
}
