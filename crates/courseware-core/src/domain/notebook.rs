//! Notebooks, cells and the notebook source file format.
//!
//! A notebook source file is a plain text export where cells are separated by
//! `<comment> COMMAND ----------` lines and magic commands (markdown, `%run`,
//! ...) are prefixed with `<comment> MAGIC`. The comment token depends on the
//! notebook language.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Language a notebook (and therefore each of its cells) is written in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellLanguage {
    #[default]
    Python,
    Sql,
    Scala,
    R,
}

impl CellLanguage {
    /// Line comment token.
    pub fn comment(&self) -> &'static str {
        match self {
            CellLanguage::Python | CellLanguage::R => "#",
            CellLanguage::Sql => "--",
            CellLanguage::Scala => "//",
        }
    }

    /// Prefix of magic lines, e.g. `# MAGIC` or `-- MAGIC`.
    pub fn magic_marker(&self) -> String {
        format!("{} MAGIC", self.comment())
    }

    pub fn command_separator(&self) -> String {
        format!("{} COMMAND ----------", self.comment())
    }

    pub fn header(&self) -> String {
        format!("{} Databricks notebook source", self.comment())
    }

    /// File extension of the source export.
    pub fn extension(&self) -> &'static str {
        match self {
            CellLanguage::Python => "py",
            CellLanguage::Sql => "sql",
            CellLanguage::Scala => "scala",
            CellLanguage::R => "r",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "py" => Some(CellLanguage::Python),
            "sql" => Some(CellLanguage::Sql),
            "scala" => Some(CellLanguage::Scala),
            "r" => Some(CellLanguage::R),
            _ => None,
        }
    }
}

impl std::str::FromStr for CellLanguage {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "python" => Ok(CellLanguage::Python),
            "sql" => Ok(CellLanguage::Sql),
            "scala" => Ok(CellLanguage::Scala),
            "r" => Ok(CellLanguage::R),
            _ => Err(ConfigError::UnsupportedLanguage(s.to_string())),
        }
    }
}

/// Markdown magic used by a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkdownTag {
    Md,
    MdSandbox,
}

impl MarkdownTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkdownTag::Md => "%md",
            MarkdownTag::MdSandbox => "%md-sandbox",
        }
    }

    fn parse(word: &str) -> Option<Self> {
        match word {
            "%md" => Some(MarkdownTag::Md),
            "%md-sandbox" => Some(MarkdownTag::MdSandbox),
            _ => None,
        }
    }
}

/// One unit of notebook source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// 0-based position within the notebook.
    pub index: usize,
    pub language: CellLanguage,
    pub source: String,
}

impl Cell {
    pub fn new(index: usize, language: CellLanguage, source: impl Into<String>) -> Self {
        Self {
            index,
            language,
            source: source.into(),
        }
    }

    /// The first line with the magic marker removed and trimmed, or `None`
    /// when the cell does not start with a magic line.
    pub fn magic_command(&self) -> Option<&str> {
        let first = self.source.trim().lines().next()?;
        strip_magic(first, self.language)
    }

    /// Markdown tag of the cell, if it is a markdown cell.
    pub fn markdown_tag(&self) -> Option<MarkdownTag> {
        self.magic_command()
            .and_then(|cmd| cmd.split_whitespace().next())
            .and_then(MarkdownTag::parse)
    }

    pub fn is_markdown(&self) -> bool {
        self.markdown_tag().is_some()
    }
}

/// Remove the language's magic marker from `line`.
pub fn strip_magic(line: &str, language: CellLanguage) -> Option<&str> {
    line.trim_start()
        .strip_prefix(language.magic_marker().as_str())
        .map(str::trim)
}

/// Split a notebook source export into cells.
///
/// The optional header line is dropped; surrounding blank lines of each cell
/// are trimmed.
pub fn parse_source(text: &str, language: CellLanguage) -> Vec<Cell> {
    let header = language.header();
    let separator = language.command_separator();

    let body = text.trim_start();
    let body = body.strip_prefix(header.as_str()).unwrap_or(body);

    let mut cells = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let flush = |lines: &mut Vec<&str>, cells: &mut Vec<Cell>| {
        let source = lines.join("\n").trim_matches('\n').to_string();
        if !source.trim().is_empty() {
            cells.push(Cell::new(cells.len(), language, source));
        }
        lines.clear();
    };

    for line in body.lines() {
        if line.trim_end() == separator {
            flush(&mut current, &mut cells);
        } else {
            current.push(line);
        }
    }
    flush(&mut current, &mut cells);
    cells
}

/// Render cells back into a notebook source export.
pub fn render_source(cells: &[Cell], language: CellLanguage) -> String {
    let separator = format!("\n\n{}\n\n", language.command_separator());
    let body = cells
        .iter()
        .map(|c| c.source.as_str())
        .collect::<Vec<_>>()
        .join(&separator);
    format!("{}\n{}\n", language.header(), body)
}

/// One notebook artifact of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookDef {
    /// Path relative to the source directory, without extension.
    pub path: String,
    #[serde(default)]
    pub language: CellLanguage,
    #[serde(default)]
    pub cells: Vec<Cell>,
    /// Token name → value, substituted wherever `{{name}}` appears.
    #[serde(default)]
    pub replacements: BTreeMap<String, String>,
    /// Whether i18n directives are enforced on markdown cells.
    #[serde(default)]
    pub i18n: bool,
    /// Target language of a translated build; `None` for the English source.
    #[serde(default)]
    pub i18n_language: Option<String>,
    /// Number of test passes this notebook has survived.
    #[serde(default)]
    pub test_round: u32,
}

impl NotebookDef {
    pub fn new(path: impl Into<String>, language: CellLanguage) -> Self {
        Self {
            path: path.into(),
            language,
            cells: Vec::new(),
            replacements: BTreeMap::new(),
            i18n: false,
            i18n_language: None,
            test_round: 0,
        }
    }

    pub fn with_i18n(mut self, enabled: bool) -> Self {
        self.i18n = enabled;
        self
    }

    pub fn with_language_code(mut self, language: Option<&str>) -> Self {
        self.i18n_language = language.map(str::to_string);
        self
    }

    pub fn with_test_round(mut self, round: u32) -> Self {
        self.test_round = round;
        self
    }

    pub fn with_replacement(mut self, token: &str, value: &str) -> Self {
        self.replacements.insert(token.to_string(), value.to_string());
        self
    }

    /// Append a cell, numbering it after the existing ones.
    pub fn with_cell(mut self, source: &str) -> Self {
        let index = self.cells.len();
        self.cells.push(Cell::new(index, self.language, source));
        self
    }

    /// Replace the cells with those parsed from a source export.
    pub fn with_source(mut self, text: &str) -> Self {
        self.cells = parse_source(text, self.language);
        self
    }

    /// Folder portion of the path (`""` for top-level notebooks).
    pub fn folder(&self) -> &str {
        self.path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }

    /// File name of the source export, e.g. `Labs/Lab 1.py`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.path, self.language.extension())
    }

    pub fn render(&self) -> String {
        render_source(&self.cells, self.language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_detection_per_language() {
        let py = Cell::new(0, CellLanguage::Python, "# MAGIC %md-sandbox\n# MAGIC # Hi");
        assert_eq!(py.markdown_tag(), Some(MarkdownTag::MdSandbox));

        let sql = Cell::new(0, CellLanguage::Sql, "-- MAGIC %md --i18n-x\n-- MAGIC # Hi");
        assert_eq!(sql.markdown_tag(), Some(MarkdownTag::Md));

        let code = Cell::new(0, CellLanguage::Python, "print('hi')");
        assert!(!code.is_markdown());

        let run = Cell::new(0, CellLanguage::Python, "# MAGIC %run ./Includes/Setup");
        assert!(!run.is_markdown());
        assert_eq!(run.magic_command(), Some("%run ./Includes/Setup"));
    }

    #[test]
    fn test_sql_marker_not_accepted_in_python_cell() {
        let cell = Cell::new(0, CellLanguage::Python, "-- MAGIC %md\n-- MAGIC # Hi");
        assert!(cell.magic_command().is_none());
    }

    #[test]
    fn test_parse_source_splits_on_separator() {
        let text = "# Databricks notebook source\n# MAGIC %md\n# MAGIC # Title\n\n# COMMAND ----------\n\nprint(1)\n\n# COMMAND ----------\n\n";
        let cells = parse_source(text, CellLanguage::Python);
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].source, "# MAGIC %md\n# MAGIC # Title");
        assert_eq!(cells[1].index, 1);
        assert_eq!(cells[1].source, "print(1)");
    }

    #[test]
    fn test_render_then_parse_keeps_cells() {
        let nb = NotebookDef::new("Labs/Lab 1", CellLanguage::Sql)
            .with_cell("-- MAGIC %md\n-- MAGIC # Lab")
            .with_cell("SELECT 1");
        let text = nb.render();
        assert!(text.starts_with("-- Databricks notebook source\n"));
        assert_eq!(parse_source(&text, CellLanguage::Sql), nb.cells);
    }

    #[test]
    fn test_folder_and_file_name() {
        let nb = NotebookDef::new("Labs/Lab 1", CellLanguage::Python);
        assert_eq!(nb.folder(), "Labs");
        assert_eq!(nb.file_name(), "Labs/Lab 1.py");
        assert_eq!(NotebookDef::new("Version Info", CellLanguage::Python).folder(), "");
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!("SQL".parse::<CellLanguage>().unwrap(), CellLanguage::Sql);
        assert!("cobol".parse::<CellLanguage>().is_err());
    }
}
