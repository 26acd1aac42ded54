//! Per-notebook content transformation.
//!
//! [`NotebookContentBuilder`] runs every cell of a notebook through token
//! substitution, `%run` reference checks and, for markdown cells with i18n
//! enabled, the [`GuidDirectiveParser`]. Malformed content never fails the
//! build: problems are collected in the returned [`NotebookReport`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use courseware_ports::WorkspaceClient;
use regex::Regex;
use tracing::{debug, info};

use crate::domain::notebook::{render_source, strip_magic, Cell, NotebookDef};
use crate::domain::report::{ContentIssue, NotebookReport};
use crate::error::Result;
use crate::i18n::{GuidDirectiveParser, GuidRegistry, ResourceBundle};
use crate::obs;

static RUN_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^%run\s+(?:"([^"]+)"|(\S+))\s*$"#).unwrap());

/// Token carrying the build version.
pub const VERSION_TOKEN: &str = "version_number";
/// Token carrying the build timestamp.
pub const BUILT_ON_TOKEN: &str = "built_on";

/// Substitute every `{{name}}` in `text`.
pub fn substitute_tokens(text: &str, tokens: &BTreeMap<String, String>) -> String {
    tokens.iter().fold(text.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{{{name}}}}}"), value)
    })
}

/// Resolve `reference` relative to `folder`, folding `.` and `..` segments.
///
/// Returns `None` for absolute references or ones escaping the source root.
pub fn resolve_relative(folder: &str, reference: &str) -> Option<String> {
    if reference.starts_with('/') {
        return None;
    }
    let mut parts: Vec<&str> = folder.split('/').filter(|p| !p.is_empty()).collect();
    for segment in reference.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

/// Builds the published content of notebooks for one generation pass.
#[derive(Debug, Clone)]
pub struct NotebookContentBuilder {
    source_dir: String,
    target_dir: String,
    i18n_resources_dir: String,
    tokens: BTreeMap<String, String>,
    known_paths: BTreeSet<String>,
    verbose: bool,
    debugging: bool,
}

impl NotebookContentBuilder {
    pub fn new(
        source_dir: impl Into<String>,
        target_dir: impl Into<String>,
        i18n_resources_dir: impl Into<String>,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            target_dir: target_dir.into(),
            i18n_resources_dir: i18n_resources_dir.into(),
            tokens: BTreeMap::new(),
            known_paths: BTreeSet::new(),
            verbose: false,
            debugging: false,
        }
    }

    /// Set the universal `version_number` and `built_on` tokens.
    pub fn with_build_tokens(self, version: &str, built_on: &str) -> Self {
        self.with_token(VERSION_TOKEN, version)
            .with_token(BUILT_ON_TOKEN, built_on)
    }

    pub fn with_token(mut self, name: &str, value: &str) -> Self {
        self.tokens.insert(name.to_string(), value.to_string());
        self
    }

    /// Paths of every notebook in the build, used to check `%run` targets.
    pub fn with_notebook_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn debugging(mut self, debugging: bool) -> Self {
        self.debugging = debugging;
        self
    }

    pub fn source_dir(&self) -> &str {
        &self.source_dir
    }

    pub fn target_dir(&self) -> &str {
        &self.target_dir
    }

    /// Workspace path a notebook is published to.
    pub fn target_path(&self, notebook: &NotebookDef) -> String {
        format!("{}/{}", self.target_dir, notebook.path)
    }

    /// Workspace path of a notebook's resource bundle.
    pub fn bundle_path(&self, notebook: &NotebookDef) -> String {
        format!("{}/{}.md", self.i18n_resources_dir, notebook.path)
    }

    /// Load the directive → translated body map of a translated notebook.
    ///
    /// Source builds and notebooks without i18n get an empty map. A missing
    /// bundle yields an empty map and a warning.
    pub async fn load_guid_map(
        &self,
        workspace: &dyn WorkspaceClient,
        notebook: &NotebookDef,
    ) -> Result<(BTreeMap<String, String>, Option<ContentIssue>)> {
        if !notebook.i18n || notebook.i18n_language.is_none() {
            return Ok((BTreeMap::new(), None));
        }
        let path = self.bundle_path(notebook);
        match workspace.read(&path).await? {
            Some(text) => Ok((ResourceBundle::parse(&text).into_guid_map(), None)),
            None => {
                let warning = ContentIssue::warning(
                    None,
                    format!("Cannot find the resource bundle \"{path}\"; translated cells keep their source"),
                );
                Ok((BTreeMap::new(), Some(warning)))
            }
        }
    }

    /// Transform every cell of `notebook`.
    pub fn build(
        &self,
        notebook: &NotebookDef,
        guid_map: &BTreeMap<String, String>,
    ) -> NotebookReport {
        let mut tokens = self.tokens.clone();
        tokens.extend(
            notebook
                .replacements
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        let parser = if notebook.i18n_language.is_some() {
            GuidDirectiveParser::translating(guid_map)
        } else {
            GuidDirectiveParser::new(guid_map)
        };
        let mut registry = GuidRegistry::new();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut cells = Vec::with_capacity(notebook.cells.len());

        for cell in &notebook.cells {
            let mut cell = Cell::new(
                cell.index,
                cell.language,
                substitute_tokens(&cell.source, &tokens),
            );

            warnings.extend(self.check_run_references(notebook, &cell));

            if notebook.i18n && cell.is_markdown() {
                match parser.rewrite(&cell, &mut registry) {
                    Ok(source) => cell.source = source,
                    Err(issue) => {
                        debug!(path = %notebook.path, cell = cell.index, error = %issue.message, "Rejected markdown cell");
                        errors.push(issue);
                    }
                }
            }

            if self.debugging {
                debug!(path = %notebook.path, cell = cell.index, source = %cell.source, "Built cell");
            }
            cells.push(cell);
        }

        let report = NotebookReport {
            path: notebook.path.clone(),
            cells,
            errors,
            warnings,
            i18n_guids: registry.into_guids(),
        };
        if self.verbose {
            info!(
                path = %report.path,
                cells = report.cells.len(),
                guids = report.i18n_guids.len(),
                "Built notebook"
            );
        }
        report
    }

    /// Build `notebook` and write the result under the target directory.
    pub async fn publish(
        &self,
        workspace: &dyn WorkspaceClient,
        notebook: &NotebookDef,
    ) -> Result<NotebookReport> {
        let (guid_map, bundle_warning) = self.load_guid_map(workspace, notebook).await?;
        let mut report = self.build(notebook, &guid_map);
        if let Some(warning) = bundle_warning {
            report.warnings.insert(0, warning);
        }

        let rendered = render_source(&report.cells, notebook.language);
        workspace
            .write(&self.target_path(notebook), &rendered)
            .await?;

        obs::emit_notebook_built(
            &report.path,
            report.errors.len(),
            report.warnings.len(),
            report.i18n_guids.len(),
        );
        Ok(report)
    }

    fn check_run_references(&self, notebook: &NotebookDef, cell: &Cell) -> Vec<ContentIssue> {
        cell.source
            .lines()
            .filter_map(|line| strip_magic(line, cell.language))
            .filter_map(|command| {
                let caps = RUN_COMMAND.captures(command)?;
                let reference = caps.get(1).or_else(|| caps.get(2))?.as_str();
                let resolved = resolve_relative(notebook.folder(), reference)
                    .unwrap_or_else(|| reference.to_string());
                if self.known_paths.contains(&resolved) {
                    return None;
                }
                Some(ContentIssue::warning(
                    Some(cell.index),
                    format!(
                        "Cmd #{} | Cannot find the notebook \"{resolved}\" referenced by %run",
                        cell.index + 1
                    ),
                ))
            })
            .collect()
    }
}
