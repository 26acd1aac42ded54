//! Content issues and the reports produced by a generation pass.

use serde::{Deserialize, Serialize};

use crate::domain::notebook::Cell;
use crate::html;

/// Whether an issue blocks a successful publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// A problem found in notebook content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentIssue {
    pub severity: Severity,
    /// 0-based index of the offending cell, when the issue is cell-scoped.
    pub cell_index: Option<usize>,
    pub message: String,
}

impl ContentIssue {
    pub fn error(cell_index: usize, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            cell_index: Some(cell_index),
            message: message.into(),
        }
    }

    pub fn warning(cell_index: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            cell_index,
            message: message.into(),
        }
    }
}

/// Outcome of building one notebook.
///
/// Issues are accumulated over all cells; a report with errors still carries
/// the (partially) transformed cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookReport {
    pub path: String,
    pub cells: Vec<Cell>,
    pub errors: Vec<ContentIssue>,
    pub warnings: Vec<ContentIssue>,
    /// i18n directives seen, in cell order.
    pub i18n_guids: Vec<String>,
}

impl NotebookReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Aggregate of a generation pass over the included notebooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReport {
    pub target_dir: String,
    /// Link to the published release notebook.
    pub link: String,
    pub notebooks: Vec<NotebookReport>,
    /// Black-listed notebook paths that were not published.
    pub excluded: Vec<String>,
    pub html: String,
}

impl PublishReport {
    pub fn new(
        target_dir: impl Into<String>,
        link: impl Into<String>,
        notebooks: Vec<NotebookReport>,
        excluded: Vec<String>,
    ) -> Self {
        let mut report = Self {
            target_dir: target_dir.into(),
            link: link.into(),
            notebooks,
            excluded,
            html: String::new(),
        };
        report.html = html::render_publish_report(&report);
        report
    }

    pub fn total_errors(&self) -> usize {
        self.notebooks.iter().map(|n| n.errors.len()).sum()
    }

    pub fn total_warnings(&self) -> usize {
        self.notebooks.iter().map(|n| n.warnings.len()).sum()
    }

    /// True when no included notebook reported an error. Warnings never block.
    pub fn succeeded(&self) -> bool {
        self.total_errors() == 0
    }

    /// `(path, messages)` for every notebook with warnings, in publish order.
    pub fn warning_messages(&self) -> Vec<(&str, Vec<&str>)> {
        self.notebooks
            .iter()
            .filter(|n| !n.warnings.is_empty())
            .map(|n| {
                (
                    n.path.as_str(),
                    n.warnings.iter().map(|w| w.message.as_str()).collect(),
                )
            })
            .collect()
    }

    /// Every error message prefixed with its notebook path.
    pub fn error_messages(&self) -> Vec<String> {
        self.notebooks
            .iter()
            .flat_map(|n| n.errors.iter().map(move |e| format!("{}: {}", n.path, e.message)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(path: &str, errors: usize, warnings: usize) -> NotebookReport {
        NotebookReport {
            path: path.to_string(),
            cells: Vec::new(),
            errors: (0..errors)
                .map(|i| ContentIssue::error(i, format!("error {i}")))
                .collect(),
            warnings: (0..warnings)
                .map(|i| ContentIssue::warning(Some(i), format!("warning {i}")))
                .collect(),
            i18n_guids: Vec::new(),
        }
    }

    #[test]
    fn test_totals_and_success() {
        let r = PublishReport::new(
            "/t",
            "#workspace/t/Version Info",
            vec![report("A", 0, 2), report("B", 1, 0)],
            vec![],
        );
        assert_eq!(r.total_errors(), 1);
        assert_eq!(r.total_warnings(), 2);
        assert!(!r.succeeded());
        assert_eq!(r.error_messages(), vec!["B: error 0".to_string()]);
    }

    #[test]
    fn test_warnings_do_not_block() {
        let r = PublishReport::new("/t", "link", vec![report("A", 0, 3)], vec![]);
        assert!(r.succeeded());
        let messages = r.warning_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "A");
        assert_eq!(messages[0].1.len(), 3);
    }

    #[test]
    fn test_html_is_rendered_on_creation() {
        let r = PublishReport::new("/t", "link-to-release", vec![report("A", 0, 1)], vec![]);
        assert!(r.html.contains("link-to-release"));
        assert!(r.html.contains("warning 0"));
    }
}
