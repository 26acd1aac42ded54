//! Source documentation generation.
//!
//! Every notebook that survived at least two test rounds is run once by the
//! [`DocsRenderer`] in doc-generation mode. Renders fan out over a tokio
//! `JoinSet` (or run one after another in sequential mode), each bounded by a
//! fixed timeout. A failed or timed-out render is recorded for that notebook
//! and never aborts the batch.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use courseware_ports::DocsRenderer;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::debug;

use crate::domain::notebook::NotebookDef;
use crate::obs;

/// Per-notebook render timeout.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Notebooks below this test round are not rendered.
pub const MIN_DOCS_TEST_ROUND: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocsOutcome {
    Skipped,
    Rendered,
    Failed { reason: String },
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocsResult {
    pub path: String,
    pub outcome: DocsOutcome,
    pub elapsed_ms: u64,
}

/// Outcomes of one doc-generation batch, in notebook order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocsReport {
    pub results: Vec<DocsResult>,
}

impl SourceDocsReport {
    pub fn rendered(&self) -> usize {
        self.count(|o| matches!(o, DocsOutcome::Rendered))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, DocsOutcome::Skipped))
    }

    /// Failed and timed-out notebooks.
    pub fn failures(&self) -> Vec<&DocsResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, DocsOutcome::Failed { .. } | DocsOutcome::TimedOut))
            .collect()
    }

    fn count(&self, pred: impl Fn(&DocsOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Runs the doc-generation pass over a notebook set.
pub struct SourceDocsGenerator {
    renderer: Arc<dyn DocsRenderer>,
    source_dir: String,
    version: String,
    timeout: Duration,
}

impl SourceDocsGenerator {
    pub fn new(
        renderer: Arc<dyn DocsRenderer>,
        source_dir: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            renderer,
            source_dir: source_dir.into(),
            version: version.into(),
            timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Render every eligible notebook.
    pub async fn generate(&self, notebooks: &[NotebookDef], asynchronous: bool) -> SourceDocsReport {
        let mut arguments = BTreeMap::new();
        arguments.insert("version".to_string(), self.version.clone());
        arguments.insert("generating_docs".to_string(), "true".to_string());
        let arguments = Arc::new(arguments);

        let mut slots: Vec<Option<DocsResult>> = vec![None; notebooks.len()];
        let mut join_set = JoinSet::new();

        for (idx, notebook) in notebooks.iter().enumerate() {
            if notebook.test_round < MIN_DOCS_TEST_ROUND {
                debug!(path = %notebook.path, test_round = notebook.test_round, "Skipping docs");
                slots[idx] = Some(DocsResult {
                    path: notebook.path.clone(),
                    outcome: DocsOutcome::Skipped,
                    elapsed_ms: 0,
                });
                continue;
            }

            let task = render_one(
                Arc::clone(&self.renderer),
                notebook.path.clone(),
                format!("{}/{}", self.source_dir, notebook.path),
                Arc::clone(&arguments),
                self.timeout,
            );
            if asynchronous {
                join_set.spawn(async move { (idx, task.await) });
            } else {
                slots[idx] = Some(task.await);
            }
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, result)) => slots[idx] = Some(result),
                Err(e) => debug!(error = %e, "Docs task join error"),
            }
        }

        let results = slots
            .into_iter()
            .zip(notebooks)
            .map(|(slot, notebook)| {
                slot.unwrap_or_else(|| DocsResult {
                    path: notebook.path.clone(),
                    outcome: DocsOutcome::Failed {
                        reason: "render task did not complete".to_string(),
                    },
                    elapsed_ms: 0,
                })
            })
            .collect();
        SourceDocsReport { results }
    }
}

async fn render_one(
    renderer: Arc<dyn DocsRenderer>,
    path: String,
    notebook_path: String,
    arguments: Arc<BTreeMap<String, String>>,
    timeout: Duration,
) -> DocsResult {
    let started = Instant::now();
    let outcome = match tokio::time::timeout(timeout, renderer.render(&notebook_path, &arguments)).await {
        Ok(Ok(())) => DocsOutcome::Rendered,
        Ok(Err(e)) => {
            obs::emit_docs_failed(&path, &e);
            DocsOutcome::Failed {
                reason: e.to_string(),
            }
        }
        Err(_) => {
            obs::emit_docs_timed_out(&path, timeout.as_secs());
            DocsOutcome::TimedOut
        }
    };
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if outcome == DocsOutcome::Rendered {
        obs::emit_docs_rendered(&path, elapsed_ms);
    }
    DocsResult {
        path,
        outcome,
        elapsed_ms,
    }
}
