//! In-memory fakes for the port traits (testing only)
//!
//! Provides `MemoryWorkspace`, `FixedRepoInspector`, `RecordingRenderer` and
//! `RecordingValidator` that satisfy the trait contracts without any external
//! dependencies and record every call for assertions.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::PortError;
use crate::traits::*;

fn is_under(root: &str, key: &str) -> bool {
    let root = root.trim_end_matches('/');
    key.len() > root.len() + 1 && key.starts_with(root) && key.as_bytes()[root.len()] == b'/'
}

fn relative<'a>(root: &str, key: &'a str) -> &'a str {
    &key[root.trim_end_matches('/').len() + 1..]
}

// ---------------------------------------------------------------------------
// MemoryWorkspace
// ---------------------------------------------------------------------------

/// A recorded `reset_repo` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoResetCall {
    pub directory: String,
    pub repo_url: String,
    pub branch: String,
}

/// In-memory workspace backed by a `BTreeMap<path, text>`.
#[derive(Debug, Default)]
pub struct MemoryWorkspace {
    files: Mutex<BTreeMap<String, String>>,
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
    writes: Mutex<Vec<String>>,
    resets: Mutex<Vec<RepoResetCall>>,
    reset_failure: Mutex<Option<String>>,
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a text file.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
        self
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    pub fn blob(&self, target: &str) -> Option<Vec<u8>> {
        self.blobs.lock().unwrap().get(target).cloned()
    }

    /// Paths passed to `write`, in call order.
    pub fn write_log(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    pub fn reset_calls(&self) -> Vec<RepoResetCall> {
        self.resets.lock().unwrap().clone()
    }

    /// Make every subsequent `reset_repo` fail with `reason`.
    pub fn fail_resets(&self, reason: &str) {
        *self.reset_failure.lock().unwrap() = Some(reason.to_string());
    }

    /// Let `reset_repo` succeed again.
    pub fn allow_resets(&self) {
        *self.reset_failure.lock().unwrap() = None;
    }
}

#[async_trait]
impl WorkspaceClient for MemoryWorkspace {
    async fn exists(&self, path: &str) -> PortResult<bool> {
        let files = self.files.lock().unwrap();
        Ok(files.contains_key(path) || files.keys().any(|k| is_under(path, k)))
    }

    async fn read(&self, path: &str) -> PortResult<Option<String>> {
        Ok(self.files.lock().unwrap().get(path).cloned())
    }

    async fn write(&self, path: &str, content: &str) -> PortResult<()> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
        self.writes.lock().unwrap().push(path.to_string());
        Ok(())
    }

    async fn clear(&self, path: &str, keep: &[&str]) -> PortResult<()> {
        let mut files = self.files.lock().unwrap();
        files.retain(|key, _| {
            if !is_under(path, key) {
                return true;
            }
            let first = relative(path, key).split('/').next().unwrap_or_default();
            first == REPO_METADATA_DIR || keep.contains(&first)
        });
        Ok(())
    }

    async fn export_archive(&self, path: &str) -> PortResult<Vec<u8>> {
        let files = self.files.lock().unwrap();
        let mut archive = NotebookArchive::new(path);
        for (key, content) in files.iter().filter(|(k, _)| is_under(path, k)) {
            let rel = relative(path, key);
            if rel.split('/').next() == Some(REPO_METADATA_DIR) {
                continue;
            }
            archive.insert_file(rel, content.clone().into_bytes());
        }
        if archive.is_empty() {
            return Err(PortError::NotFound {
                path: path.to_string(),
            });
        }
        archive.to_bytes()
    }

    async fn reset_repo(&self, directory: &str, repo_url: &str, branch: &str) -> PortResult<()> {
        if let Some(reason) = self.reset_failure.lock().unwrap().clone() {
            return Err(PortError::RepoReset {
                directory: directory.to_string(),
                repo_url: repo_url.to_string(),
                reason,
            });
        }
        self.resets.lock().unwrap().push(RepoResetCall {
            directory: directory.to_string(),
            repo_url: repo_url.to_string(),
            branch: branch.to_string(),
        });
        Ok(())
    }

    async fn put_file(&self, target: &str, data: &[u8], overwrite: bool) -> PortResult<()> {
        let mut blobs = self.blobs.lock().unwrap();
        if !overwrite && blobs.contains_key(target) {
            return Err(PortError::AlreadyExists {
                target: target.to_string(),
            });
        }
        blobs.insert(target.to_string(), data.to_vec());
        Ok(())
    }

    async fn copy_tree(&self, source: &str, target: &str) -> PortResult<Vec<String>> {
        let mut files = self.files.lock().unwrap();
        let copied: Vec<(String, String)> = files
            .iter()
            .filter(|(k, _)| is_under(source, k))
            .map(|(k, v)| (relative(source, k).to_string(), v.clone()))
            .collect();
        if copied.is_empty() {
            return Err(PortError::NotFound {
                path: source.to_string(),
            });
        }

        files.retain(|key, _| !is_under(target, key));
        let mut top_level = BTreeSet::new();
        for (rel, content) in copied {
            top_level.insert(rel.split('/').next().unwrap_or_default().to_string());
            files.insert(format!("{}/{}", target.trim_end_matches('/'), rel), content);
        }
        Ok(top_level.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// FixedRepoInspector
// ---------------------------------------------------------------------------

/// Repo inspector returning preconfigured change counts per directory.
///
/// Directories without a configured count report zero changes.
#[derive(Debug, Default)]
pub struct FixedRepoInspector {
    changes: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FixedRepoInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_changes(self, directory: &str, count: usize) -> Self {
        self.set_changes(directory, count);
        self
    }

    pub fn set_changes(&self, directory: &str, count: usize) {
        self.changes
            .lock()
            .unwrap()
            .insert(directory.to_string(), count);
    }

    /// `(repo_url, directory)` pairs in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RepoInspector for FixedRepoInspector {
    async fn count_changes(&self, repo_url: &str, directory: &str) -> PortResult<usize> {
        self.calls
            .lock()
            .unwrap()
            .push((repo_url.to_string(), directory.to_string()));
        Ok(self
            .changes
            .lock()
            .unwrap()
            .get(directory)
            .copied()
            .unwrap_or(0))
    }
}

// ---------------------------------------------------------------------------
// RecordingRenderer
// ---------------------------------------------------------------------------

/// Docs renderer that records calls, optionally sleeping or failing per path.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    renders: Mutex<Vec<(String, BTreeMap<String, String>)>>,
    docs_requests: Mutex<Vec<DocsRequest>>,
    delay: Option<Duration>,
    slow_paths: HashSet<String>,
    failing_paths: HashSet<String>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` inside every `render` call for the given paths.
    /// With no paths, every render is slow.
    pub fn with_delay(mut self, delay: Duration, paths: &[&str]) -> Self {
        self.delay = Some(delay);
        self.slow_paths = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn failing_on(mut self, path: &str) -> Self {
        self.failing_paths.insert(path.to_string());
        self
    }

    /// Notebook paths passed to `render`, in call order.
    pub fn rendered_paths(&self) -> Vec<String> {
        self.renders
            .lock()
            .unwrap()
            .iter()
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub fn render_calls(&self) -> Vec<(String, BTreeMap<String, String>)> {
        self.renders.lock().unwrap().clone()
    }

    pub fn docs_requests(&self) -> Vec<DocsRequest> {
        self.docs_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocsRenderer for RecordingRenderer {
    async fn render(
        &self,
        notebook_path: &str,
        arguments: &BTreeMap<String, String>,
    ) -> PortResult<()> {
        self.renders
            .lock()
            .unwrap()
            .push((notebook_path.to_string(), arguments.clone()));

        if let Some(delay) = self.delay {
            if self.slow_paths.is_empty() || self.slow_paths.contains(notebook_path) {
                tokio::time::sleep(delay).await;
            }
        }

        if self.failing_paths.contains(notebook_path) {
            return Err(PortError::Render {
                target: notebook_path.to_string(),
                reason: "notebook run failed".to_string(),
            });
        }
        Ok(())
    }

    async fn render_docs(&self, request: &DocsRequest) -> PortResult<String> {
        self.docs_requests.lock().unwrap().push(request.clone());
        let language = request
            .translation
            .as_ref()
            .map(|t| t.language.as_str())
            .unwrap_or("none");
        Ok(format!(
            "<div>{} v{} ({})</div>",
            request.build_name, request.version, language
        ))
    }
}

// ---------------------------------------------------------------------------
// RecordingValidator
// ---------------------------------------------------------------------------

/// Artifact validator that records contexts and passes unless told otherwise.
#[derive(Debug, Default)]
pub struct RecordingValidator {
    calls: Mutex<Vec<ArtifactContext>>,
    failure: Option<String>,
}

impl RecordingValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failure: Some(reason.to_string()),
        }
    }

    pub fn calls(&self) -> Vec<ArtifactContext> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactValidator for RecordingValidator {
    async fn validate(&self, context: &ArtifactContext) -> PortResult<()> {
        self.calls.lock().unwrap().push(context.clone());
        match &self.failure {
            Some(reason) => Err(PortError::Validation(reason.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clear_keeps_listed_children() {
        let ws = MemoryWorkspace::new()
            .with_file("/t/README.md", "readme")
            .with_file("/t/docs/index.html", "docs")
            .with_file("/t/Lesson 1", "lesson")
            .with_file("/other/Lesson 1", "untouched");

        ws.clear("/t", &["README.md", "docs"]).await.unwrap();

        assert!(ws.file("/t/README.md").is_some());
        assert!(ws.file("/t/docs/index.html").is_some());
        assert!(ws.file("/t/Lesson 1").is_none());
        assert!(ws.file("/other/Lesson 1").is_some());
    }

    #[tokio::test]
    async fn test_put_file_respects_overwrite() {
        let ws = MemoryWorkspace::new();
        ws.put_file("dbfs:/a.dbc", b"one", false).await.unwrap();
        let err = ws.put_file("dbfs:/a.dbc", b"two", false).await.unwrap_err();
        assert!(matches!(err, PortError::AlreadyExists { .. }));

        ws.put_file("dbfs:/a.dbc", b"three", true).await.unwrap();
        assert_eq!(ws.blob("dbfs:/a.dbc").unwrap(), b"three");
    }

    #[tokio::test]
    async fn test_export_archive_is_relative_to_root() {
        let ws = MemoryWorkspace::new()
            .with_file("/t/Version Info", "v")
            .with_file("/t/Labs/Lab 1", "lab");

        let bytes = ws.export_archive("/t").await.unwrap();
        let archive = NotebookArchive::from_bytes(&bytes).unwrap();
        assert_eq!(archive.entries.len(), 2);
        assert!(archive.entries.contains_key("Labs/Lab 1"));
    }

    #[tokio::test]
    async fn test_export_missing_root_is_not_found() {
        let ws = MemoryWorkspace::new();
        let err = ws.export_archive("/missing").await.unwrap_err();
        assert!(matches!(err, PortError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_prefix_siblings_are_not_under_root() {
        let ws = MemoryWorkspace::new().with_file("/target-old/x", "x");
        assert!(!ws.exists("/target").await.unwrap());
    }

    #[tokio::test]
    async fn test_reset_failure_toggle() {
        let ws = MemoryWorkspace::new();
        ws.fail_resets("network down");
        assert!(ws.reset_repo("/r", "url", "published").await.is_err());
        ws.allow_resets();
        ws.reset_repo("/r", "url", "published").await.unwrap();
        assert_eq!(ws.reset_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_inspector_defaults_to_clean() {
        let inspector = FixedRepoInspector::new().with_changes("/dirty", 3);
        assert_eq!(inspector.count_changes("u", "/clean").await.unwrap(), 0);
        assert_eq!(inspector.count_changes("u", "/dirty").await.unwrap(), 3);
        assert_eq!(inspector.calls().len(), 2);
    }
}
