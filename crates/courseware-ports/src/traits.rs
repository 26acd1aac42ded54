//! Capability traits consumed by the publisher
//!
//! These traits are the narrow contracts the publish pipeline depends on:
//! - `WorkspaceClient`: export/import of notebook trees, repo reset, file drops
//! - `RepoInspector`: pending-change counts for a checked-out repository
//! - `DocsRenderer`: notebook doc rendering and PDF/slide processing
//! - `ArtifactValidator`: post-publish verification of distributed artifacts
//!
//! All traits are async and backend-agnostic. In-memory fakes live in the
//! `fakes` module; a local filesystem workspace lives in `fs`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PortError;
use crate::publishing::Translation;

/// Result type for port operations
pub type PortResult<T> = std::result::Result<T, PortError>;

/// Repository metadata folder. Never removed by `clear` and never exported.
pub const REPO_METADATA_DIR: &str = ".git";

// ---------------------------------------------------------------------------
// WorkspaceClient
// ---------------------------------------------------------------------------

/// Workspace export/import surface.
///
/// Paths are workspace paths (`/Repos/...`, `/Workspace/...`). Distribution
/// targets passed to `put_file` may carry a scheme such as `dbfs:/`.
#[async_trait]
pub trait WorkspaceClient: Send + Sync {
    /// Whether anything exists at `path`.
    async fn exists(&self, path: &str) -> PortResult<bool>;

    /// Read a text file. Returns `None` when the file is absent.
    async fn read(&self, path: &str) -> PortResult<Option<String>>;

    /// Create or replace a text file, creating parent folders as needed.
    async fn write(&self, path: &str, content: &str) -> PortResult<()>;

    /// Delete everything under `path` except the direct children named in
    /// `keep` and the repository metadata folder.
    async fn clear(&self, path: &str, keep: &[&str]) -> PortResult<()>;

    /// Export the tree rooted at `path` as a single archive.
    async fn export_archive(&self, path: &str) -> PortResult<Vec<u8>>;

    /// Reset the repository checked out at `directory` to `branch` of `repo_url`.
    async fn reset_repo(&self, directory: &str, repo_url: &str, branch: &str) -> PortResult<()>;

    /// Store binary data at a distribution target.
    ///
    /// Fails with `PortError::AlreadyExists` when the target exists and
    /// `overwrite` is false.
    async fn put_file(&self, target: &str, data: &[u8], overwrite: bool) -> PortResult<()>;

    /// Replace `target` with a copy of `source`, returning the names of the
    /// copied top-level entries in sorted order.
    async fn copy_tree(&self, source: &str, target: &str) -> PortResult<Vec<String>>;
}

/// Archive format produced by the bundled workspace adapters.
///
/// Entries are keyed by path relative to the exported root. Files that are
/// not valid UTF-8 (slides, images) go to `binary`, hex encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookArchive {
    pub root: String,
    pub entries: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub binary: BTreeMap<String, String>,
}

impl NotebookArchive {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            entries: BTreeMap::new(),
            binary: BTreeMap::new(),
        }
    }

    /// Add a file, as text when it decodes as UTF-8.
    pub fn insert_file(&mut self, path: impl Into<String>, data: Vec<u8>) {
        let path = path.into();
        match String::from_utf8(data) {
            Ok(text) => {
                self.entries.insert(path, text);
            }
            Err(e) => {
                self.binary.insert(path, hex::encode(e.into_bytes()));
            }
        }
    }

    /// Decoded contents of a binary entry.
    pub fn binary_file(&self, path: &str) -> Option<Vec<u8>> {
        self.binary.get(path).and_then(|data| hex::decode(data).ok())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.binary.is_empty()
    }

    pub fn to_bytes(&self) -> PortResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> PortResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

// ---------------------------------------------------------------------------
// RepoInspector
// ---------------------------------------------------------------------------

/// Reports uncommitted changes in a checked-out repository.
#[async_trait]
pub trait RepoInspector: Send + Sync {
    /// Number of pending changes in `directory` relative to `repo_url`.
    async fn count_changes(&self, repo_url: &str, directory: &str) -> PortResult<usize>;
}

// ---------------------------------------------------------------------------
// DocsRenderer
// ---------------------------------------------------------------------------

/// Everything the docs renderer needs to process PDFs and slides for one build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocsRequest {
    pub build_name: String,
    pub version: String,
    pub translation: Option<Translation>,
}

/// Documentation renderer.
#[async_trait]
pub trait DocsRenderer: Send + Sync {
    /// Run `notebook_path` in doc-generation mode with the given arguments.
    ///
    /// This call blocks for as long as the notebook runs; callers apply their
    /// own timeout.
    async fn render(
        &self,
        notebook_path: &str,
        arguments: &BTreeMap<String, String>,
    ) -> PortResult<()>;

    /// Process the build's PDFs and slide decks, returning an HTML summary.
    async fn render_docs(&self, request: &DocsRequest) -> PortResult<String>;
}

// ---------------------------------------------------------------------------
// ArtifactValidator
// ---------------------------------------------------------------------------

/// Facts about a finished publish that the validator checks against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactContext {
    pub build_name: String,
    pub version: String,
    pub target_dir: String,
    pub common_language: String,
    pub archive_digest: Option<String>,
}

/// Verifies that distributed artifacts match what was published.
#[async_trait]
pub trait ArtifactValidator: Send + Sync {
    async fn validate(&self, context: &ArtifactContext) -> PortResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_bytes_keep_entries() {
        let mut archive = NotebookArchive::new("/Repos/Temp/course");
        archive
            .entries
            .insert("Version Info".to_string(), "# Databricks notebook source".to_string());

        let bytes = archive.to_bytes().unwrap();
        let decoded = NotebookArchive::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, archive);
    }

    #[test]
    fn test_archive_keeps_binary_files() {
        let png = vec![0x89, 0x50, 0x4e, 0x47, 0xff, 0xfe, 0x00];
        let mut archive = NotebookArchive::new("/t");
        archive.insert_file("docs/v1/slide.png", png.clone());
        archive.insert_file("Lesson", b"# Databricks notebook source".to_vec());

        let decoded = NotebookArchive::from_bytes(&archive.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.binary_file("docs/v1/slide.png"), Some(png));
        assert_eq!(decoded.entries.keys().collect::<Vec<_>>(), ["Lesson"]);
        assert!(!decoded.is_empty());
    }

    #[test]
    fn test_text_only_archive_omits_binary_section() {
        let mut archive = NotebookArchive::new("/t");
        archive.insert_file("Lesson", b"text".to_vec());
        let json = String::from_utf8(archive.to_bytes().unwrap()).unwrap();
        assert!(!json.contains("binary"));
    }

    #[test]
    fn test_archive_rejects_garbage() {
        let err = NotebookArchive::from_bytes(b"not an archive").unwrap_err();
        assert!(matches!(err, PortError::Serialization(_)));
    }
}
