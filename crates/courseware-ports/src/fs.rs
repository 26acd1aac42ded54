//! Local filesystem workspace.
//!
//! Maps workspace paths onto a directory tree so the publisher can run
//! without a remote workspace. Distribution targets with a `dbfs:/` scheme land
//! under `<root>/dbfs/`.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::PortError;
use crate::traits::{NotebookArchive, PortResult, WorkspaceClient, REPO_METADATA_DIR};

const DBFS_SCHEME: &str = "dbfs:/";

/// Workspace rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsWorkspace {
    root: PathBuf,
}

impl FsWorkspace {
    /// Create a workspace rooted at `root`. Creates the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> PortResult<Self> {
        std::fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a workspace path. Parent-directory components are dropped so a
    /// path can never escape the root.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let (base, rest) = match path.strip_prefix(DBFS_SCHEME) {
            Some(rest) => (self.root.join("dbfs"), rest),
            None => (self.root.clone(), path),
        };
        Path::new(rest)
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part),
                _ => None,
            })
            .fold(base, |acc, part| acc.join(part))
    }
}

fn collect_files(dir: &Path, prefix: &str, out: &mut NotebookArchive) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if prefix.is_empty() && name == REPO_METADATA_DIR {
            continue;
        }
        let rel = if prefix.is_empty() {
            name
        } else {
            format!("{}/{}", prefix, name)
        };
        if entry.file_type()?.is_dir() {
            collect_files(&entry.path(), &rel, out)?;
        } else {
            out.insert_file(rel, std::fs::read(entry.path())?);
        }
    }
    Ok(())
}

fn copy_dir(source: &Path, target: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(target)?;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let dest = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &dest)?;
        } else {
            std::fs::copy(entry.path(), dest)?;
        }
    }
    Ok(())
}

pub(crate) async fn join_blocking<T: Send + 'static>(
    task: impl FnOnce() -> PortResult<T> + Send + 'static,
) -> PortResult<T> {
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| PortError::Backend(format!("blocking task failed: {e}")))?
}

#[async_trait]
impl WorkspaceClient for FsWorkspace {
    async fn exists(&self, path: &str) -> PortResult<bool> {
        Ok(tokio::fs::try_exists(self.resolve(path)).await?)
    }

    async fn read(&self, path: &str) -> PortResult<Option<String>> {
        match tokio::fs::read_to_string(self.resolve(path)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, path: &str, content: &str) -> PortResult<()> {
        let file = self.resolve(path);
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file, content).await?;
        debug!(path = %file.display(), bytes = content.len(), "Wrote workspace file");
        Ok(())
    }

    async fn clear(&self, path: &str, keep: &[&str]) -> PortResult<()> {
        let dir = self.resolve(path);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == REPO_METADATA_DIR || keep.contains(&name.as_str()) {
                continue;
            }
            if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(entry.path()).await?;
            } else {
                tokio::fs::remove_file(entry.path()).await?;
            }
        }
        Ok(())
    }

    async fn export_archive(&self, path: &str) -> PortResult<Vec<u8>> {
        let dir = self.resolve(path);
        let root = path.to_string();
        join_blocking(move || {
            if !dir.is_dir() {
                return Err(PortError::NotFound { path: root });
            }
            let mut archive = NotebookArchive::new(root);
            collect_files(&dir, "", &mut archive)?;
            archive.to_bytes()
        })
        .await
    }

    async fn reset_repo(&self, directory: &str, repo_url: &str, branch: &str) -> PortResult<()> {
        // A local tree has no remote to reset against; the checkout is simply
        // made to exist.
        let dir = self.resolve(directory);
        tokio::fs::create_dir_all(&dir).await?;
        info!(
            directory = %dir.display(),
            repo_url = %repo_url,
            branch = %branch,
            "Prepared local repository directory"
        );
        Ok(())
    }

    async fn put_file(&self, target: &str, data: &[u8], overwrite: bool) -> PortResult<()> {
        let file = self.resolve(target);
        if !overwrite && tokio::fs::try_exists(&file).await? {
            return Err(PortError::AlreadyExists {
                target: target.to_string(),
            });
        }
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file, data).await?;
        Ok(())
    }

    async fn copy_tree(&self, source: &str, target: &str) -> PortResult<Vec<String>> {
        let from = self.resolve(source);
        let to = self.resolve(target);
        let source = source.to_string();
        join_blocking(move || {
            if !from.is_dir() {
                return Err(PortError::NotFound { path: source });
            }
            if to.exists() {
                std::fs::remove_dir_all(&to)?;
            }
            copy_dir(&from, &to)?;
            let mut names = std::fs::read_dir(&to)?
                .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
                .collect::<std::io::Result<Vec<_>>>()?;
            names.sort();
            Ok(names)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_workspace() -> (tempfile::TempDir, FsWorkspace) {
        let dir = tempfile::tempdir().unwrap();
        let ws = FsWorkspace::new(dir.path()).unwrap();
        (dir, ws)
    }

    #[test]
    fn resolve_drops_parent_components() {
        let (dir, ws) = make_workspace();
        let resolved = ws.resolve("/Repos/../../etc/passwd");
        assert!(resolved.starts_with(dir.path()));
    }

    #[test]
    fn resolve_maps_dbfs_scheme() {
        let (dir, ws) = make_workspace();
        let resolved = ws.resolve("dbfs:/FileStore/tmp/a.dbc");
        assert_eq!(resolved, dir.path().join("dbfs/FileStore/tmp/a.dbc"));
    }

    #[tokio::test]
    async fn write_then_read() {
        let (_dir, ws) = make_workspace();
        ws.write("/Repos/course/Version Info", "hello").await.unwrap();
        let got = ws.read("/Repos/course/Version Info").await.unwrap();
        assert_eq!(got.as_deref(), Some("hello"));
        assert!(ws.read("/Repos/course/missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_keeps_keepers() {
        let (_dir, ws) = make_workspace();
        ws.write("/t/README.md", "r").await.unwrap();
        ws.write("/t/docs/index.html", "d").await.unwrap();
        ws.write("/t/Lesson", "l").await.unwrap();

        ws.clear("/t", &["README.md", "docs"]).await.unwrap();

        assert!(ws.exists("/t/README.md").await.unwrap());
        assert!(ws.exists("/t/docs/index.html").await.unwrap());
        assert!(!ws.exists("/t/Lesson").await.unwrap());
    }

    #[tokio::test]
    async fn export_collects_nested_files() {
        let (_dir, ws) = make_workspace();
        ws.write("/t/Version Info", "v").await.unwrap();
        ws.write("/t/Labs/Lab 1", "l").await.unwrap();

        let archive = NotebookArchive::from_bytes(&ws.export_archive("/t").await.unwrap()).unwrap();
        assert_eq!(archive.entries.get("Labs/Lab 1").map(String::as_str), Some("l"));
        assert_eq!(archive.entries.len(), 2);
    }

    #[tokio::test]
    async fn put_file_without_overwrite_fails_when_present() {
        let (_dir, ws) = make_workspace();
        ws.put_file("dbfs:/dist/a.dbc", b"1", false).await.unwrap();
        let err = ws.put_file("dbfs:/dist/a.dbc", b"2", false).await.unwrap_err();
        assert!(matches!(err, PortError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn copy_tree_replaces_target() {
        let (_dir, ws) = make_workspace();
        ws.write("/src/docs/index.html", "new").await.unwrap();
        ws.write("/src/docs/guide.pdf", "pdf").await.unwrap();
        ws.write("/dst/docs/v1/stale.html", "old").await.unwrap();

        let names = ws.copy_tree("/src/docs", "/dst/docs/v1").await.unwrap();
        assert_eq!(names, vec!["guide.pdf".to_string(), "index.html".to_string()]);
        assert!(!ws.exists("/dst/docs/v1/stale.html").await.unwrap());
    }
}
