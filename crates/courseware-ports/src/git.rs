//! Git-backed repository inspection for local workspaces.

use std::path::Path;
use std::process::Command;

use async_trait::async_trait;
use tracing::debug;

use crate::error::PortError;
use crate::fs::{join_blocking, FsWorkspace};
use crate::traits::{PortResult, RepoInspector};

/// Counts pending changes with `git status --porcelain` in the workspace
/// directory of a repository.
#[derive(Debug, Clone)]
pub struct GitInspector {
    workspace: FsWorkspace,
}

impl GitInspector {
    pub fn new(workspace: FsWorkspace) -> Self {
        Self { workspace }
    }
}

/// Number of changed, staged or untracked entries in the work tree at `dir`.
pub fn count_porcelain_changes(dir: &Path) -> PortResult<usize> {
    let failure = |reason: String| PortError::RepoInspection {
        directory: dir.display().to_string(),
        reason,
    };
    let output = Command::new("git")
        .args(["status", "--porcelain"])
        .current_dir(dir)
        .output()
        .map_err(|e| failure(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(failure(format!("git status failed: {}", stderr.trim())));
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .count())
}

#[async_trait]
impl RepoInspector for GitInspector {
    async fn count_changes(&self, repo_url: &str, directory: &str) -> PortResult<usize> {
        let dir = self.workspace.resolve(directory);
        debug!(directory = %dir.display(), repo_url = %repo_url, "Counting repository changes");
        join_blocking(move || count_porcelain_changes(&dir)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;

    fn run_git(repo_dir: &Path, args: &[&str]) {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn make_repo(root: &Path) -> std::path::PathBuf {
        let repo = root.join("Repos/ec-source");
        std::fs::create_dir_all(&repo).unwrap();
        run_git(&repo, &["init"]);
        run_git(&repo, &["config", "user.name", "test-user"]);
        run_git(&repo, &["config", "user.email", "test@example.com"]);
        run_git(&repo, &["commit", "--allow-empty", "-m", "initial"]);
        repo
    }

    #[tokio::test]
    async fn clean_repo_has_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        make_repo(dir.path());
        let inspector = GitInspector::new(FsWorkspace::new(dir.path()).unwrap());

        let changes = inspector
            .count_changes("https://example.com/ec-source.git", "/Repos/ec-source")
            .await
            .unwrap();
        assert_eq!(changes, 0);
    }

    #[tokio::test]
    async fn untracked_files_are_counted() {
        let dir = tempfile::tempdir().unwrap();
        let repo = make_repo(dir.path());
        std::fs::write(repo.join("Version Info.py"), "print(1)").unwrap();
        std::fs::write(repo.join("README.md"), "readme").unwrap();
        let inspector = GitInspector::new(FsWorkspace::new(dir.path()).unwrap());

        let changes = inspector
            .count_changes("https://example.com/ec-source.git", "/Repos/ec-source")
            .await
            .unwrap();
        assert_eq!(changes, 2);
    }

    #[test]
    fn non_repo_is_an_inspection_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = count_porcelain_changes(dir.path()).unwrap_err();
        assert!(matches!(err, PortError::RepoInspection { .. }));
    }
}
