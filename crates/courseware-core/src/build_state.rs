//! Stage gating for one publish session.
//!
//! A build moves along a fixed chain of stages:
//!
//! ```text
//! unvalidated → config_validated → repo_reset_validated → notebooks_generated
//!             → archives_created → docs_created → artifacts_validated
//! ```
//!
//! Every externally visible publisher operation first asks the state machine
//! whether its predecessor stage has been reached. Completing (or re-running)
//! a stage discards every stage after it, so a re-run upstream step always
//! forces the downstream steps to be redone.
//!
//! Source and target repository cleanliness are tracked next to the chain as
//! tri-state change counts: `None` (never checked), `Some(0)` (clean) or
//! `Some(n)` (dirty).

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PublishError, RepoKind, Result};

/// Named stages of a build, in order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BuildStage {
    Unvalidated,
    ConfigValidated,
    RepoResetValidated,
    NotebooksGenerated,
    ArchivesCreated,
    DocsCreated,
    ArtifactsValidated,
}

impl BuildStage {
    /// All stages in chain order.
    pub const ALL: [BuildStage; 7] = [
        BuildStage::Unvalidated,
        BuildStage::ConfigValidated,
        BuildStage::RepoResetValidated,
        BuildStage::NotebooksGenerated,
        BuildStage::ArchivesCreated,
        BuildStage::DocsCreated,
        BuildStage::ArtifactsValidated,
    ];

    /// Human-readable name of the step that reaches this stage.
    pub fn name(&self) -> &'static str {
        match self {
            BuildStage::Unvalidated => "initialization",
            BuildStage::ConfigValidated => "config validation",
            BuildStage::RepoResetValidated => "repo-reset validation",
            BuildStage::NotebooksGenerated => "notebook generation",
            BuildStage::ArchivesCreated => "archive creation",
            BuildStage::DocsCreated => "docs creation",
            BuildStage::ArtifactsValidated => "artifact validation",
        }
    }

    /// The stage that must be reached before this one can be completed.
    pub fn predecessor(&self) -> Option<BuildStage> {
        match self {
            BuildStage::Unvalidated => None,
            BuildStage::ConfigValidated => Some(BuildStage::Unvalidated),
            BuildStage::RepoResetValidated => Some(BuildStage::ConfigValidated),
            BuildStage::NotebooksGenerated => Some(BuildStage::RepoResetValidated),
            BuildStage::ArchivesCreated => Some(BuildStage::NotebooksGenerated),
            BuildStage::DocsCreated => Some(BuildStage::ArchivesCreated),
            BuildStage::ArtifactsValidated => Some(BuildStage::DocsCreated),
        }
    }

    fn successor(&self) -> Option<BuildStage> {
        BuildStage::ALL.iter().copied().find(|s| s.predecessor() == Some(*self))
    }
}

impl std::fmt::Display for BuildStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Flag view of the state, one boolean per completed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFlags {
    pub validated: bool,
    pub repo_reset_validated: bool,
    pub notebooks_generated: bool,
    pub dbcs_created: bool,
    pub docs_created: bool,
    pub artifacts_validated: bool,
    pub source_repo_changes: Option<usize>,
    pub target_repo_changes: Option<usize>,
}

/// Stage gate for a single build session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStateMachine {
    reached: BuildStage,
    source_changes: Option<usize>,
    target_changes: Option<usize>,
}

impl Default for BuildStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildStateMachine {
    pub fn new() -> Self {
        Self {
            reached: BuildStage::Unvalidated,
            source_changes: None,
            target_changes: None,
        }
    }

    /// Furthest stage reached.
    pub fn stage(&self) -> BuildStage {
        self.reached
    }

    pub fn is_reached(&self, stage: BuildStage) -> bool {
        self.reached >= stage
    }

    /// Fail with `PreconditionNotMet` unless `stage` has been reached.
    ///
    /// The error names the first step that is still missing.
    pub fn require(&self, operation: &'static str, stage: BuildStage) -> Result<()> {
        if self.is_reached(stage) {
            return Ok(());
        }
        let missing = self.reached.successor().unwrap_or(stage);
        Err(PublishError::PreconditionNotMet { operation, missing })
    }

    /// Mark `stage` as completed.
    ///
    /// Requires the predecessor stage. Any stage after `stage` is discarded,
    /// since it was derived from the state this step just replaced.
    pub fn complete(&mut self, operation: &'static str, stage: BuildStage) -> Result<()> {
        if let Some(predecessor) = stage.predecessor() {
            self.require(operation, predecessor)?;
        }
        if self.reached > stage {
            debug!(stage = %stage, discarded = %self.reached, "Re-running stage");
        }
        self.reached = stage;
        info!(event = "publish.stage_completed", stage = %stage);
        Ok(())
    }

    /// Forget `stage` and everything after it.
    pub fn invalidate(&mut self, stage: BuildStage) {
        if self.reached >= stage {
            self.reached = stage.predecessor().unwrap_or(BuildStage::Unvalidated);
            debug!(stage = %stage, now = %self.reached, "Invalidated stage");
        }
    }

    /// Record the outcome of a clean-repository check.
    pub fn record_repo_changes(&mut self, repo: RepoKind, changes: usize) {
        match repo {
            RepoKind::Source => self.source_changes = Some(changes),
            RepoKind::Target => self.target_changes = Some(changes),
        }
    }

    /// Drop a recorded check, e.g. after the checkout it measured was replaced.
    pub fn forget_repo_changes(&mut self, repo: RepoKind) {
        let previous = match repo {
            RepoKind::Source => self.source_changes.take(),
            RepoKind::Target => self.target_changes.take(),
        };
        if previous.is_some() {
            debug!(repo = repo.name(), "Discarded repository check");
        }
    }

    pub fn repo_changes(&self, repo: RepoKind) -> Option<usize> {
        match repo {
            RepoKind::Source => self.source_changes,
            RepoKind::Target => self.target_changes,
        }
    }

    /// Require that `repo` was checked and found clean.
    pub fn require_clean(&self, repo: RepoKind) -> Result<()> {
        match self.repo_changes(repo) {
            None => Err(PublishError::RepositoryNotChecked { repo }),
            Some(0) => Ok(()),
            Some(changes) => Err(PublishError::RepositoryDirty { repo, changes }),
        }
    }

    /// Require that `repo` is not known to be dirty. An unchecked repo passes.
    pub fn require_not_dirty(&self, repo: RepoKind) -> Result<()> {
        match self.repo_changes(repo) {
            Some(changes) if changes > 0 => Err(PublishError::RepositoryDirty { repo, changes }),
            _ => Ok(()),
        }
    }

    pub fn flags(&self) -> BuildFlags {
        BuildFlags {
            validated: self.is_reached(BuildStage::ConfigValidated),
            repo_reset_validated: self.is_reached(BuildStage::RepoResetValidated),
            notebooks_generated: self.is_reached(BuildStage::NotebooksGenerated),
            dbcs_created: self.is_reached(BuildStage::ArchivesCreated),
            docs_created: self.is_reached(BuildStage::DocsCreated),
            artifacts_validated: self.is_reached(BuildStage::ArtifactsValidated),
            source_repo_changes: self.source_changes,
            target_repo_changes: self.target_changes,
        }
    }
}
