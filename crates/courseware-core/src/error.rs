//! Error taxonomy for the publish pipeline.
//!
//! Structural problems (configuration, stage ordering, repository state,
//! collaborator failures) are `PublishError`s and fail fast. Content problems
//! inside notebooks are never errors in this sense: they are collected as
//! [`ContentIssue`](crate::domain::report::ContentIssue)s and reported at the
//! end of a pass.

use courseware_ports::PortError;

use crate::build_state::BuildStage;

/// Which repository a clean-state check refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepoKind {
    Source,
    Target,
}

impl RepoKind {
    pub fn name(&self) -> &'static str {
        match self {
            RepoKind::Source => "source",
            RepoKind::Target => "target",
        }
    }

    /// Publisher operation that refreshes this repository's state.
    pub fn check_method(&self) -> &'static str {
        match self {
            RepoKind::Source => "Publisher::validate_no_changes_in_source_repo()",
            RepoKind::Target => "Publisher::validate_no_changes_in_target_repo()",
        }
    }
}

impl std::fmt::Display for RepoKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration problems detected while building or validating a build.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("the white_list must be specified when specifying a black_list")]
    MissingWhiteList,

    #[error("the black_list must be specified when specifying a white_list")]
    MissingBlackList,

    #[error("the {list} path \"{path}\" was also found in the {other}")]
    PathInBothLists {
        list: &'static str,
        other: &'static str,
        path: String,
    },

    #[error("the {list} path \"{path}\" does not exist in the complete set of notebooks")]
    UnknownListedPath { list: &'static str, path: String },

    #[error("the notebook \"{path}\" was not found in either the white-list or black-list")]
    UnlistedNotebook { path: String },

    #[error("the notebook \"{path}\" is defined more than once")]
    DuplicateNotebook { path: String },

    #[error("the {field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("unsupported notebook language: {0}")]
    UnsupportedLanguage(String),

    #[error("the run-time and build-time list of supported versions does not match: {supported:?} vs {expected:?}")]
    VersionListMismatch {
        supported: Vec<String>,
        expected: Vec<String>,
    },

    #[error("resource bundles are created for the English translations only, found {language}")]
    ResourceBundleLanguage { language: String },

    #[error("invalid build manifest: {0}")]
    Manifest(String),
}

/// Publish pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("cannot {operation}: the {missing} step has not been completed")]
    PreconditionNotMet {
        operation: &'static str,
        missing: BuildStage,
    },

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("the required notebook \"{name}\" was not found")]
    MissingRequiredNotebook { name: String },

    #[error("the {repo} repository was not tested for changes; run {} to update the build state", .repo.check_method())]
    RepositoryNotChecked { repo: RepoKind },

    #[error("found {changes} change(s) in the {repo} repository; commit any changes and re-run {} to update the build state", .repo.check_method())]
    RepositoryDirty { repo: RepoKind, changes: usize },

    #[error("collaborator failure: {0}")]
    Collaborator(#[from] PortError),
}

impl PublishError {
    /// Whether this is a repository-state error (dirty or unchecked repo).
    pub fn is_repository_state(&self) -> bool {
        matches!(
            self,
            PublishError::RepositoryNotChecked { .. } | PublishError::RepositoryDirty { .. }
        )
    }
}

/// Result type for publish operations.
pub type Result<T> = std::result::Result<T, PublishError>;
