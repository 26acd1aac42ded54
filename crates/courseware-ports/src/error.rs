//! Error types for courseware-ports

use thiserror::Error;

/// Errors raised by a collaborator behind one of the port traits.
#[derive(Error, Debug)]
pub enum PortError {
    /// Workspace path does not exist
    #[error("Workspace path not found: {path}")]
    NotFound { path: String },

    /// Target file exists and the write was not allowed to replace it
    #[error("File already exists and overwrite is disabled: {target}")]
    AlreadyExists { target: String },

    /// Repository could not be reset to the requested branch
    #[error("Repository reset failed for {directory} ({repo_url}): {reason}")]
    RepoReset {
        directory: String,
        repo_url: String,
        reason: String,
    },

    /// Repository state could not be inspected
    #[error("Repository inspection failed for {directory}: {reason}")]
    RepoInspection { directory: String, reason: String },

    /// Notebook or document rendering failed
    #[error("Render failed for {target}: {reason}")]
    Render { target: String, reason: String },

    /// Published artifacts did not pass validation
    #[error("Artifact validation failed: {0}")]
    Validation(String),

    /// Archive could not be encoded or decoded
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Filesystem error from a local adapter
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else a backend wants to surface
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for PortError {
    fn from(err: serde_json::Error) -> Self {
        PortError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_reset_error_names_directory_and_url() {
        let err = PortError::RepoReset {
            directory: "/Repos/Temp/course".to_string(),
            repo_url: "https://example.com/course.git".to_string(),
            reason: "branch missing".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/Repos/Temp/course"));
        assert!(msg.contains("course.git"));
        assert!(msg.contains("branch missing"));
    }

    #[test]
    fn test_serde_error_converts() {
        let bad = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: PortError = bad.into();
        assert!(matches!(err, PortError::Serialization(_)));
    }
}
