//! Lifecycle events of a publish session.
//!
//! - `SessionSpan` enters a span tagged with the session id for the duration
//!   of a publisher call
//! - `emit_*` functions log the named events (`publish.notebook_built`,
//!   `docs.rendered`, ...) with structured fields
//!
//! Stage transitions are logged by the state machine itself as
//! `publish.stage_completed`.

use tracing::{info, warn};

/// RAII guard for a session-scoped span.
///
/// ```ignore
/// let _span = SessionSpan::enter("6f1c...", "Example-Course");
/// ```
pub struct SessionSpan {
    _span: tracing::span::EnteredSpan,
}

impl SessionSpan {
    pub fn enter(session_id: &str, build_name: &str) -> Self {
        let span = tracing::info_span!(
            "courseware.publish",
            session_id = %session_id,
            build_name = %build_name
        );
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_session_started(session_id: &str, build_name: &str, version: &str) {
    info!(
        event = "publish.session_started",
        session_id = %session_id,
        build_name = %build_name,
        version = %version,
    );
}

/// One notebook was transformed and written.
pub fn emit_notebook_built(path: &str, errors: usize, warnings: usize, guids: usize) {
    info!(
        event = "publish.notebook_built",
        path = %path,
        errors = errors,
        warnings = warnings,
        guids = guids,
    );
}

pub fn emit_generation_finished(notebooks: usize, errors: usize, warnings: usize) {
    info!(
        event = "publish.generation_finished",
        notebooks = notebooks,
        errors = errors,
        warnings = warnings,
        success = errors == 0,
    );
}

/// A repository cleanliness check was skipped on request.
pub fn emit_repo_check_skipped(repo: &str, directory: &str) {
    warn!(
        event = "publish.repo_check_skipped",
        repo = %repo,
        directory = %directory,
        "Skipping validation of the {repo} repository; its state is recorded as clean"
    );
}

pub fn emit_repo_checked(repo: &str, directory: &str, changes: usize) {
    info!(
        event = "publish.repo_checked",
        repo = %repo,
        directory = %directory,
        changes = changes,
    );
}

/// A parameter was passed explicitly with its default value.
pub fn emit_deprecated_default(parameter: &str, value: &str) {
    warn!(
        event = "publish.deprecated_parameter",
        parameter = %parameter,
        value = %value,
        "The {parameter} parameter is set to its default value and should be omitted"
    );
}

pub fn emit_archive_stored(target: &str, bytes: usize, digest: &str) {
    info!(
        event = "publish.archive_stored",
        target = %target,
        bytes = bytes,
        digest = %digest,
    );
}

pub fn emit_docs_rendered(path: &str, duration_ms: u64) {
    info!(event = "docs.rendered", path = %path, duration_ms = duration_ms);
}

pub fn emit_docs_failed(path: &str, error: &dyn std::fmt::Display) {
    warn!(event = "docs.failed", path = %path, error = %error);
}

pub fn emit_docs_timed_out(path: &str, timeout_secs: u64) {
    warn!(event = "docs.timed_out", path = %path, timeout_secs = timeout_secs);
}
