//! Courseware Core Library
//!
//! Publish pipeline for versioned, internationalized notebook courseware:
//! i18n directive parsing, per-notebook content building, stage gating and
//! the publisher that drives archive and docs creation through the
//! collaborators in `courseware-ports`.

pub mod build_state;
pub mod content;
pub mod docs;
pub mod domain;
pub mod error;
pub mod html;
pub mod i18n;
pub mod obs;
pub mod publisher;
pub mod telemetry;

pub use build_state::{BuildFlags, BuildStage, BuildStateMachine};
pub use content::{substitute_tokens, NotebookContentBuilder, BUILT_ON_TOKEN, VERSION_TOKEN};
pub use docs::{
    DocsOutcome, DocsResult, SourceDocsGenerator, SourceDocsReport, DEFAULT_RENDER_TIMEOUT,
    MIN_DOCS_TEST_ROUND,
};
pub use domain::{
    build_name_for, BuildConfig, BuildConfigBuilder, BuildManifest, Cell, CellLanguage,
    ChangeLog, ContentIssue, CourseConfig, CourseSpec, ManifestFormat, MarkdownTag,
    NotebookDef, NotebookEntry, NotebookReport, PublishReport, Severity,
};
pub use error::{ConfigError, PublishError, RepoKind, Result};
pub use html::{PublishLink, PublishedMessage, ResultDescriptor};
pub use i18n::{GuidDirectiveParser, GuidRegistry, I18nDirective, ResourceBundle};
pub use publisher::{Collaborators, Publisher, KEEPERS, VERSION_INFO_NOTEBOOK};
pub use telemetry::init_tracing;

pub use courseware_ports::{
    ArtifactContext, ArtifactValidator, DocsRenderer, DocsRequest, FsWorkspace, PortError,
    PublishingInfo, RepoInspector, Translation, WorkspaceClient,
};
