//! Domain model: build configuration, notebooks and generation reports.

pub mod build_config;
pub mod course_config;
pub mod notebook;
pub mod report;

pub use build_config::{
    build_name_for, BuildConfig, BuildConfigBuilder, BuildManifest, ChangeLog, ManifestFormat,
    NotebookEntry,
};
pub use course_config::{CourseConfig, CourseSpec, SUPPORTED_RUNTIMES_TOKEN};
pub use notebook::{Cell, CellLanguage, MarkdownTag, NotebookDef};
pub use report::{ContentIssue, NotebookReport, PublishReport, Severity};
