//! Courseware-Ports: collaborator contracts for the courseware publisher
//!
//! The publish pipeline never talks to a workspace, a git host or a renderer
//! directly. It goes through the capability traits defined here, which keeps
//! the pipeline testable against fakes and lets a local filesystem stand in for
//! a remote workspace.
//!
//! ## Key Components
//!
//! - `WorkspaceClient`: export/import, clear, repo reset, distribution drops
//! - `RepoInspector`: pending-change counts for checked-out repositories
//! - `DocsRenderer`: notebook doc runs and PDF/slide processing
//! - `ArtifactValidator`: verification of what was published
//! - `FsWorkspace` / `GitInspector`: local adapters for running without a
//!   remote workspace
//! - `PublishingInfo`: translation descriptors keyed by common language

mod error;
pub mod fakes;
pub mod fs;
pub mod git;
pub mod publishing;
pub mod traits;

pub use error::PortError;
pub use fs::FsWorkspace;
pub use git::GitInspector;
pub use publishing::{PublishingInfo, Translation};
pub use traits::{
    ArtifactContext, ArtifactValidator, DocsRenderer, DocsRequest, NotebookArchive, PortResult,
    RepoInspector, WorkspaceClient, REPO_METADATA_DIR,
};
