//! The publish pipeline.
//!
//! A [`Publisher`] owns one build session: the validated [`BuildConfig`], the
//! injected collaborators and the [`BuildStateMachine`] that gates every
//! operation. The happy path is
//!
//! ```text
//! validate → configure_target_repo → validate_no_changes_in_source_repo
//!          → generate_notebooks → validate_no_changes_in_target_repo
//!          → create_dbcs → create_docs → validate_artifacts
//!          → create_published_message
//! ```
//!
//! Calls out of order fail with `PreconditionNotMet`; collaborator failures
//! propagate unchanged and are never retried.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use courseware_ports::{
    ArtifactContext, ArtifactValidator, DocsRenderer, DocsRequest, RepoInspector, WorkspaceClient,
};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::build_state::{BuildFlags, BuildStage, BuildStateMachine};
use crate::content::NotebookContentBuilder;
use crate::docs::{SourceDocsGenerator, SourceDocsReport, DEFAULT_RENDER_TIMEOUT};
use crate::domain::build_config::BuildConfig;
use crate::domain::report::PublishReport;
use crate::error::{ConfigError, PublishError, RepoKind, Result};
use crate::html::{self, PublishLink, PublishedMessage, ResultDescriptor};
use crate::i18n::ResourceBundle;
use crate::obs;

/// Release notebook every published build must include.
pub const VERSION_INFO_NOTEBOOK: &str = "Version Info";

/// Direct children of the target directory that survive a regeneration.
pub const KEEPERS: [&str; 4] = [".gitignore", "README.md", "LICENSE", "docs"];

/// Organisation hosting the course repositories.
pub const REPO_HOST: &str = "https://github.com/databricks-academy";

pub const DEFAULT_BRANCH: &str = "published";

const DISTRIBUTIONS_ROOT: &str = "dbfs:/mnt/secured.training.databricks.com/distributions";

/// Format of the `built_on` token.
pub const BUILT_ON_FORMAT: &str = "%b %-d, %Y at %H:%M:%S UTC";

/// External systems a publisher talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub workspace: Arc<dyn WorkspaceClient>,
    pub inspector: Arc<dyn RepoInspector>,
    pub renderer: Arc<dyn DocsRenderer>,
    pub validator: Arc<dyn ArtifactValidator>,
}

impl Collaborators {
    pub fn new(
        workspace: Arc<dyn WorkspaceClient>,
        inspector: Arc<dyn RepoInspector>,
        renderer: Arc<dyn DocsRenderer>,
        validator: Arc<dyn ArtifactValidator>,
    ) -> Self {
        Self {
            workspace,
            inspector,
            renderer,
            validator,
        }
    }
}

/// One publish session over a build configuration.
pub struct Publisher {
    config: BuildConfig,
    ports: Collaborators,
    state: BuildStateMachine,
    session_id: String,
    target_dir: String,
    target_repo_url: Option<String>,
    built_on: String,
    docs_timeout: Duration,
    archive_digest: Option<String>,
}

impl Publisher {
    pub fn new(config: BuildConfig, ports: Collaborators) -> Self {
        let session_id = Uuid::new_v4().to_string();
        let target_dir = format!(
            "{}/Published/{} - v{}",
            config.source_repo, config.name, config.version
        );
        obs::emit_session_started(&session_id, &config.build_name, &config.version);

        Self {
            config,
            ports,
            state: BuildStateMachine::new(),
            session_id,
            target_dir,
            target_repo_url: None,
            built_on: Utc::now().format(BUILT_ON_FORMAT).to_string(),
            docs_timeout: DEFAULT_RENDER_TIMEOUT,
            archive_digest: None,
        }
    }

    /// Fix the `built_on` token instead of using the session start time.
    pub fn with_built_on(mut self, built_on: impl Into<String>) -> Self {
        self.built_on = built_on.into();
        self
    }

    pub fn with_docs_timeout(mut self, timeout: Duration) -> Self {
        self.docs_timeout = timeout;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn stage(&self) -> BuildStage {
        self.state.stage()
    }

    pub fn flags(&self) -> BuildFlags {
        self.state.flags()
    }

    pub fn target_dir(&self) -> &str {
        &self.target_dir
    }

    pub fn target_repo_url(&self) -> Option<&str> {
        self.target_repo_url.as_deref()
    }

    pub fn built_on(&self) -> &str {
        &self.built_on
    }

    /// `<source_repo>/Resources/<i18n_language>` for translated builds.
    pub fn i18n_resources_dir(&self) -> Option<String> {
        self.config
            .i18n_language
            .as_ref()
            .map(|language| format!("{}/Resources/{language}", self.config.source_repo))
    }

    fn default_target_dir(&self) -> String {
        format!("/Repos/Temp/{}", self.config.build_name)
    }

    fn default_target_repo_url(&self) -> String {
        format!("{REPO_HOST}/{}.git", self.config.build_name)
    }

    fn source_repo_url(&self) -> String {
        format!("{REPO_HOST}/{}-source.git", self.config.build_name)
    }

    // -----------------------------------------------------------------------
    // Validation and repository state
    // -----------------------------------------------------------------------

    /// Validate the configuration.
    pub fn validate(&mut self, silent: bool) -> Result<()> {
        self.config.validate()?;
        if !silent {
            info!(source = %self.config.source_dir, target = %self.target_dir, "Validated build configuration");
            if let Some(change_log) = &self.config.change_log {
                info!(change_log = %change_log, "Change log");
            }
        }
        self.state.complete("validate", BuildStage::ConfigValidated)
    }

    /// Reset the target repository checkout.
    ///
    /// Defaults: `/Repos/Temp/<build_name>`, `<host>/<build_name>.git` and the
    /// `published` branch. The repo-reset stage and any target check are
    /// invalidated first, so a failed reset blocks generation until this call
    /// succeeds and the new checkout has to be checked again.
    pub async fn configure_target_repo(
        &mut self,
        target_dir: Option<&str>,
        target_repo_url: Option<&str>,
        branch: Option<&str>,
    ) -> Result<()> {
        self.state
            .require("configure the target repo", BuildStage::ConfigValidated)?;
        self.state.invalidate(BuildStage::RepoResetValidated);
        self.state.forget_repo_changes(RepoKind::Target);

        let default_dir = self.default_target_dir();
        if target_dir == Some(default_dir.as_str()) {
            obs::emit_deprecated_default("target_dir", &default_dir);
        }
        let default_url = self.default_target_repo_url();
        if target_repo_url == Some(default_url.as_str()) {
            obs::emit_deprecated_default("target_repo_url", &default_url);
        }

        let target_dir = target_dir.map(str::to_string).unwrap_or(default_dir);
        let target_repo_url = target_repo_url.map(str::to_string).unwrap_or(default_url);
        let branch = branch.unwrap_or(DEFAULT_BRANCH);

        self.ports
            .workspace
            .reset_repo(&target_dir, &target_repo_url, branch)
            .await?;

        info!(target_dir = %target_dir, repo_url = %target_repo_url, branch = %branch, "Reset target repo");
        self.target_dir = target_dir;
        self.target_repo_url = Some(target_repo_url);
        self.state
            .complete("configure the target repo", BuildStage::RepoResetValidated)
    }

    /// Count pending changes in the source repository.
    ///
    /// With `skip` the check is bypassed and the repository recorded clean.
    pub async fn validate_no_changes_in_source_repo(&mut self, skip: bool) -> Result<usize> {
        let url = self.source_repo_url();
        let directory = self.config.source_repo.clone();
        self.check_repo(RepoKind::Source, &url, &directory, skip).await
    }

    /// Count pending changes in the target repository.
    pub async fn validate_no_changes_in_target_repo(&mut self, skip: bool) -> Result<usize> {
        let url = self
            .target_repo_url
            .clone()
            .unwrap_or_else(|| self.default_target_repo_url());
        let directory = self.target_dir.clone();
        self.check_repo(RepoKind::Target, &url, &directory, skip).await
    }

    async fn check_repo(
        &mut self,
        repo: RepoKind,
        url: &str,
        directory: &str,
        skip: bool,
    ) -> Result<usize> {
        if skip {
            obs::emit_repo_check_skipped(repo.name(), directory);
            self.state.record_repo_changes(repo, 0);
            return Ok(0);
        }
        let changes = self.ports.inspector.count_changes(url, directory).await?;
        obs::emit_repo_checked(repo.name(), directory, changes);
        self.state.record_repo_changes(repo, changes);
        self.state.require_clean(repo)?;
        Ok(changes)
    }

    // -----------------------------------------------------------------------
    // Content
    // -----------------------------------------------------------------------

    /// Write the English resource bundle of every notebook.
    ///
    /// Defaults to `english-v<version>` under `<source_repo>/Resources`.
    pub async fn create_resource_bundle(
        &self,
        folder_name: Option<&str>,
        target_dir: Option<&str>,
    ) -> Result<ResultDescriptor> {
        if let Some(language) = &self.config.i18n_language {
            return Err(ConfigError::ResourceBundleLanguage {
                language: language.clone(),
            }
            .into());
        }

        let folder_name = folder_name
            .map(str::to_string)
            .unwrap_or_else(|| format!("english-v{}", self.config.version));
        let target_dir = target_dir
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}/Resources", self.config.source_repo));
        let root = format!("{target_dir}/{folder_name}");

        let mut entries = 0;
        for notebook in &self.config.notebooks {
            let bundle = ResourceBundle::from_notebook(notebook);
            entries += bundle.len();
            self.ports
                .workspace
                .write(&format!("{root}/{}.md", notebook.path), &bundle.render())
                .await?;
        }
        info!(root = %root, notebooks = self.config.notebooks.len(), entries, "Created resource bundle");

        Ok(ResultDescriptor::new(
            "Resource Bundle",
            format!(
                "Wrote {entries} translatable cell(s) from {} notebook(s)",
                self.config.notebooks.len()
            ),
        )
        .with_link(PublishLink::new(
            format!("Resource Bundle: {folder_name}"),
            format!("/#workspace{root}/{VERSION_INFO_NOTEBOOK}.md"),
        )))
    }

    /// Publish every included notebook to the target directory.
    ///
    /// The notebooks-generated stage is reached only when no notebook
    /// reported an error; the report is returned either way.
    pub async fn generate_notebooks(
        &mut self,
        verbose: bool,
        debugging: bool,
    ) -> Result<PublishReport> {
        const OPERATION: &str = "generate notebooks";
        self.state
            .require(OPERATION, BuildStage::RepoResetValidated)?;
        self.state.require_not_dirty(RepoKind::Source)?;

        let (included, excluded): (Vec<_>, Vec<_>) = self
            .config
            .notebooks
            .iter()
            .partition(|n| !self.config.is_excluded(&n.path));
        if !included.iter().any(|n| n.path == VERSION_INFO_NOTEBOOK) {
            return Err(PublishError::MissingRequiredNotebook {
                name: VERSION_INFO_NOTEBOOK.to_string(),
            });
        }

        info!(
            source = %self.config.source_dir,
            target = %self.target_dir,
            verbose,
            debugging,
            included = included.len(),
            excluded = excluded.len(),
            "Generating notebooks"
        );

        let workspace = self.ports.workspace.as_ref();
        if workspace.exists(&self.target_dir).await? {
            debug!(target = %self.target_dir, keep = ?KEEPERS, "Clearing target directory");
            workspace.clear(&self.target_dir, &KEEPERS).await?;
        }

        let builder = NotebookContentBuilder::new(
            self.config.source_dir.clone(),
            self.target_dir.clone(),
            self.i18n_resources_dir().unwrap_or_default(),
        )
        .with_build_tokens(&self.config.version, &self.built_on)
        .with_notebook_paths(self.config.notebook_paths())
        .verbose(verbose)
        .debugging(debugging);

        let mut reports = Vec::with_capacity(included.len());
        for notebook in &included {
            reports.push(builder.publish(workspace, notebook).await?);
        }

        let report = PublishReport::new(
            self.target_dir.clone(),
            format!("#workspace{}/{VERSION_INFO_NOTEBOOK}", self.target_dir),
            reports,
            excluded.iter().map(|n| n.path.clone()).collect(),
        );
        obs::emit_generation_finished(
            report.notebooks.len(),
            report.total_errors(),
            report.total_warnings(),
        );

        if report.succeeded() {
            self.state
                .complete(OPERATION, BuildStage::NotebooksGenerated)?;
        } else {
            self.state.invalidate(BuildStage::NotebooksGenerated);
        }
        Ok(report)
    }

    /// Render the docs of every notebook that passed two test rounds.
    pub async fn generate_source_docs(&self, asynchronous: bool) -> SourceDocsReport {
        SourceDocsGenerator::new(
            Arc::clone(&self.ports.renderer),
            self.config.source_dir.clone(),
            self.config.version.clone(),
        )
        .with_timeout(self.docs_timeout)
        .generate(&self.config.notebooks, asynchronous)
        .await
    }

    // -----------------------------------------------------------------------
    // Artifacts
    // -----------------------------------------------------------------------

    /// Export the target directory and store it at the distribution targets.
    pub async fn create_dbcs(&mut self) -> Result<ResultDescriptor> {
        const OPERATION: &str = "create DBCs";
        self.state
            .require(OPERATION, BuildStage::NotebooksGenerated)?;
        self.state.require_clean(RepoKind::Target)?;

        let workspace = self.ports.workspace.as_ref();
        let data = workspace.export_archive(&self.target_dir).await?;
        let digest = hex::encode(Sha256::digest(&data));

        let build_name = &self.config.build_name;
        let version = &self.config.version;
        let file_name = format!("{build_name}-v{version}-notebooks.dbc");
        let targets = [
            (
                format!("{DISTRIBUTIONS_ROOT}/{build_name}/v{version}/{file_name}"),
                false,
            ),
            (
                format!("{DISTRIBUTIONS_ROOT}/{build_name}/vLATEST/notebooks.dbc"),
                false,
            ),
            (
                format!("dbfs:/FileStore/tmp/{build_name}-v{version}/{file_name}"),
                true,
            ),
        ];
        for (target, overwrite) in &targets {
            workspace.put_file(target, &data, *overwrite).await?;
            obs::emit_archive_stored(target, data.len(), &digest);
        }
        let url = format!("/files/tmp/{build_name}-v{version}/{file_name}");

        self.archive_digest = Some(digest.clone());
        self.state.complete(OPERATION, BuildStage::ArchivesCreated)?;

        let mut descriptor = ResultDescriptor::new(
            "DBCs",
            format!("Exported \"{}\" ({} bytes)", self.target_dir, data.len()),
        )
        .with_link(PublishLink::new("Download DBC", url))
        .with_detail("sha256", digest);
        for (target, _) in targets {
            descriptor = descriptor.with_detail("target", target);
        }
        Ok(descriptor)
    }

    /// Process the PDFs and slides of the build's translation.
    pub async fn create_docs(&mut self) -> Result<ResultDescriptor> {
        const OPERATION: &str = "create docs";
        self.state.require(OPERATION, BuildStage::ArchivesCreated)?;

        let common_language = self.config.common_language();
        let translation = self
            .config
            .publishing_info
            .as_ref()
            .and_then(|info| info.translation(&common_language))
            .cloned();
        if translation.is_none() {
            debug!(language = %common_language, "No translation metadata for build");
        }
        let request = DocsRequest {
            build_name: self.config.build_name.clone(),
            version: self.config.version.clone(),
            translation,
        };
        let html = self.ports.renderer.render_docs(&request).await?;

        self.state.complete(OPERATION, BuildStage::DocsCreated)?;
        Ok(ResultDescriptor::new(
            "Docs",
            format!("Processed docs for {common_language}"),
        )
        .with_body_html(html))
    }

    /// Verify the distributed artifacts.
    pub async fn validate_artifacts(&mut self) -> Result<()> {
        const OPERATION: &str = "validate artifacts";
        self.state.require(OPERATION, BuildStage::DocsCreated)?;

        let context = ArtifactContext {
            build_name: self.config.build_name.clone(),
            version: self.config.version.clone(),
            target_dir: self.target_dir.clone(),
            common_language: self.config.common_language(),
            archive_digest: self.archive_digest.clone(),
        };
        self.ports.validator.validate(&context).await?;
        self.state.complete(OPERATION, BuildStage::ArtifactsValidated)
    }

    /// Compose the announcement of the published version.
    pub fn create_published_message(&self) -> Result<PublishedMessage> {
        self.state.require(
            "create the published message",
            BuildStage::ArtifactsValidated,
        )?;

        let info = self.config.publishing_info.as_ref();
        let translation = info.and_then(|i| i.translation(&self.config.common_language()));
        Ok(html::published_message(
            &self.config.name,
            &self.config.version,
            self.config.change_log.as_ref(),
            translation,
            info.and_then(|i| i.announcement_recipient.as_deref()),
        ))
    }

    /// Copy `<source_repo>/docs` to `<target_dir>/docs/v<version>`.
    pub async fn generate_published_docs(&self) -> Result<ResultDescriptor> {
        self.state
            .require("generate published docs", BuildStage::RepoResetValidated)?;

        let source = format!("{}/docs", self.config.source_repo);
        let target = format!("{}/docs/v{}", self.target_dir, self.config.version);
        let copied = self.ports.workspace.copy_tree(&source, &target).await?;
        info!(source = %source, target = %target, files = copied.len(), "Published docs");

        let mut descriptor = ResultDescriptor::new(
            "Published Docs",
            format!("Copied {} entries to \"{target}\"", copied.len()),
        )
        .with_link(PublishLink::new(
            "See Published Version",
            format!("#workspace{target}/index.html"),
        ));
        for entry in copied {
            descriptor = descriptor.with_detail("file", entry);
        }
        Ok(descriptor)
    }
}
