//! Courseware - notebook courseware publisher CLI
//!
//! The `courseware` command loads a build manifest, reads the notebook sources
//! from a local workspace directory and drives the publisher against it.
//!
//! ## Commands
//!
//! - `validate`: Load and validate a build manifest
//! - `publish`: Generate the published notebooks, optionally followed by archives
//! - `bundle`: Write the English resource bundle of every notebook

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use courseware_core::obs::SessionSpan;
use courseware_core::{
    BuildConfig, BuildManifest, Collaborators, ManifestFormat, PublishReport, Publisher,
};
use courseware_ports::{
    ArtifactContext, ArtifactValidator, DocsRenderer, DocsRequest, FsWorkspace, GitInspector,
    PortError, PortResult,
};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "courseware")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Publish versioned, internationalized notebook courseware", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Local directory standing in for the workspace
    #[arg(long, global = true, env = "COURSEWARE_WORKSPACE", default_value = ".")]
    workspace: PathBuf,

    /// Build manifest (.json or .toml)
    #[arg(long, global = true, env = "COURSEWARE_CONFIG", default_value = "build.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the build manifest
    Validate,

    /// Generate the published notebooks into the target directory
    Publish {
        /// Target directory (default: /Repos/Temp/<build-name>)
        #[arg(long)]
        target_dir: Option<String>,

        /// Target repository URL
        #[arg(long)]
        target_repo_url: Option<String>,

        /// Target branch (default: published)
        #[arg(long)]
        branch: Option<String>,

        /// Do not test the source repository for uncommitted changes
        #[arg(long)]
        skip_source_check: bool,

        /// Do not test the target repository for uncommitted changes
        #[arg(long)]
        skip_target_check: bool,

        /// Also check the target repository and create the DBC archives
        #[arg(long)]
        archive: bool,

        /// Write the HTML publish report to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Log the source of every built cell
        #[arg(long)]
        debugging: bool,
    },

    /// Create the English resource bundle
    Bundle {
        /// Bundle folder name (default: english-v<version>)
        #[arg(long)]
        folder: Option<String>,

        /// Directory the bundle folder is created in (default: <source-repo>/Resources)
        #[arg(long)]
        target: Option<String>,
    },
}

/// Stand-in for the docs renderer and artifact validator, which have no local
/// implementation.
struct Unavailable;

#[async_trait]
impl DocsRenderer for Unavailable {
    async fn render(
        &self,
        notebook_path: &str,
        _arguments: &BTreeMap<String, String>,
    ) -> PortResult<()> {
        Err(PortError::Render {
            target: notebook_path.to_string(),
            reason: "notebook runs are not available in a local workspace".to_string(),
        })
    }

    async fn render_docs(&self, request: &DocsRequest) -> PortResult<String> {
        Err(PortError::Render {
            target: request.build_name.clone(),
            reason: "docs processing is not available in a local workspace".to_string(),
        })
    }
}

#[async_trait]
impl ArtifactValidator for Unavailable {
    async fn validate(&self, _context: &ArtifactContext) -> PortResult<()> {
        Err(PortError::Validation(
            "artifact validation is not available in a local workspace".to_string(),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    courseware_core::init_tracing(cli.json, level);

    let workspace = FsWorkspace::new(&cli.workspace)
        .with_context(|| format!("Failed to open workspace {:?}", cli.workspace))?;

    match cli.command {
        Commands::Validate => cmd_validate(&workspace, &cli.config).await,
        Commands::Publish {
            target_dir,
            target_repo_url,
            branch,
            skip_source_check,
            skip_target_check,
            archive,
            report,
            debugging,
        } => {
            let options = PublishOptions {
                target_dir,
                target_repo_url,
                branch,
                skip_source_check,
                skip_target_check,
                archive,
                report,
                verbose: cli.verbose,
                debugging,
            };
            cmd_publish(&workspace, &cli.config, &options).await
        }
        Commands::Bundle { folder, target } => {
            cmd_bundle(&workspace, &cli.config, folder.as_deref(), target.as_deref()).await
        }
    }
}

/// Read a manifest from disk and load the notebook sources it names.
async fn load_config(workspace: &FsWorkspace, manifest: &Path) -> Result<BuildConfig> {
    let text = tokio::fs::read_to_string(manifest)
        .await
        .with_context(|| format!("Failed to read build manifest {:?}", manifest))?;
    let format = ManifestFormat::from_path(&manifest.to_string_lossy());
    let mut config = BuildManifest::parse(&text, format)
        .and_then(BuildManifest::into_config)
        .with_context(|| format!("Invalid build manifest {:?}", manifest))?;
    config
        .load_sources(workspace)
        .await
        .context("Failed to load notebook sources")?;
    Ok(config)
}

fn publisher(workspace: &FsWorkspace, config: BuildConfig) -> Publisher {
    let ports = Collaborators::new(
        Arc::new(workspace.clone()),
        Arc::new(GitInspector::new(workspace.clone())),
        Arc::new(Unavailable),
        Arc::new(Unavailable),
    );
    Publisher::new(config, ports)
}

async fn cmd_validate(workspace: &FsWorkspace, manifest: &Path) -> Result<()> {
    let config = load_config(workspace, manifest).await?;
    let mut publisher = publisher(workspace, config);
    publisher.validate(false)?;

    let config = publisher.config();
    println!("{} v{} ({})", config.name, config.version, config.build_name);
    println!("Source:    {}", config.source_dir);
    println!("Language:  {}", config.common_language());
    if let Some(course) = &config.course {
        println!("Course:    {} ({})", course.course_code, course.supported_runtimes.join(", "));
    }
    println!("Notebooks: {}", config.notebooks.len());
    for notebook in &config.notebooks {
        let marker = if config.is_excluded(&notebook.path) { "-" } else { "+" };
        println!("  {} {} ({} cells)", marker, notebook.path, notebook.cells.len());
    }
    Ok(())
}

struct PublishOptions {
    target_dir: Option<String>,
    target_repo_url: Option<String>,
    branch: Option<String>,
    skip_source_check: bool,
    skip_target_check: bool,
    archive: bool,
    report: Option<PathBuf>,
    verbose: bool,
    debugging: bool,
}

async fn cmd_publish(
    workspace: &FsWorkspace,
    manifest: &Path,
    options: &PublishOptions,
) -> Result<()> {
    let config = load_config(workspace, manifest).await?;
    let mut publisher = publisher(workspace, config);
    let _span = SessionSpan::enter(publisher.session_id(), &publisher.config().build_name);

    publisher.validate(!options.verbose)?;
    publisher
        .configure_target_repo(
            options.target_dir.as_deref(),
            options.target_repo_url.as_deref(),
            options.branch.as_deref(),
        )
        .await?;
    publisher
        .validate_no_changes_in_source_repo(options.skip_source_check)
        .await?;

    let report = publisher
        .generate_notebooks(options.verbose, options.debugging)
        .await?;
    print_report(&report);
    if let Some(path) = &options.report {
        tokio::fs::write(path, &report.html)
            .await
            .with_context(|| format!("Failed to write report {:?}", path))?;
    }
    if !report.succeeded() {
        bail!(
            "publishing {} failed with {} error(s)",
            report.target_dir,
            report.total_errors()
        );
    }

    if options.archive {
        publisher
            .validate_no_changes_in_target_repo(options.skip_target_check)
            .await?;
        let dbcs = publisher.create_dbcs().await?;
        info!(summary = %dbcs.summary, "Created DBCs");
        println!("DBC sha256: {}", dbcs.detail("sha256").unwrap_or_default());
        for (_, target) in dbcs.details.iter().filter(|(label, _)| label == "target") {
            println!("  {}", target);
        }
    }
    Ok(())
}

fn print_report(report: &PublishReport) {
    println!(
        "Published {} notebook(s) to {}",
        report.notebooks.len(),
        report.target_dir
    );
    for (path, warnings) in report.warning_messages() {
        println!("{}:", path);
        for warning in warnings {
            println!("  warning: {}", warning);
        }
    }
    for error in report.error_messages() {
        println!("  error: {}", error);
    }
    if !report.excluded.is_empty() {
        println!("Excluded: {}", report.excluded.join(", "));
    }
}

async fn cmd_bundle(
    workspace: &FsWorkspace,
    manifest: &Path,
    folder: Option<&str>,
    target: Option<&str>,
) -> Result<()> {
    let config = load_config(workspace, manifest).await?;
    let publisher = publisher(workspace, config);
    let descriptor = publisher.create_resource_bundle(folder, target).await?;
    println!("{}", descriptor.summary);
    if let Some(link) = &descriptor.link {
        println!("{}", link.url);
    }
    Ok(())
}
