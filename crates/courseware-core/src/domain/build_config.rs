//! Build configuration: the notebook set of one course version and the
//! white/black lists that partition it.
//!
//! A [`BuildConfig`] is assembled through [`BuildConfigBuilder`] (or loaded from
//! a [`BuildManifest`]) and validated on construction, so the publisher only
//! ever sees a consistent configuration.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use courseware_ports::{PortError, PublishingInfo, WorkspaceClient};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::course_config::{CourseConfig, CourseSpec};
use crate::domain::notebook::{parse_source, CellLanguage, NotebookDef};
use crate::error::{ConfigError, PublishError, Result};

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z\d]").unwrap());

/// Derive the build name of a course: every non-alphanumeric character
/// becomes `-` and runs of `-` collapse to one.
pub fn build_name_for(name: &str) -> String {
    let mut build_name = NON_ALPHANUMERIC.replace_all(name, "-").into_owned();
    while build_name.contains("--") {
        build_name = build_name.replace("--", "-");
    }
    build_name
}

/// Release notes of one version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLog {
    pub version: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub entries: Vec<String>,
}

impl std::fmt::Display for ChangeLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.date {
            Some(date) => writeln!(f, "Change Log v{} ({date})", self.version)?,
            None => writeln!(f, "Change Log v{}", self.version)?,
        }
        for entry in &self.entries {
            writeln!(f, "* {entry}")?;
        }
        Ok(())
    }
}

/// Validated configuration of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub name: String,
    pub version: String,
    pub build_name: String,
    pub source_repo: String,
    pub source_dir: String,
    pub username: Option<String>,
    /// Default i18n enforcement for notebooks that do not set their own.
    pub i18n: bool,
    /// Target language of a translated build; `None` for the English source.
    pub i18n_language: Option<String>,
    /// Notebooks in insertion order. Paths are unique.
    pub notebooks: Vec<NotebookDef>,
    pub white_list: Option<Vec<String>>,
    pub black_list: Option<Vec<String>>,
    pub change_log: Option<ChangeLog>,
    pub publishing_info: Option<PublishingInfo>,
    /// Runtime descriptor shipped with the course, when the manifest has one.
    pub course: Option<CourseConfig>,
}

impl BuildConfig {
    pub fn builder(
        name: impl Into<String>,
        version: impl Into<String>,
        source_repo: impl Into<String>,
    ) -> BuildConfigBuilder {
        BuildConfigBuilder::new(name, version, source_repo)
    }

    pub fn notebook(&self, path: &str) -> Option<&NotebookDef> {
        self.notebooks.iter().find(|n| n.path == path)
    }

    pub fn notebook_paths(&self) -> Vec<&str> {
        self.notebooks.iter().map(|n| n.path.as_str()).collect()
    }

    /// Whether `path` is black-listed.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.black_list
            .as_ref()
            .is_some_and(|list| list.iter().any(|p| p == path))
    }

    /// `english` for source builds, otherwise the `i18n_language` prefix
    /// before `-` (e.g. `japanese` for `japanese-ja`).
    pub fn common_language(&self) -> String {
        match &self.i18n_language {
            None => "english".to_string(),
            Some(language) => language
                .split('-')
                .next()
                .unwrap_or(language)
                .to_string(),
        }
    }

    /// Re-check every construction invariant.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        for (field, value) in [
            ("name", &self.name),
            ("version", &self.version),
            ("source_repo", &self.source_repo),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyField { field });
            }
        }

        let mut seen = HashSet::new();
        for notebook in &self.notebooks {
            if !seen.insert(notebook.path.as_str()) {
                return Err(ConfigError::DuplicateNotebook {
                    path: notebook.path.clone(),
                });
            }
        }

        validate_lists(
            &self.notebook_paths(),
            self.white_list.as_deref(),
            self.black_list.as_deref(),
        )
    }

    /// Fill every notebook's cells from its source export under `source_dir`.
    pub async fn load_sources(&mut self, workspace: &dyn WorkspaceClient) -> Result<()> {
        for notebook in &mut self.notebooks {
            let path = format!("{}/{}", self.source_dir, notebook.file_name());
            let text = workspace.read(&path).await?.ok_or_else(|| {
                PublishError::Collaborator(PortError::NotFound { path: path.clone() })
            })?;
            notebook.cells = parse_source(&text, notebook.language);
            debug!(path = %notebook.path, cells = notebook.cells.len(), "Loaded notebook source");
        }
        Ok(())
    }
}

/// Either both lists are absent, or both are present, disjoint and together
/// cover exactly the notebook paths.
fn validate_lists(
    paths: &[&str],
    white_list: Option<&[String]>,
    black_list: Option<&[String]>,
) -> std::result::Result<(), ConfigError> {
    let (white, black) = match (white_list, black_list) {
        (None, None) => return Ok(()),
        (None, Some(_)) => return Err(ConfigError::MissingWhiteList),
        (Some(_), None) => return Err(ConfigError::MissingBlackList),
        (Some(white), Some(black)) => (white, black),
    };

    for (list, other, entries, others) in [
        ("white_list", "black_list", white, black),
        ("black_list", "white_list", black, white),
    ] {
        for path in entries {
            if others.contains(path) {
                return Err(ConfigError::PathInBothLists {
                    list,
                    other,
                    path: path.clone(),
                });
            }
            if !paths.contains(&path.as_str()) {
                return Err(ConfigError::UnknownListedPath {
                    list,
                    path: path.clone(),
                });
            }
        }
    }

    for path in paths {
        if !white.iter().any(|p| p == *path) && !black.iter().any(|p| p == *path) {
            return Err(ConfigError::UnlistedNotebook {
                path: path.to_string(),
            });
        }
    }
    Ok(())
}

/// Builder for [`BuildConfig`].
#[derive(Debug, Clone)]
pub struct BuildConfigBuilder {
    name: String,
    version: String,
    source_repo: String,
    source_dir: Option<String>,
    username: Option<String>,
    i18n: bool,
    i18n_language: Option<String>,
    notebooks: Vec<NotebookDef>,
    white_list: Option<Vec<String>>,
    black_list: Option<Vec<String>>,
    change_log: Option<ChangeLog>,
    publishing_info: Option<PublishingInfo>,
    course: Option<CourseSpec>,
}

impl BuildConfigBuilder {
    fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        source_repo: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            source_repo: source_repo.into(),
            source_dir: None,
            username: None,
            i18n: false,
            i18n_language: None,
            notebooks: Vec::new(),
            white_list: None,
            black_list: None,
            change_log: None,
            publishing_info: None,
            course: None,
        }
    }

    pub fn source_dir(mut self, source_dir: impl Into<String>) -> Self {
        self.source_dir = Some(source_dir.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn i18n(mut self, enabled: bool) -> Self {
        self.i18n = enabled;
        self
    }

    pub fn i18n_language(mut self, language: impl Into<String>) -> Self {
        self.i18n_language = Some(language.into());
        self
    }

    pub fn notebook(mut self, notebook: NotebookDef) -> Self {
        self.notebooks.push(notebook);
        self
    }

    pub fn white_list<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.white_list = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    pub fn black_list<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.black_list = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    pub fn change_log(mut self, change_log: ChangeLog) -> Self {
        self.change_log = Some(change_log);
        self
    }

    pub fn publishing_info(mut self, info: PublishingInfo) -> Self {
        self.publishing_info = Some(info);
        self
    }

    pub fn course(mut self, spec: CourseSpec) -> Self {
        self.course = Some(spec);
        self
    }

    /// Validate and produce the configuration.
    ///
    /// Every notebook inherits the build's `i18n_language`.
    pub fn build(self) -> std::result::Result<BuildConfig, ConfigError> {
        let course = self.course.map(CourseConfig::new).transpose()?;
        let source_dir = self
            .source_dir
            .unwrap_or_else(|| format!("{}/Source", self.source_repo));
        let notebooks = self
            .notebooks
            .into_iter()
            .map(|mut n| {
                n.i18n_language = self.i18n_language.clone();
                n
            })
            .collect();

        let config = BuildConfig {
            build_name: build_name_for(&self.name),
            name: self.name,
            version: self.version,
            source_repo: self.source_repo,
            source_dir,
            username: self.username,
            i18n: self.i18n,
            i18n_language: self.i18n_language,
            notebooks,
            white_list: self.white_list,
            black_list: self.black_list,
            change_log: self.change_log,
            publishing_info: self.publishing_info,
            course,
        };
        config.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// On-disk format of a build manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    Toml,
}

impl ManifestFormat {
    /// Pick the format from a file name; anything not ending in `.toml` is JSON.
    pub fn from_path(path: &str) -> Self {
        if path.to_ascii_lowercase().ends_with(".toml") {
            ManifestFormat::Toml
        } else {
            ManifestFormat::Json
        }
    }
}

/// One notebook entry of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookEntry {
    pub path: String,
    #[serde(default)]
    pub language: CellLanguage,
    /// Overrides the manifest-level `i18n` flag.
    #[serde(default)]
    pub i18n: Option<bool>,
    #[serde(default)]
    pub test_round: u32,
    #[serde(default)]
    pub replacements: BTreeMap<String, String>,
}

/// Serialized form of a [`BuildConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    pub name: String,
    pub version: String,
    pub source_repo: String,
    #[serde(default)]
    pub source_dir: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub i18n: bool,
    #[serde(default)]
    pub i18n_language: Option<String>,
    #[serde(default)]
    pub notebooks: Vec<NotebookEntry>,
    #[serde(default)]
    pub white_list: Option<Vec<String>>,
    #[serde(default)]
    pub black_list: Option<Vec<String>>,
    #[serde(default)]
    pub change_log: Option<ChangeLog>,
    #[serde(default)]
    pub publishing_info: Option<PublishingInfo>,
    #[serde(default)]
    pub course: Option<CourseSpec>,
}

impl BuildManifest {
    pub fn from_json_str(text: &str) -> std::result::Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Manifest(e.to_string()))
    }

    pub fn from_toml_str(text: &str) -> std::result::Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Manifest(e.to_string()))
    }

    pub fn parse(text: &str, format: ManifestFormat) -> std::result::Result<Self, ConfigError> {
        match format {
            ManifestFormat::Json => Self::from_json_str(text),
            ManifestFormat::Toml => Self::from_toml_str(text),
        }
    }

    /// Build and validate the configuration. Notebook cells are left empty;
    /// see [`BuildConfig::load_sources`].
    pub fn into_config(self) -> std::result::Result<BuildConfig, ConfigError> {
        let mut builder = BuildConfig::builder(self.name, self.version, self.source_repo)
            .i18n(self.i18n);
        if let Some(source_dir) = self.source_dir {
            builder = builder.source_dir(source_dir);
        }
        if let Some(username) = self.username {
            builder = builder.username(username);
        }
        if let Some(language) = self.i18n_language {
            builder = builder.i18n_language(language);
        }
        for entry in self.notebooks {
            let mut notebook = NotebookDef::new(entry.path, entry.language)
                .with_i18n(entry.i18n.unwrap_or(self.i18n))
                .with_test_round(entry.test_round);
            notebook.replacements = entry.replacements;
            builder = builder.notebook(notebook);
        }
        if let Some(white_list) = self.white_list {
            builder = builder.white_list(white_list);
        }
        if let Some(black_list) = self.black_list {
            builder = builder.black_list(black_list);
        }
        if let Some(change_log) = self.change_log {
            builder = builder.change_log(change_log);
        }
        if let Some(info) = self.publishing_info {
            builder = builder.publishing_info(info);
        }
        if let Some(course) = self.course {
            builder = builder.course(course);
        }
        builder.build()
    }
}
