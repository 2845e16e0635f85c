//! Project configuration for change analysis.
//!
//! `analysis.yaml` is resolved from the context directory with local
//! override support and global fallback:
//!
//! 1. `{dir}/local/analysis.yaml`
//! 2. `{dir}/analysis.yaml`
//! 3. `$XDG_CONFIG_HOME/git-deploy/analysis.yaml`
//! 4. `$HOME/.git-deploy/analysis.yaml`

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// File name of the analysis configuration.
pub const CONFIG_FILE_NAME: &str = "analysis.yaml";

/// Default context directory, relative to the repository root.
pub const DEFAULT_CONTEXT_DIR: &str = ".git-deploy";

/// Environment variable overriding the context directory.
pub const CONTEXT_DIR_ENV: &str = "GIT_DEPLOY_CONFIG_DIR";

/// Tunables for the analysis engine and the deployment workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Extra filename globs that mark a file as sensitive.
    pub sensitive_patterns: Vec<String>,
    /// Extra words that make an assigned key look like a secret.
    pub secret_keywords: Vec<String>,
    /// Globs whose changes are always reported as breaking.
    pub breaking_paths: Vec<String>,
    /// Directory holding deployment logs, relative to the repository root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    /// README receiving the changelog, relative to the repository root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readme: Option<PathBuf>,
    /// Shell command producing a JSON summary from a prompt on stdin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summarizer_command: Option<String>,
}

impl AnalysisConfig {
    /// Parses configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).context("Failed to parse analysis configuration")
    }

    /// Loads configuration through the resolution chain.
    ///
    /// A missing file yields defaults; an unreadable or malformed file is
    /// logged and also yields defaults.
    pub fn load(context_dir: &Path) -> Self {
        let path = resolve_config_file(context_dir, CONFIG_FILE_NAME);
        if !path.exists() {
            debug!("No analysis configuration at {}", path.display());
            return Self::default();
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Cannot read analysis configuration {}: {e}", path.display());
                return Self::default();
            }
        };

        match Self::from_yaml(&content) {
            Ok(config) => {
                debug!("Loaded analysis configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!(
                    "Ignoring malformed analysis configuration {}: {e:#}",
                    path.display()
                );
                Self::default()
            }
        }
    }
}

/// A configured pattern that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    /// The offending pattern.
    pub pattern: String,
    /// Why it was skipped.
    pub message: String,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "skipping pattern '{}': {}", self.pattern, self.message)
    }
}

/// Returns the XDG-compliant config directory for git-deploy.
fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_home.is_empty() {
            return Some(PathBuf::from(xdg_home).join("git-deploy"));
        }
    }

    dirs::home_dir().map(|home| home.join(".config").join("git-deploy"))
}

/// Returns the legacy global config directory, `$HOME/.git-deploy`.
fn home_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".git-deploy"))
}

/// Resolves the context directory.
///
/// Priority: `override_dir` (from `--context-dir`), then
/// `GIT_DEPLOY_CONFIG_DIR`, then `.git-deploy`. Relative results are
/// joined onto `repo_root`.
pub fn resolve_context_dir(override_dir: Option<&Path>, repo_root: &Path) -> PathBuf {
    let dir = if let Some(dir) = override_dir {
        dir.to_path_buf()
    } else {
        match std::env::var(CONTEXT_DIR_ENV) {
            Ok(env_dir) if !env_dir.is_empty() => PathBuf::from(env_dir),
            _ => PathBuf::from(DEFAULT_CONTEXT_DIR),
        }
    };

    if dir.is_absolute() {
        dir
    } else {
        repo_root.join(dir)
    }
}

/// Resolves a configuration file path, falling back to the project path.
pub fn resolve_config_file(dir: &Path, filename: &str) -> PathBuf {
    match config_source_label(dir, filename) {
        ConfigSourceLabel::LocalOverride(path)
        | ConfigSourceLabel::Project(path)
        | ConfigSourceLabel::Xdg(path)
        | ConfigSourceLabel::Global(path) => path,
        ConfigSourceLabel::NotFound => dir.join(filename),
    }
}

/// Identifies which resolution tier a config file was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSourceLabel {
    /// Found in `{dir}/local/{filename}`.
    LocalOverride(PathBuf),
    /// Found in `{dir}/{filename}`.
    Project(PathBuf),
    /// Found in `$XDG_CONFIG_HOME/git-deploy/{filename}`.
    Xdg(PathBuf),
    /// Found in `$HOME/.git-deploy/{filename}`.
    Global(PathBuf),
    /// Not found at any tier.
    NotFound,
}

impl fmt::Display for ConfigSourceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalOverride(p) => write!(f, "Local override: {}", p.display()),
            Self::Project(p) => write!(f, "Project: {}", p.display()),
            Self::Xdg(p) => write!(f, "Global (XDG): {}", p.display()),
            Self::Global(p) => write!(f, "Global: {}", p.display()),
            Self::NotFound => write!(f, "(not found)"),
        }
    }
}

/// Returns the source tier for a config file.
///
/// Checks each tier in priority order and returns the first match.
pub fn config_source_label(dir: &Path, filename: &str) -> ConfigSourceLabel {
    let local_path = dir.join("local").join(filename);
    if local_path.exists() {
        return ConfigSourceLabel::LocalOverride(local_path);
    }

    let project_path = dir.join(filename);
    if project_path.exists() {
        return ConfigSourceLabel::Project(project_path);
    }

    if let Some(xdg_dir) = xdg_config_dir() {
        let xdg_path = xdg_dir.join(filename);
        if xdg_path.exists() {
            return ConfigSourceLabel::Xdg(xdg_path);
        }
    }

    if let Some(home_dir) = home_config_dir() {
        let home_path = home_dir.join(filename);
        if home_path.exists() {
            return ConfigSourceLabel::Global(home_path);
        }
    }

    ConfigSourceLabel::NotFound
}
