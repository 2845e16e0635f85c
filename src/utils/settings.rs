//! User settings from `$HOME/.git-deploy/settings.json`.
//!
//! The `env` map backs up environment variables that are not set in the
//! process environment.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Shell command used as the external summarizer.
pub const SUMMARIZER_ENV: &str = "GIT_DEPLOY_SUMMARIZER";

/// Name recorded as `Deployed By` in deployment logs.
pub const DEPLOYED_BY_ENV: &str = "GIT_DEPLOY_DEPLOYED_BY";

/// Settings loaded from `$HOME/.git-deploy/settings.json`.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Environment variable fallbacks.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Settings {
    /// Loads settings from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from_path(Self::get_settings_path()?)
    }

    /// Loads settings from a specific path; a missing file yields defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        serde_json::from_str::<Self>(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    /// Returns the default settings path.
    pub fn get_settings_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Failed to determine home directory")?;
        Ok(home_dir.join(".git-deploy").join("settings.json"))
    }

    /// Returns an environment variable, falling back to the settings map.
    ///
    /// Empty values count as unset.
    pub fn get_env_var(&self, key: &str) -> Option<String> {
        env::var(key)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| self.env.get(key).cloned())
            .filter(|value| !value.trim().is_empty())
    }
}
