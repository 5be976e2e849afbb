//! Configuration management for aqualog.
//!
//! Loads configuration from ${AQUALOG_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend base URL (overridden by the `AQUALOG_BASE_URL` env var).
    pub base_url: Option<String>,
}

impl Config {
    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if the file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Returns the effective backend base URL (env > config > default).
    ///
    /// # Errors
    /// Returns an error if the configured URL is malformed.
    pub fn effective_base_url(&self) -> Result<String> {
        api::resolve_base_url(self.base_url.as_deref())
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    ///
    /// # Errors
    /// Returns an error if the file exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        let contents = format!(
            "# aqualog configuration\n\
             #\n\
             # Backend base URL. Also overridable with AQUALOG_BASE_URL.\n\
             # base_url = \"{}\"\n",
            api::DEFAULT_BASE_URL
        );
        Self::write_config(path, &contents)
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

pub mod paths {
    //! Path resolution for aqualog configuration and data directories.
    //!
    //! AQUALOG_HOME resolution order:
    //! 1. AQUALOG_HOME environment variable (if set)
    //! 2. ~/.config/aqualog (default)

    use std::path::PathBuf;

    /// Returns the aqualog home directory.
    ///
    /// Checks AQUALOG_HOME env var first, falls back to ~/.config/aqualog
    ///
    /// # Panics
    /// Panics if the home directory cannot be determined.
    pub fn aqualog_home() -> PathBuf {
        if let Ok(home) = std::env::var("AQUALOG_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map(|h| h.join(".config").join("aqualog"))
            .expect("Could not determine home directory")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        aqualog_home().join("config.toml")
    }

    /// Returns the path to the persisted credential file.
    pub fn auth_path() -> PathBuf {
        aqualog_home().join("auth.json")
    }
}
