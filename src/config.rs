//! Configuration handling
//!
//! Configuration is stored in `~/.config/taskboard/config.toml` (or the
//! platform equivalent), or given explicitly with `--config`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Filter view settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Window used by the "due soon" toggle, in days (default 7)
    pub due_window_days: u32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { due_window_days: 7 }
    }
}

/// Sync settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Queue a push of the full snapshot after every local mutation
    pub push_on_mutation: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            push_on_mutation: true,
        }
    }
}

/// Task settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Appended to the title of a duplicated task
    pub copy_suffix: String,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            copy_suffix: " (copy)".to_string(),
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub filter: FilterConfig,
    pub sync: SyncConfig,
    pub tasks: TaskConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Loads configuration from `path`, or from the default location.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Returns the global config directory
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "taskboard", "taskboard").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Default location of `config.toml`
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("Failed to load config: {}", path.display()))
    }

    /// Parses and validates a TOML document
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tasks.copy_suffix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "tasks.copy_suffix must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}
