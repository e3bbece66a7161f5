//! Configuration management for LeafSync
//!
//! This crate handles loading and validating `.leafsync/config.toml`

use leaf_common::{LeafError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Location of the config file relative to the workspace root
pub const CONFIG_PATH: &str = ".leafsync/config.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Workspace root path (set programmatically, not in TOML)
    #[serde(skip)]
    pub root: PathBuf,

    /// Sync loop settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Remote document settings
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Sync configuration ([sync])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Pause between passes, in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Merge granularity: "character" or "line"
    #[serde(default = "default_granularity")]
    pub granularity: String,

    #[serde(default = "default_true")]
    pub rollback_remote_on_local_failure: bool,
}

fn default_interval_ms() -> u64 {
    1000
}
fn default_granularity() -> String {
    "character".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            granularity: default_granularity(),
            rollback_remote_on_local_failure: true,
        }
    }
}

/// Remote configuration ([remote])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Identifier used when the local document has no project-url marker
    #[serde(default = "default_url")]
    pub default_url: String,

    /// Marker key scanned for in the local document
    #[serde(default = "default_url_marker")]
    pub url_marker: String,
}

fn default_url() -> String {
    "https://overleaf.com/login".to_string()
}
fn default_url_marker() -> String {
    "overleaf-project-url".to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            default_url: default_url(),
            url_marker: default_url_marker(),
        }
    }
}

/// Logging configuration ([logging])
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub json: bool,
}

impl Config {
    /// Load configuration from workspace root
    pub fn load(workspace_root: &Path) -> Result<Self> {
        let config_path = workspace_root.join(CONFIG_PATH);

        if !config_path.exists() {
            return Ok(Self {
                root: workspace_root.to_path_buf(),
                ..Self::default()
            });
        }

        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| LeafError::ConfigError(format!("Failed to read config: {}", e)))?;

        let mut config: Config = toml::from_str(&content)
            .map_err(|e| LeafError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.root = workspace_root.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.sync.interval_ms == 0 {
            return Err(LeafError::ConfigError(
                "sync.interval_ms must be greater than zero".to_string(),
            ));
        }
        if !matches!(
            self.sync.granularity.to_ascii_lowercase().as_str(),
            "character" | "char" | "line"
        ) {
            return Err(LeafError::ConfigError(format!(
                "sync.granularity must be 'character' or 'line', got '{}'",
                self.sync.granularity
            )));
        }
        if self.remote.url_marker.trim().is_empty() {
            return Err(LeafError::ConfigError(
                "remote.url_marker cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
