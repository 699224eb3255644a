//! Curator configuration
//!
//! Database roots, import tuning, and logging settings come from three
//! layered sources: the global `~/.curator/config.toml`, a local
//! `.curator/config.toml` next to the project, and CLI overrides, each
//! layer winning over the one before it.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Fully merged configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CuratorConfig {
    /// Databases this process hosts
    pub databases: Vec<DatabaseConfig>,

    /// Import pipeline tuning
    pub import: ImportConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl CuratorConfig {
    /// Find a database section by name.
    pub fn database(&self, name: &str) -> Result<&DatabaseConfig, ConfigError> {
        self.databases
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| ConfigError::UnknownDatabase(name.to_string()))
    }

    /// Validate every database section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for db in &self.databases {
            db.validate()?;
        }
        Ok(())
    }

    /// Apply CLI overrides on top of the merged configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(concurrency) = overrides.concurrency {
            self.import.concurrency = concurrency;
        }
        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }
}

/// One mirrored database.
///
/// # Example TOML
///
/// ```toml
/// [[databases]]
/// name = "project"
/// target = "/work/game/assets"
/// library = "/work/game/library"
/// temp = "/work/game/temp"
/// ignore = ["*.bak", "**/~*"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database name; the authority of its `db://` urls
    pub name: String,

    /// Source tree to mirror
    pub target: PathBuf,

    /// Output root for imported artifacts
    pub library: PathBuf,

    /// Scratch root
    pub temp: PathBuf,

    /// Globs for files to track (empty = everything)
    pub include: Vec<String>,

    /// Globs for files to skip
    pub ignore: Vec<String>,

    /// Never write sidecars next to the sources
    pub read_only: bool,
}

impl DatabaseConfig {
    /// Validate that required fields are present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Invalid(
                "databases[].name is required".to_string(),
            ));
        }
        if self.target.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "database '{}' has no target",
                self.name
            )));
        }
        if self.library.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "database '{}' has no library root",
                self.name
            )));
        }
        Ok(())
    }
}

/// Import pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Concurrent import jobs
    pub concurrency: usize,

    /// Seconds before an in-flight importer is signalled unresponsive
    pub watchdog_secs: u64,

    /// Auxiliary data store save debounce in milliseconds
    pub data_debounce_ms: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            watchdog_secs: 8 * 60,
            data_debounce_ms: 400,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// CLI overrides applied after file-based configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub concurrency: Option<usize>,
    pub log_level: Option<String>,
}
