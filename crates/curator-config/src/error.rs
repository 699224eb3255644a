//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, validating, or saving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A config file exists but could not be read
    #[error("cannot read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A config file is not valid TOML (or fails validation on load)
    #[error("config '{path}' is not valid TOML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Writing a config file (or creating its directory) failed
    #[error("cannot write config '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serializing the in-memory config failed
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// No home directory to anchor the global config under
    #[error("could not determine home directory")]
    NoHomeDir,

    /// A database name was requested that no section declares
    #[error("no database named '{0}' in configuration")]
    UnknownDatabase(String),

    /// A declared section is missing required fields
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
