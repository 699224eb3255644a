//! Configuration loading and merging.
//!
//! Three sources feed the final configuration, later ones winning:
//! the global file under `~/.curator/`, the local `.curator/` directory
//! next to the project, and CLI overrides. The global file is read once
//! per loader and cached.

use crate::error::ConfigError;
use crate::{ConfigOverrides, CuratorConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const FILE_NAME: &str = "config.toml";
const DIR_NAME: &str = ".curator";

/// Loads and merges configuration from the global and local files.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Directory holding the global config, usually `~/.curator`.
    global_dir: Option<PathBuf>,
    cached_global: Option<CuratorConfig>,
}

impl ConfigLoader {
    /// Create a loader anchored at the user's home directory.
    pub fn new() -> Self {
        Self {
            global_dir: dirs::home_dir().map(|h| h.join(DIR_NAME)),
            cached_global: None,
        }
    }

    /// Create a loader with an explicit global directory (tests).
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_dir: Some(global_dir.into()),
            cached_global: None,
        }
    }

    /// Path of the global config file, when a home directory exists.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_dir.as_ref().map(|d| d.join(FILE_NAME))
    }

    /// Path of the local config file for a project root.
    pub fn local_config_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(DIR_NAME).join(FILE_NAME)
    }

    /// Merged configuration for a project: global, then local, then
    /// overrides.
    pub fn load(
        &mut self,
        project_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<CuratorConfig, ConfigError> {
        let mut config = self.load_global()?.unwrap_or_default();
        if let Some(local) = self.load_local(project_root)? {
            config = merge(config, local);
        }
        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }
        Ok(config)
    }

    /// The global configuration alone, cached after the first read.
    pub fn load_global(&mut self) -> Result<Option<CuratorConfig>, ConfigError> {
        if self.cached_global.is_none() {
            let Some(path) = self.global_config_path() else {
                debug!("No home directory, skipping global config");
                return Ok(None);
            };
            if !path.exists() {
                trace!("No global config at {:?}", path);
                return Ok(None);
            }
            debug!("Loading global config from {:?}", path);
            self.cached_global = Some(read_file(&path)?);
        }
        Ok(self.cached_global.clone())
    }

    /// The local configuration for a project root, if present.
    pub fn load_local(&self, project_root: &Path) -> Result<Option<CuratorConfig>, ConfigError> {
        let path = self.local_config_path(project_root);
        if !path.exists() {
            trace!("No local config at {:?}", path);
            return Ok(None);
        }
        debug!("Loading local config from {:?}", path);
        read_file(&path).map(Some)
    }

    /// Write a configuration to the global file, creating `~/.curator`
    /// as needed.
    pub fn save_global(&self, config: &CuratorConfig) -> Result<(), ConfigError> {
        let Some(ref dir) = self.global_dir else {
            return Err(ConfigError::NoHomeDir);
        };
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::Write {
            path: dir.clone(),
            source: e,
        })?;
        let path = dir.join(FILE_NAME);
        let text = toml::to_string_pretty(config)?;
        std::fs::write(&path, text).map_err(|e| ConfigError::Write { path, source: e })
    }
}

/// Overlay one configuration onto another, section-wise.
///
/// Databases replace as a whole when the overlay declares any; partial
/// per-database merging would silently combine roots from different
/// machines.
fn merge(base: CuratorConfig, overlay: CuratorConfig) -> CuratorConfig {
    CuratorConfig {
        databases: if overlay.databases.is_empty() {
            base.databases
        } else {
            overlay.databases
        },
        import: overlay.import,
        logging: overlay.logging,
    }
}

fn read_file(path: &Path) -> Result<CuratorConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let config: CuratorConfig = toml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DatabaseConfig;
    use tempfile::TempDir;

    fn write_local(dir: &Path, text: &str) {
        let config_dir = dir.join(DIR_NAME);
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join(FILE_NAME), text).unwrap();
    }

    #[test]
    fn test_load_without_any_config() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("no-global"));

        let config = loader.load(temp.path(), None).unwrap();
        assert!(config.databases.is_empty());
    }

    #[test]
    fn test_local_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("home/.curator");
        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::write(global_dir.join(FILE_NAME), "[import]\nconcurrency = 2\n").unwrap();

        let project = temp.path().join("project");
        std::fs::create_dir_all(&project).unwrap();
        write_local(&project, "[import]\nconcurrency = 9\n");

        let mut loader = ConfigLoader::with_global_dir(&global_dir);
        let config = loader.load(&project, None).unwrap();
        assert_eq!(config.import.concurrency, 9);
    }

    #[test]
    fn test_overrides_win_last() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("no-global"));

        let overrides = ConfigOverrides {
            concurrency: Some(1),
            log_level: None,
        };
        let config = loader.load(temp.path(), Some(&overrides)).unwrap();
        assert_eq!(config.import.concurrency, 1);
    }

    #[test]
    fn test_save_and_reload_global() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join(".curator");
        let loader = ConfigLoader::with_global_dir(&global_dir);

        let mut config = CuratorConfig::default();
        config.databases.push(DatabaseConfig {
            name: "project".to_string(),
            target: PathBuf::from("/t"),
            library: PathBuf::from("/l"),
            temp: PathBuf::from("/tmp"),
            ..Default::default()
        });
        loader.save_global(&config).unwrap();

        let mut reload = ConfigLoader::with_global_dir(&global_dir);
        let loaded = reload.load_global().unwrap().unwrap();
        assert_eq!(loaded.databases.len(), 1);
        assert_eq!(loaded.databases[0].name, "project");
    }

    #[test]
    fn test_invalid_local_config_errors() {
        let temp = TempDir::new().unwrap();
        write_local(temp.path(), "not = valid = toml");

        let loader = ConfigLoader::with_global_dir(temp.path().join("no-global"));
        assert!(loader.load_local(temp.path()).is_err());
    }

    #[test]
    fn test_global_is_cached_after_first_read() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join(".curator");
        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::write(global_dir.join(FILE_NAME), "[import]\nconcurrency = 3\n").unwrap();

        let mut loader = ConfigLoader::with_global_dir(&global_dir);
        assert_eq!(loader.load_global().unwrap().unwrap().import.concurrency, 3);

        // Rewrite on disk; the cached copy keeps serving.
        std::fs::write(global_dir.join(FILE_NAME), "[import]\nconcurrency = 7\n").unwrap();
        assert_eq!(loader.load_global().unwrap().unwrap().import.concurrency, 3);
    }
}
