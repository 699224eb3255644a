//! CLI command implementations

pub mod import;
pub mod reimport;
pub mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use curator_config::ConfigLoader;
use curator_core::{
    AssetDatabase, AssetDatabaseOptions, BoxError, ImportContext, Importer, CATCH_ALL,
};

use crate::GlobalOptions;

/// Build database options from file-based configuration plus the CLI
/// arguments.
///
/// The library and temp roots default to siblings of the target so a bare
/// `curator import ./assets` works out of the box. A `.curator/config.toml`
/// next to the target (or the global one) supplies defaults; explicit
/// flags win.
pub fn build_options(target: &Path, global: &GlobalOptions) -> Result<AssetDatabaseOptions> {
    let target = target
        .canonicalize()
        .with_context(|| format!("target '{}' does not exist", target.display()))?;
    let base = target.parent().unwrap_or(&target).to_path_buf();

    let mut loader = ConfigLoader::new();
    let config = loader
        .load(&base, Some(&global.to_config_overrides()))
        .unwrap_or_default();
    let db_config = config.database(&global.name).ok();

    let library = global
        .library
        .clone()
        .or_else(|| db_config.map(|d| d.library.clone()))
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| base.join("library"));
    let temp = global
        .temp
        .clone()
        .or_else(|| db_config.map(|d| d.temp.clone()))
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| base.join("temp"));

    let mut options = AssetDatabaseOptions::new(&global.name, target, library, temp);
    options.concurrency = config.import.concurrency;
    options.watchdog = Duration::from_secs(config.import.watchdog_secs);
    options.data_debounce = Duration::from_millis(config.import.data_debounce_ms);
    if let Some(db_config) = db_config {
        options.include = db_config.include.clone();
        options.ignore = db_config.ignore.clone();
        options.read_only = db_config.read_only;
    }
    if let Some(concurrency) = global.concurrency {
        options.concurrency = concurrency;
    }
    Ok(options)
}

/// Create a database with the default passthrough importer registered.
pub fn create_database(options: AssetDatabaseOptions) -> Result<Arc<AssetDatabase>> {
    let db = AssetDatabase::new(options).context("failed to create database")?;
    db.importers().register(Arc::new(CopyImporter));
    Ok(db)
}

/// The minimal contract-satisfying importer: copies the source file into
/// the library tree under its identifier, keeping the extension.
pub struct CopyImporter;

#[async_trait]
impl Importer for CopyImporter {
    fn name(&self) -> &str {
        CATCH_ALL
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn version_code(&self) -> u32 {
        1
    }

    async fn import(
        &self,
        _ctx: &ImportContext,
        asset: &mut curator_core::Asset,
    ) -> std::result::Result<bool, BoxError> {
        let ext = asset
            .source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_else(|| ".bin".to_string());

        let dest = asset.artifact_path(&ext);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&asset.source, &dest)?;
        asset.record_file(&ext);
        Ok(true)
    }
}

/// Format a path for display relative to the current directory when
/// possible.
pub fn display_path(path: &PathBuf) -> String {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| path.clone())
        .display()
        .to_string()
}
