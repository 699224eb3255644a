//! Import command - scan and import a source tree

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use curator_core::DatabaseRegistry;
use tracing::info;

use super::{build_options, create_database};
use crate::GlobalOptions;

/// Arguments for the import command
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Source tree to import
    target: PathBuf,

    /// Try restoring from the path-list cache before scanning
    #[arg(long)]
    from_cache: bool,
}

/// Execute the import command
pub async fn execute(args: ImportArgs, global: GlobalOptions) -> Result<()> {
    let options = build_options(&args.target, &global)?;
    let db = create_database(options)?;
    let registry = DatabaseRegistry::new();

    if args.from_cache {
        match db.start_with_cache(&registry).await {
            Ok(restored) => {
                println!("Restored {} assets from cache", restored);
                return Ok(());
            }
            Err(e) => {
                info!("Cache restore unavailable ({}), running full scan", e);
            }
        }
    }

    let summary = db
        .start(&registry)
        .await
        .context("database start failed")?;

    println!(
        "Imported '{}': {} added, {} changed, {} removed, {} unchanged",
        db.name(),
        summary.added,
        summary.changed,
        summary.removed,
        summary.unchanged
    );

    let stats = db.stats().await;
    if stats.invalid > 0 {
        println!("{} assets are invalid (no importer or failed import)", stats.invalid);
    }

    db.stop(&registry).await;
    Ok(())
}
