//! Reimport command - re-run the importer for one address

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use curator_core::DatabaseRegistry;

use super::{build_options, create_database};
use crate::GlobalOptions;

/// Arguments for the reimport command
#[derive(Args, Debug)]
pub struct ReimportArgs {
    /// Asset address: a db:// url, an identifier, or a source path
    addr: String,

    /// Source tree of the database
    #[arg(long, short = 't', default_value = "assets")]
    target: PathBuf,
}

/// Execute the reimport command
pub async fn execute(args: ReimportArgs, global: GlobalOptions) -> Result<()> {
    let options = build_options(&args.target, &global)?;
    let db = create_database(options)?;
    let registry = DatabaseRegistry::new();

    // Restore from cache when possible; fall back to a full scan.
    if db.start_with_cache(&registry).await.is_err() {
        db.start(&registry)
            .await
            .context("database start failed")?;
    }

    registry
        .reimport(&args.addr)
        .await
        .with_context(|| format!("reimport of '{}' failed", args.addr))?;

    let info = registry.query_asset(&args.addr).await?;
    println!(
        "Reimported {} ({}imported)",
        info.url,
        if info.imported { "" } else { "not " }
    );

    db.stop(&registry).await;
    Ok(())
}
