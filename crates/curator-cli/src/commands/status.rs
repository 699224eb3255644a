//! Status command - tracked asset counts and cache health

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use curator_core::DatabaseRegistry;

use super::{build_options, create_database, display_path};
use crate::GlobalOptions;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Source tree of the database
    target: PathBuf,
}

/// Execute the status command
pub async fn execute(args: StatusArgs, global: GlobalOptions) -> Result<()> {
    let options = build_options(&args.target, &global)?;
    let library = options.library.clone();
    let name = options.name.clone();

    println!("Database:  {}", name);
    println!("Target:    {}", display_path(&options.target));
    println!("Library:   {}", display_path(&library));

    for (label, file) in [
        ("path cache", library.join(format!(".{}", name))),
        ("mtime cache", library.join(format!(".{}-info.json", name))),
        ("dependency cache", library.join(format!(".{}-dependency.json", name))),
        ("data cache", library.join(format!(".{}-data.json", name))),
    ] {
        let state = if file.exists() { "present" } else { "missing" };
        println!("  {:<17} {}", format!("{}:", label), state);
    }

    let db = create_database(options)?;
    let registry = DatabaseRegistry::new();
    match db.start_with_cache(&registry).await {
        Ok(restored) => {
            let stats = db.stats().await;
            println!("Assets:    {} tracked ({} restored from cache)", stats.assets, restored);
            println!("Imported:  {}", stats.imported);
            if stats.invalid > 0 {
                println!("Invalid:   {}", stats.invalid);
            }
            db.stop(&registry).await;
        }
        Err(e) => {
            println!("Assets:    unknown ({})", e);
            println!("Run 'curator import {}' to build the cache", display_path(&args.target));
        }
    }

    Ok(())
}
