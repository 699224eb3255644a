//! Curator CLI - asset database management
//!
//! A command-line interface for importing a source tree into a library of
//! content-processed artifacts and inspecting the result.
//!
//! # Usage
//!
//! ```bash
//! # Import a source tree
//! curator import ./assets
//!
//! # Show database state
//! curator status ./assets
//!
//! # Re-run the importer for one asset
//! curator reimport db://project/textures/a.png
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;

/// Curator - incremental asset database
#[derive(Parser, Debug)]
#[command(name = "curator")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Database name used in db:// urls
    #[arg(long, short = 'n', global = true, env = "CURATOR_DB", default_value = "project")]
    name: String,

    /// Library output root (default: <target>/../library)
    #[arg(long, global = true, env = "CURATOR_LIBRARY")]
    library: Option<PathBuf>,

    /// Temp scratch root (default: <target>/../temp)
    #[arg(long, global = true, env = "CURATOR_TEMP")]
    temp: Option<PathBuf>,

    /// Concurrent import jobs
    #[arg(long, short = 'j', global = true)]
    concurrency: Option<usize>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

impl GlobalOptions {
    fn to_config_overrides(&self) -> curator_config::ConfigOverrides {
        curator_config::ConfigOverrides {
            concurrency: self.concurrency,
            log_level: None,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a source tree and import everything into the library
    Import(commands::import::ImportArgs),

    /// Show tracked asset counts and cache health
    Status(commands::status::StatusArgs),

    /// Re-run the importer for one asset address
    Reimport(commands::reimport::ReimportArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.global.quiet {
        Level::ERROR
    } else if cli.global.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Import(args) => commands::import::execute(args, cli.global).await,
        Commands::Status(args) => commands::status::execute(args, cli.global).await,
        Commands::Reimport(args) => commands::reimport::execute(args, cli.global).await,
    }
}
