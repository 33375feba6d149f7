//! Stowage CLI - Command-line interface
//!
//! Provides command-line access to the local file store.

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use stowage_core::config::StowageConfig;
use stowage_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "stowage")]
#[command(about = "Local file store with a write-through stage")]
#[command(version)]
struct Cli {
    /// Root directory of the store (overrides STOWAGE_BASE_DIR)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Console log level
    #[arg(long, global = true, value_enum, default_value_t = CliLogLevel::Info)]
    log_level: CliLogLevel,

    /// Directory for the full debug log
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())
        .context("failed to initialize logging")?;

    let mut config = StowageConfig::from_env();
    if let Some(base_dir) = cli.base_dir {
        config.store.base_dir = base_dir;
    }

    if let Err(e) = commands::handle_command(cli.command, config).await {
        tracing::debug!("Command failed: {e:?}");
        eprintln!("Error: {}", e.user_message());
        std::process::exit(if e.is_user_error() { 2 } else { 1 });
    }

    Ok(())
}
