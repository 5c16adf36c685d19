//! Reckon CLI - Ledger reconciliation and balance projection
//!
//! Usage:
//!   reckon import --file CSV --output ledger.json      Import a bank export
//!   reckon detect --records ledger.json                Suggest recurring obligations
//!   reckon project --records ledger.json --anchor N    Project running balances
//!   reckon config                                      Show effective config

mod cli;
mod commands;


use anyhow::{Context, Result};
use clap::Parser;
use reckon_core::EngineConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // Logs go to stderr so JSON written to stdout stays parseable
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    let config = EngineConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Commands::Import {
            file,
            kind,
            account,
            output,
            existing,
        } => commands::cmd_import(
            &config,
            &file,
            kind.as_deref(),
            &account,
            output.as_deref(),
            existing.as_deref(),
        ),
        Commands::Detect {
            records,
            obligations,
            json,
        } => commands::cmd_detect(&config, &records, obligations.as_deref(), json),
        Commands::Project {
            records,
            anchor,
            obligations,
            dismissed,
            horizon,
            today,
            output,
        } => commands::cmd_project(
            &config,
            &commands::ProjectArgs {
                records: &records,
                anchor: &anchor,
                obligations: obligations.as_deref(),
                dismissed: dismissed.as_deref(),
                horizon,
                today: today.as_deref(),
            },
            output.as_deref(),
        ),
        Commands::Materialize {
            occurrence,
            obligations,
            dismissed,
            records,
            horizon,
            today,
        } => commands::cmd_materialize(
            &config,
            &occurrence,
            &obligations,
            &dismissed,
            &records,
            horizon,
            today.as_deref(),
        ),
        Commands::Dismiss {
            occurrence,
            dismissed,
        } => commands::cmd_dismiss(&occurrence, &dismissed),
        Commands::Config => commands::cmd_config(&config),
    }
}
