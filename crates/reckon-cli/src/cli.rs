//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Reckon - Reconcile bank exports and project future balances
#[derive(Parser)]
#[command(name = "reckon")]
#[command(about = "Ledger reconciliation and balance projection", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Engine config file (defaults to the data-dir override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import transactions from a bank CSV export
    Import {
        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,

        /// Account kind: asset (checking, savings) or liability (credit, loan).
        /// Only consulted for layouts shared by both kinds.
        #[arg(short, long)]
        kind: Option<String>,

        /// Account identifier stored on each record
        #[arg(short, long, default_value = "default")]
        account: String,

        /// Write records as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Previously imported records (JSON); rows already present are skipped
        /// and the output holds the combined ledger
        #[arg(long)]
        existing: Option<PathBuf>,
    },

    /// Suggest recurring obligations found in imported records
    Detect {
        /// Records file (JSON)
        #[arg(short, long)]
        records: PathBuf,

        /// Obligations already tracked (JSON); matching patterns are not suggested
        #[arg(long)]
        obligations: Option<PathBuf>,

        /// Print suggestions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Project running balances forward from a known balance
    Project {
        /// Records file (JSON)
        #[arg(short, long)]
        records: PathBuf,

        /// Balance as of the latest imported record (e.g. 1234.56)
        #[arg(long, allow_hyphen_values = true)]
        anchor: String,

        /// Recurring obligations (JSON)
        #[arg(long)]
        obligations: Option<PathBuf>,

        /// Resolved occurrence slots (JSON)
        #[arg(long)]
        dismissed: Option<PathBuf>,

        /// Days past today to project (defaults to config)
        #[arg(long)]
        horizon: Option<u32>,

        /// Date to project from, YYYY-MM-DD (defaults to the local date)
        #[arg(long)]
        today: Option<String>,

        /// Write the projection as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Turn a projected occurrence into a pending manual record
    Materialize {
        /// Occurrence id (obligation@YYYY-MM-DD)
        #[arg(long)]
        occurrence: String,

        /// Recurring obligations (JSON)
        #[arg(long)]
        obligations: PathBuf,

        /// Resolved occurrence slots (JSON, created if missing)
        #[arg(long)]
        dismissed: PathBuf,

        /// Records file (JSON); the new record is appended
        #[arg(short, long)]
        records: PathBuf,

        /// Days past today to search (defaults to config)
        #[arg(long)]
        horizon: Option<u32>,

        /// Date to project from, YYYY-MM-DD (defaults to the local date)
        #[arg(long)]
        today: Option<String>,
    },

    /// Suppress a projected occurrence
    Dismiss {
        /// Occurrence id (obligation@YYYY-MM-DD)
        #[arg(long)]
        occurrence: String,

        /// Resolved occurrence slots (JSON, created if missing)
        #[arg(long)]
        dismissed: PathBuf,
    },

    /// Print the effective engine configuration as TOML
    Config,
}
