//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `config` - Print the effective engine configuration
//! - `detect` - Recurring obligation suggestions
//! - `import` - CSV import with dedup against an existing ledger
//! - `project` - Balance projection and occurrence slots (materialize, dismiss)
//!
//! Every command reads and writes plain JSON files; shared loaders live here.

pub mod config;
pub mod detect;
pub mod import;
pub mod project;

// Re-export command functions for main.rs
pub use config::*;
pub use detect::*;
pub use import::*;
pub use project::*;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reckon_core::{DismissalSet, ImportOutcome, RecurringObligation, TransactionRecord};
use serde::{Deserialize, Serialize};

/// A records file is either a raw import outcome or a plain array
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordsFile {
    Outcome(ImportOutcome),
    Records(Vec<TransactionRecord>),
}

pub fn load_records(path: &Path) -> Result<Vec<TransactionRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read records: {}", path.display()))?;
    let parsed: RecordsFile = serde_json::from_str(&content)
        .with_context(|| format!("Invalid records file: {}", path.display()))?;
    Ok(match parsed {
        RecordsFile::Outcome(outcome) => outcome.records,
        RecordsFile::Records(records) => records,
    })
}

/// Obligations file; no path means no obligations
pub fn load_obligations(path: Option<&Path>) -> Result<Vec<RecurringObligation>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read obligations: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid obligations file: {}", path.display()))
}

/// Dismissal file; a missing file is an empty set
pub fn load_dismissed(path: Option<&Path>) -> Result<DismissalSet> {
    match path {
        Some(path) if path.exists() => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read dismissals: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid dismissals file: {}", path.display()))
        }
        _ => Ok(DismissalSet::new()),
    }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Parse a --today value, defaulting to the local date
pub fn parse_today(today: Option<&str>) -> Result<NaiveDate> {
    match today {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("Invalid date (expected YYYY-MM-DD): {}", s)),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
