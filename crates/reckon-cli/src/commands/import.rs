//! Import command implementation

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use reckon_core::{merge_new, read_csv, AccountKind, EngineConfig, Importer};

use super::{load_records, write_json};

/// Row errors shown before the rest are summarized
const MAX_ERRORS_SHOWN: usize = 10;

pub fn cmd_import(
    config: &EngineConfig,
    file: &Path,
    kind: Option<&str>,
    account: &str,
    output: Option<&Path>,
    existing: Option<&Path>,
) -> Result<()> {
    let hint: Option<AccountKind> = kind
        .map(|k| k.parse::<AccountKind>().map_err(|e| anyhow::anyhow!(e)))
        .transpose()?;

    let csv_file =
        File::open(file).with_context(|| format!("Failed to open file: {}", file.display()))?;
    let (headers, rows) =
        read_csv(csv_file).with_context(|| format!("Failed to read CSV: {}", file.display()))?;

    println!("📥 Importing {}...", file.display());

    let importer = Importer::new(&config.import)?;
    let outcome = importer
        .import(&headers, &rows, hint, account)
        .with_context(|| format!("Failed to import {}", file.display()))?;

    println!(
        "   Format: {} ({} records)",
        outcome.format,
        outcome.records.len()
    );
    if outcome.sign_inverted {
        println!("   Amounts inverted: charges were exported as positive numbers");
    }
    if let Some(ambiguity) = &outcome.ambiguity {
        println!(
            "   ⚠️  Sign convention is ambiguous ({:.1}% payment rows, threshold {:.1}%).",
            ambiguity.ratio * 100.0,
            ambiguity.threshold * 100.0
        );
        println!("      Pass --kind asset or --kind liability to be sure.");
    }
    if !outcome.errors.is_empty() {
        println!("   ⚠️  {} rows could not be parsed:", outcome.errors.len());
        for error in outcome.errors.iter().take(MAX_ERRORS_SHOWN) {
            println!("      {}", error);
        }
        if outcome.errors.len() > MAX_ERRORS_SHOWN {
            println!(
                "      ... and {} more",
                outcome.errors.len() - MAX_ERRORS_SHOWN
            );
        }
    }

    let Some(output) = output else {
        println!("💡 Dry run: pass --output to save the records");
        return Ok(());
    };

    match existing {
        Some(existing_path) => {
            let mut ledger = load_records(existing_path)?;
            let merged = merge_new(&ledger, outcome.records);
            println!("✅ Import complete!");
            println!("   Imported: {}", merged.added.len());
            println!("   Skipped (duplicates): {}", merged.skipped);

            ledger.extend(merged.added);
            ledger.sort_by(|a, b| a.id.cmp(&b.id));
            write_json(output, &ledger)?;
            println!("   Wrote {} records to {}", ledger.len(), output.display());
        }
        None => {
            println!("✅ Import complete!");
            write_json(output, &outcome)?;
            println!(
                "   Wrote {} records to {}",
                outcome.records.len(),
                output.display()
            );
        }
    }

    Ok(())
}
