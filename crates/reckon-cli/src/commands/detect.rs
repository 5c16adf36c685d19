//! Recurring obligation detection command

use std::path::Path;

use anyhow::Result;
use reckon_core::{EngineConfig, RecurringDetector};

use super::{load_obligations, load_records, truncate};

pub fn cmd_detect(
    config: &EngineConfig,
    records_path: &Path,
    obligations_path: Option<&Path>,
    json: bool,
) -> Result<()> {
    let records = load_records(records_path)?;
    let existing = load_obligations(obligations_path)?;

    let detector = RecurringDetector::new(config.detection.clone());
    let suggestions = detector.suggest(&records, &existing);

    if json {
        println!("{}", serde_json::to_string_pretty(&suggestions)?);
        return Ok(());
    }

    if suggestions.is_empty() {
        println!("No recurring patterns found in {} records.", records.len());
        return Ok(());
    }

    println!();
    println!("🔁 Recurring Patterns");
    println!("   ─────────────────────────────────────────────────────────────");

    for s in &suggestions {
        println!(
            "   {:>3}% {:28} │ {:>10} {:<9} │ next {} ({} seen)",
            s.confidence,
            truncate(&s.description, 28),
            s.amount.to_string(),
            s.frequency.as_str(),
            s.next_date,
            s.occurrences
        );
    }

    println!();
    println!("💡 Use --json to save suggestions as a starting obligations file");

    Ok(())
}
