//! Projection commands: project, materialize, dismiss

use std::path::Path;

use anyhow::{anyhow, bail, Result};
use reckon_core::{
    dismiss, generate_occurrences, materialize, project, EngineConfig, Money, ProjectionInput,
};

use super::{load_dismissed, load_obligations, load_records, parse_today, truncate, write_json};

/// Inputs shared by `project` runs
pub struct ProjectArgs<'a> {
    pub records: &'a Path,
    pub anchor: &'a str,
    pub obligations: Option<&'a Path>,
    pub dismissed: Option<&'a Path>,
    pub horizon: Option<u32>,
    pub today: Option<&'a str>,
}

pub fn cmd_project(
    config: &EngineConfig,
    args: &ProjectArgs<'_>,
    output: Option<&Path>,
) -> Result<()> {
    let anchor = args
        .anchor
        .parse::<Money>()
        .map_err(|e: String| anyhow!(e))?;
    let today = parse_today(args.today)?;
    let records = load_records(args.records)?;
    let obligations = load_obligations(args.obligations)?;
    let dismissed = load_dismissed(args.dismissed)?;

    let mut projection_config = config.projection.clone();
    if let Some(horizon) = args.horizon {
        projection_config.horizon_days = horizon;
    }

    let input = ProjectionInput::new(&records, &obligations, &dismissed, anchor, today)
        .with_config(projection_config);
    let projection = project(&input);

    if let Some(output) = output {
        write_json(output, &projection)?;
    }

    println!();
    println!("📈 Balance Projection (from {})", today);
    println!("   ─────────────────────────────────────────────────────────────");
    let upcoming = projection
        .entries
        .iter()
        .filter(|e| e.record.date >= today || e.is_projected());
    for entry in upcoming {
        let marker = if entry.is_projected() { "*" } else { " " };
        println!(
            "   {} {} {:32} │ {:>10} │ {:>11}",
            marker,
            entry.record.date,
            truncate(&entry.record.description, 32),
            entry.record.amount.to_string(),
            entry.balance.to_string()
        );
    }

    let summary = &projection.summary;
    println!();
    println!("   Starting balance:  {}", summary.starting_balance);
    println!("   Ending balance:    {}", summary.ending_balance);
    if let Some(low) = &summary.lowest_balance {
        let warn = if low.balance.is_negative() { " ⚠️" } else { "" };
        println!("   Lowest balance:    {} on {}{}", low.balance, low.date, warn);
    }
    println!(
        "   Projected:         {} occurrences (+{} / {})",
        summary.projected_count, summary.projected_inflow, summary.projected_outflow
    );
    if summary.anchor_record_id.is_none() {
        println!("   💡 No imported records: the anchor is used as the opening balance");
    }
    if let Some(output) = output {
        println!("   Wrote projection to {}", output.display());
    }

    Ok(())
}

pub fn cmd_materialize(
    config: &EngineConfig,
    occurrence_id: &str,
    obligations_path: &Path,
    dismissed_path: &Path,
    records_path: &Path,
    horizon: Option<u32>,
    today: Option<&str>,
) -> Result<()> {
    let today = parse_today(today)?;
    let obligations = load_obligations(Some(obligations_path))?;
    let mut dismissed = load_dismissed(Some(dismissed_path))?;
    let mut records = load_records(records_path)?;

    if let Some(state) = dismissed.state(occurrence_id) {
        bail!("Occurrence {} is already {}", occurrence_id, state);
    }

    let (obligation_id, _) = occurrence_id.rsplit_once('@').ok_or_else(|| {
        anyhow!(
            "Invalid occurrence id (expected obligation@YYYY-MM-DD): {}",
            occurrence_id
        )
    })?;
    let obligation = obligations
        .iter()
        .find(|o| o.id == obligation_id)
        .ok_or_else(|| anyhow!("Obligation not found: {}", obligation_id))?;

    let mut projection_config = config.projection.clone();
    if let Some(horizon) = horizon {
        projection_config.horizon_days = horizon;
    }
    let occurrence = generate_occurrences(obligation, &dismissed, today, &projection_config)
        .into_iter()
        .find(|o| o.id == occurrence_id)
        .ok_or_else(|| {
            anyhow!(
                "Occurrence {} is not projected within {} days of {}",
                occurrence_id,
                projection_config.horizon_days,
                today
            )
        })?;

    let record = materialize(&occurrence, &mut dismissed)?;
    println!(
        "✅ Materialized {} as {} ({} on {})",
        occurrence_id, record.id, record.amount, record.date
    );

    // Persist the slot before the record so a failed write never leaves an open slot behind a record
    write_json(dismissed_path, &dismissed)?;
    records.push(record);
    records.sort_by(|a, b| a.id.cmp(&b.id));
    write_json(records_path, &records)?;

    Ok(())
}

pub fn cmd_dismiss(occurrence_id: &str, dismissed_path: &Path) -> Result<()> {
    let mut dismissed = load_dismissed(Some(dismissed_path))?;
    dismiss(occurrence_id, &mut dismissed)?;
    write_json(dismissed_path, &dismissed)?;

    println!("✅ Dismissed {}", occurrence_id);
    Ok(())
}
