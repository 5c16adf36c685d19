//! Balance projection
//!
//! Merges an account's actual records with occurrences generated from its
//! recurring obligations, orders them, and assigns running balances anchored
//! to the latest imported record.
//!
//! ## Occurrence slots
//!
//! Each generated occurrence has a stable id (`<obligation id>@<date>`).
//! A slot starts out projected and can be resolved exactly once, either
//! materialized into a real record or dismissed. Resolved slots are never
//! generated again.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{Money, RecurringObligation, SlotState, TransactionRecord};
use crate::schedule;

/// Appended to the description of every projected entry
pub const PROJECTION_MARKER: &str = " (projected)";

/// Projection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// How far past today to generate occurrences
    pub horizon_days: u32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            horizon_days: 60,
        }
    }
}

/// Resolved occurrence slots, keyed by occurrence id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DismissalSet {
    slots: BTreeMap<String, SlotState>,
}

impl DismissalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, occurrence_id: &str) -> Option<SlotState> {
        self.slots.get(occurrence_id).copied()
    }

    pub fn is_resolved(&self, occurrence_id: &str) -> bool {
        self.slots.contains_key(occurrence_id)
    }

    /// Move a slot to a terminal state. Fails if it already left the projected state.
    pub fn resolve(&mut self, occurrence_id: &str, state: SlotState) -> Result<()> {
        if let Some(existing) = self.state(occurrence_id) {
            return Err(Error::SlotResolved {
                occurrence_id: occurrence_id.to_string(),
                state: existing,
            });
        }
        self.slots.insert(occurrence_id.to_string(), state);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SlotState)> {
        self.slots.iter().map(|(id, state)| (id.as_str(), *state))
    }
}

/// One generated instance of an obligation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedOccurrence {
    /// `<obligation id>@<YYYY-MM-DD>`
    pub id: String,
    pub obligation_id: String,
    pub account_id: String,
    pub date: NaiveDate,
    /// Carries the projection marker
    pub description: String,
    pub category: String,
    pub amount: Money,
}

impl ProjectedOccurrence {
    pub fn occurrence_id(obligation_id: &str, date: NaiveDate) -> String {
        format!("{}@{}", obligation_id, date.format("%Y-%m-%d"))
    }

    fn from_obligation(obligation: &RecurringObligation, date: NaiveDate) -> Self {
        Self {
            id: Self::occurrence_id(&obligation.id, date),
            obligation_id: obligation.id.clone(),
            account_id: obligation.account_id.clone(),
            date,
            description: format!("{}{}", obligation.description, PROJECTION_MARKER),
            category: obligation.category.clone(),
            amount: obligation.amount.expected(),
        }
    }

    /// The ledger row shown for this occurrence until it is resolved
    fn to_record(&self) -> TransactionRecord {
        TransactionRecord {
            id: self.id.clone(),
            account_id: self.account_id.clone(),
            date: self.date,
            description: self.description.clone(),
            category: self.category.clone(),
            amount: self.amount,
            pending: true,
            reconciled: false,
            manual: false,
            visible: true,
            import_format: None,
            import_hash: None,
            original_data: None,
        }
    }
}

/// Description without the projection marker
pub fn strip_projection_marker(description: &str) -> &str {
    description
        .strip_suffix(PROJECTION_MARKER)
        .unwrap_or(description)
}

/// Occurrences of one obligation from `next_due` through `today + horizon_days`
///
/// Inactive obligations produce nothing; resolved slots are skipped. Overdue
/// slots from a stale `next_due` are all kept, however many there are.
pub fn generate_occurrences(
    obligation: &RecurringObligation,
    dismissed: &DismissalSet,
    today: NaiveDate,
    config: &ProjectionConfig,
) -> Vec<ProjectedOccurrence> {
    if !obligation.active {
        return Vec::new();
    }
    let Some(end) = today.checked_add_signed(Duration::days(i64::from(config.horizon_days)))
    else {
        return Vec::new();
    };

    schedule::occurrence_dates(obligation.next_due, obligation.cadence)
        .take_while(|date| *date <= end)
        .map(|date| ProjectedOccurrence::from_obligation(obligation, date))
        .filter(|occurrence| !dismissed.is_resolved(&occurrence.id))
        .collect()
}

/// Everything `project` needs for one account
#[derive(Debug, Clone)]
pub struct ProjectionInput<'a> {
    pub records: &'a [TransactionRecord],
    pub obligations: &'a [RecurringObligation],
    pub dismissed: &'a DismissalSet,
    /// Balance as of the latest imported record
    pub anchor: Money,
    pub today: NaiveDate,
    pub config: ProjectionConfig,
}

impl<'a> ProjectionInput<'a> {
    pub fn new(
        records: &'a [TransactionRecord],
        obligations: &'a [RecurringObligation],
        dismissed: &'a DismissalSet,
        anchor: Money,
        today: NaiveDate,
    ) -> Self {
        Self {
            records,
            obligations,
            dismissed,
            anchor,
            today,
            config: ProjectionConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ProjectionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_horizon(mut self, horizon_days: u32) -> Self {
        self.config.horizon_days = horizon_days;
        self
    }
}

/// One row of the projected ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub record: TransactionRecord,
    /// Set for projected entries
    pub occurrence: Option<ProjectedOccurrence>,
    /// Running balance after this entry
    pub balance: Money,
}

impl LedgerEntry {
    pub fn is_projected(&self) -> bool {
        self.occurrence.is_some()
    }
}

/// A balance at a point in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancePoint {
    pub date: NaiveDate,
    pub balance: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSummary {
    /// Balance before the first entry
    pub starting_balance: Money,
    /// Imported record the anchor balance was pinned to
    pub anchor_record_id: Option<String>,
    pub ending_balance: Money,
    pub lowest_balance: Option<BalancePoint>,
    pub projected_inflow: Money,
    pub projected_outflow: Money,
    pub projected_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub entries: Vec<LedgerEntry>,
    pub summary: ProjectionSummary,
}

impl Projection {
    /// Find a projected occurrence by id
    pub fn occurrence(&self, occurrence_id: &str) -> Option<&ProjectedOccurrence> {
        self.entries
            .iter()
            .filter_map(|e| e.occurrence.as_ref())
            .find(|o| o.id == occurrence_id)
    }

    pub fn projected(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter().filter(|e| e.is_projected())
    }
}

/// Date, then actual before projected, then id
fn ledger_order(a: &LedgerEntry, b: &LedgerEntry) -> Ordering {
    a.record
        .date
        .cmp(&b.record.date)
        .then_with(|| a.is_projected().cmp(&b.is_projected()))
        .then_with(|| a.record.id.cmp(&b.record.id))
}

/// Merge actual and projected entries and assign running balances
///
/// The anchor balance is pinned to the last imported record: walking
/// backward from it recovers the starting balance, walking forward from
/// there assigns every entry its balance. With no imported record the
/// anchor seeds the walk directly.
pub fn project(input: &ProjectionInput<'_>) -> Projection {
    let mut entries: Vec<LedgerEntry> = input
        .records
        .iter()
        .map(|record| LedgerEntry {
            record: record.clone(),
            occurrence: None,
            balance: Money::ZERO,
        })
        .collect();

    for obligation in input.obligations {
        let occurrences =
            generate_occurrences(obligation, input.dismissed, input.today, &input.config);
        debug!(
            "Obligation {}: {} projected occurrences",
            obligation.id,
            occurrences.len()
        );
        entries.extend(occurrences.into_iter().map(|occurrence| LedgerEntry {
            record: occurrence.to_record(),
            occurrence: Some(occurrence),
            balance: Money::ZERO,
        }));
    }

    entries.sort_by(ledger_order);

    let anchor_idx = entries
        .iter()
        .rposition(|e| !e.is_projected() && !e.record.manual);

    let starting_balance = match anchor_idx {
        Some(idx) => {
            let before: Money = entries[..=idx]
                .iter()
                .map(|e| e.record.balance_amount())
                .sum();
            input.anchor - before
        }
        None => input.anchor,
    };

    let mut running = starting_balance;
    let mut lowest: Option<BalancePoint> = None;
    for entry in &mut entries {
        running += entry.record.balance_amount();
        entry.balance = running;
        if lowest.as_ref().map_or(true, |low| running < low.balance) {
            lowest = Some(BalancePoint {
                date: entry.record.date,
                balance: running,
            });
        }
    }

    let mut projected_inflow = Money::ZERO;
    let mut projected_outflow = Money::ZERO;
    let mut projected_count = 0;
    for entry in entries.iter().filter(|e| e.is_projected()) {
        projected_count += 1;
        if entry.record.amount.is_negative() {
            projected_outflow += entry.record.amount;
        } else {
            projected_inflow += entry.record.amount;
        }
    }

    let summary = ProjectionSummary {
        starting_balance,
        anchor_record_id: anchor_idx.map(|idx| entries[idx].record.id.clone()),
        ending_balance: running,
        lowest_balance: lowest,
        projected_inflow,
        projected_outflow,
        projected_count,
    };

    info!(
        "Projected {} entries ({} generated), ending balance {}",
        entries.len(),
        summary.projected_count,
        summary.ending_balance
    );

    Projection { entries, summary }
}

/// Convert a projected occurrence into a manual, pending record
///
/// The slot is marked materialized, so the occurrence is not generated again.
pub fn materialize(
    occurrence: &ProjectedOccurrence,
    dismissed: &mut DismissalSet,
) -> Result<TransactionRecord> {
    dismissed.resolve(&occurrence.id, SlotState::Materialized)?;

    let digest = hex::encode(Sha256::digest(occurrence.id.as_bytes()));
    debug!("Materialized {}", occurrence.id);

    Ok(TransactionRecord {
        id: TransactionRecord::manual_id(occurrence.date, &digest),
        account_id: occurrence.account_id.clone(),
        date: occurrence.date,
        description: strip_projection_marker(&occurrence.description).to_string(),
        category: occurrence.category.clone(),
        amount: occurrence.amount,
        pending: true,
        reconciled: false,
        manual: true,
        visible: true,
        import_format: None,
        import_hash: None,
        original_data: None,
    })
}

/// Suppress one occurrence without creating a record
pub fn dismiss(occurrence_id: &str, dismissed: &mut DismissalSet) -> Result<()> {
    dismissed.resolve(occurrence_id, SlotState::Dismissed)?;
    debug!("Dismissed {}", occurrence_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cadence, Frequency, WeekOrdinal};
    use crate::test_utils::{date, obligation, record};
    use chrono::Weekday;

    fn balances(projection: &Projection) -> Vec<(NaiveDate, i64)> {
        projection
            .entries
            .iter()
            .map(|e| (e.record.date, e.balance.cents()))
            .collect()
    }

    fn rent() -> RecurringObligation {
        RecurringObligation {
            cadence: Cadence::monthly_on_day(1),
            ..obligation("rent", "Rent", -120000, "2024-02-01")
        }
    }

    #[test]
    fn test_anchor_walks_backward() {
        let records = vec![
            record("2024-01-01", "GROCER", -5000),
            record("2024-01-05", "GROCER", -5000),
            record("2024-01-10", "GROCER", -5000),
        ];
        let dismissed = DismissalSet::new();
        let input = ProjectionInput::new(
            &records,
            &[],
            &dismissed,
            Money::from_cents(100000),
            date("2024-01-10"),
        );

        let projection = project(&input);
        let cents: Vec<i64> = projection.entries.iter().map(|e| e.balance.cents()).collect();
        assert_eq!(cents, vec![110000, 105000, 100000]);
        assert_eq!(projection.summary.starting_balance, Money::from_cents(115000));
        assert_eq!(projection.summary.anchor_record_id, Some(records[2].id.clone()));
    }

    #[test]
    fn test_rent_occurrences_within_horizon() {
        let dismissed = DismissalSet::new();
        let occurrences = generate_occurrences(
            &rent(),
            &dismissed,
            date("2024-01-15"),
            &ProjectionConfig::default(),
        );

        let dates: Vec<NaiveDate> = occurrences.iter().map(|o| o.date).collect();
        assert_eq!(dates, vec![date("2024-02-01"), date("2024-03-01")]);
        assert_eq!(occurrences[0].id, "rent@2024-02-01");
        assert_eq!(occurrences[0].description, "Rent (projected)");
    }

    #[test]
    fn test_balances_are_consistent_with_amounts() {
        let mut hidden = record("2024-01-12", "TRANSFER", -30000);
        hidden.set_visible(false);
        let records = vec![
            record("2024-01-02", "PAYROLL", 250000),
            hidden,
            record("2024-01-14", "COFFEE", -450),
        ];
        let obligations = vec![
            rent(),
            RecurringObligation {
                cadence: Cadence::new(Frequency::Biweekly),
                ..obligation("pay", "Payroll", 250000, "2024-01-16")
            },
        ];
        let dismissed = DismissalSet::new();
        let anchor = Money::from_cents(412345);
        let input = ProjectionInput::new(
            &records,
            &obligations,
            &dismissed,
            anchor,
            date("2024-01-15"),
        );

        let projection = project(&input);

        // The anchor record carries the anchor balance exactly
        let anchor_entry = projection
            .entries
            .iter()
            .find(|e| e.record.description == "COFFEE")
            .unwrap();
        assert_eq!(anchor_entry.balance, anchor);

        // Every step moves by the later entry's visible amount
        for pair in projection.entries.windows(2) {
            assert_eq!(
                pair[1].balance - pair[0].balance,
                pair[1].record.balance_amount()
            );
        }

        // Sorted by date, actual first, then id
        for pair in projection.entries.windows(2) {
            assert_ne!(ledger_order(&pair[0], &pair[1]), Ordering::Greater);
        }
    }

    #[test]
    fn test_materialize_keeps_trajectory() {
        let records = vec![record("2024-01-10", "OPENING", 500000)];
        let obligations = vec![rent()];
        let mut dismissed = DismissalSet::new();
        let today = date("2024-01-15");
        let anchor = Money::from_cents(500000);

        let before = project(&ProjectionInput::new(
            &records,
            &obligations,
            &dismissed,
            anchor,
            today,
        ));
        let occurrence = before.occurrence("rent@2024-02-01").unwrap().clone();

        let materialized = materialize(&occurrence, &mut dismissed).unwrap();
        assert_eq!(materialized.description, "Rent");
        assert_eq!(materialized.amount, Money::from_cents(-120000));
        assert!(materialized.manual);
        assert!(materialized.pending);
        assert!(materialized.id.starts_with("20240201-M-"));
        assert_eq!(dismissed.state(&occurrence.id), Some(SlotState::Materialized));

        let mut with_manual = records.clone();
        with_manual.push(materialized);
        let after = project(&ProjectionInput::new(
            &with_manual,
            &obligations,
            &dismissed,
            anchor,
            today,
        ));

        assert_eq!(balances(&before), balances(&after));
        let feb = after
            .entries
            .iter()
            .find(|e| e.record.date == date("2024-02-01"))
            .unwrap();
        assert!(!feb.is_projected());
        assert_eq!(after.summary.projected_count, before.summary.projected_count - 1);
        // Manual records never become the anchor
        assert_eq!(after.summary.anchor_record_id, before.summary.anchor_record_id);
    }

    #[test]
    fn test_dismiss_removes_only_that_slot() {
        // Two obligations with identical text, amount and schedule
        let obligations = vec![
            obligation("gym-a", "Gym", -4000, "2024-02-05"),
            obligation("gym-b", "Gym", -4000, "2024-02-05"),
        ];
        let mut dismissed = DismissalSet::new();
        dismiss("gym-a@2024-02-05", &mut dismissed).unwrap();

        let projection = project(&ProjectionInput::new(
            &[],
            &obligations,
            &dismissed,
            Money::ZERO,
            date("2024-01-15"),
        ));
        let ids: Vec<&str> = projection
            .projected()
            .map(|e| e.record.id.as_str())
            .collect();
        assert_eq!(
            ids,
            vec!["gym-b@2024-02-05", "gym-a@2024-03-05", "gym-b@2024-03-05"]
        );
    }

    #[test]
    fn test_slot_resolves_once() {
        let dismissed_occurrence = generate_occurrences(
            &rent(),
            &DismissalSet::new(),
            date("2024-01-15"),
            &ProjectionConfig::default(),
        )
        .remove(0);

        let mut dismissed = DismissalSet::new();
        dismiss(&dismissed_occurrence.id, &mut dismissed).unwrap();

        let err = materialize(&dismissed_occurrence, &mut dismissed).unwrap_err();
        assert!(matches!(
            err,
            Error::SlotResolved {
                state: SlotState::Dismissed,
                ..
            }
        ));
        assert!(dismiss(&dismissed_occurrence.id, &mut dismissed).is_err());
        assert_eq!(dismissed.len(), 1);
    }

    #[test]
    fn test_no_imported_record_seeds_with_anchor() {
        let obligations = vec![rent()];
        let projection = project(&ProjectionInput::new(
            &[],
            &obligations,
            &DismissalSet::new(),
            Money::from_cents(300000),
            date("2024-01-15"),
        ));

        assert_eq!(projection.summary.anchor_record_id, None);
        assert_eq!(projection.summary.starting_balance, Money::from_cents(300000));
        let cents: Vec<i64> = projection.entries.iter().map(|e| e.balance.cents()).collect();
        assert_eq!(cents, vec![180000, 60000]);
        assert_eq!(
            projection.summary.lowest_balance,
            Some(BalancePoint {
                date: date("2024-03-01"),
                balance: Money::from_cents(60000),
            })
        );
        assert_eq!(projection.summary.projected_outflow, Money::from_cents(-240000));
        assert_eq!(projection.summary.projected_inflow, Money::ZERO);
    }

    #[test]
    fn test_overdue_occurrence_before_anchor_keeps_anchor_exact() {
        // An unpaid bill dated before the latest import
        let records = vec![record("2024-01-20", "COFFEE", -500)];
        let obligations = vec![obligation("phone", "Phone", -6000, "2024-01-12")];
        let dismissed = DismissalSet::new();
        let anchor = Money::from_cents(100000);

        let projection = project(&ProjectionInput::new(
            &records,
            &obligations,
            &dismissed,
            anchor,
            date("2024-01-20"),
        ));

        assert!(projection.entries[0].is_projected());
        assert_eq!(projection.entries[1].balance, anchor);
        assert_eq!(projection.summary.starting_balance, Money::from_cents(106500));
    }

    #[test]
    fn test_last_weekday_obligation() {
        let obligation = RecurringObligation {
            cadence: Cadence::monthly_on_weekday(WeekOrdinal::Last, Weekday::Fri),
            ..obligation("payday", "Payday", 300000, "2024-01-26")
        };
        let occurrences = generate_occurrences(
            &obligation,
            &DismissalSet::new(),
            date("2024-01-01"),
            &ProjectionConfig {
                horizon_days: 90,
                ..ProjectionConfig::default()
            },
        );
        let dates: Vec<NaiveDate> = occurrences.iter().map(|o| o.date).collect();
        assert_eq!(
            dates,
            vec![date("2024-01-26"), date("2024-02-23"), date("2024-03-29")]
        );
    }

    #[test]
    fn test_inactive_generation() {
        let mut paused = rent();
        paused.deactivate();
        let config = ProjectionConfig::default();
        assert!(generate_occurrences(&paused, &DismissalSet::new(), date("2024-01-15"), &config)
            .is_empty());
    }

    #[test]
    fn test_stale_next_due_still_reaches_horizon() {
        let weekly = RecurringObligation {
            cadence: Cadence::new(Frequency::Weekly),
            ..obligation("lunch", "Lunch", -1200, "2000-01-03")
        };
        let occurrences = generate_occurrences(
            &weekly,
            &DismissalSet::new(),
            date("2024-01-15"),
            &ProjectionConfig::default(),
        );

        // Every Monday from 2000-01-03 through 2024-03-11 (today + 60 days)
        assert_eq!(occurrences.first().unwrap().date, date("2000-01-03"));
        assert_eq!(occurrences.last().unwrap().date, date("2024-03-11"));
        let in_horizon = occurrences
            .iter()
            .filter(|o| o.date >= date("2024-01-15"))
            .count();
        assert_eq!(in_horizon, 9);
        assert!(occurrences.windows(2).all(|w| w[1].date - w[0].date == Duration::days(7)));
    }

    #[test]
    fn test_strip_projection_marker() {
        assert_eq!(strip_projection_marker("Rent (projected)"), "Rent");
        assert_eq!(strip_projection_marker("Rent"), "Rent");
    }

    #[test]
    fn test_dismissal_set_serializes_as_map() {
        let mut dismissed = DismissalSet::new();
        dismiss("rent@2024-02-01", &mut dismissed).unwrap();
        let json = serde_json::to_string(&dismissed).unwrap();
        assert_eq!(json, r#"{"rent@2024-02-01":"dismissed"}"#);
        let back: DismissalSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dismissed);
    }
}
