//! Integration tests for reckon-core
//!
//! These tests exercise the full import → detect → project workflow.

use chrono::NaiveDate;
use reckon_core::{
    import::{import_rows, merge_new, read_csv, ImportConfig},
    materialize, project, AccountKind, DismissalSet, EngineConfig, Frequency, Money,
    ProjectionInput, RecurringDetector, SignClass,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Checking account export, newest first, with a monthly rent payment,
/// a biweekly paycheck and some noise
fn checking_csv() -> &'static str {
    r#"Date,Description,Amount,Running Bal.
04/12/2024,ACME CORP PAYROLL,2500.00,6190.50
04/05/2024,CORNER COFFEE #221,-4.50,3690.50
04/01/2024,OAKWOOD APTS RENT 0401,-1450.00,3695.00
03/29/2024,ACME CORP PAYROLL,2500.00,5145.00
03/15/2024,ACME CORP PAYROLL,2500.00,2645.00
03/11/2024,HARDWARE STORE,-62.13,145.00
03/01/2024,OAKWOOD APTS RENT 0301,-1450.00,207.13
03/01/2024,ACME CORP PAYROLL,2500.00,1657.13
02/16/2024,ACME CORP PAYROLL,2500.00,-842.87
02/01/2024,OAKWOOD APTS RENT 0201,-1450.00,-3342.87
01/02/2024,OAKWOOD APTS RENT 0102,-1450.00,-1892.87"#
}

fn import_checking() -> Vec<reckon_core::TransactionRecord> {
    let (headers, rows) = read_csv(checking_csv().as_bytes()).expect("Failed to read CSV");
    let outcome = import_rows(
        &headers,
        &rows,
        Some(AccountKind::Asset),
        "checking",
        &ImportConfig::default(),
    )
    .expect("Failed to import");

    assert_eq!(outcome.format, "bofa_csv");
    assert!(outcome.errors.is_empty());
    outcome.records
}

#[test]
fn test_import_detect_project_workflow() {
    let records = import_checking();
    assert_eq!(records.len(), 11);

    // Detect recurring patterns
    let detector = RecurringDetector::default();
    let suggestions = detector.suggest(&records, &[]);

    let payroll = suggestions
        .iter()
        .find(|s| s.sign_class == SignClass::Income)
        .expect("paycheck detected");
    assert_eq!(payroll.frequency, Frequency::Biweekly);
    assert_eq!(payroll.amount, Money::from_cents(250000));
    assert_eq!(payroll.next_date, date(2024, 4, 26));

    let rent = suggestions
        .iter()
        .find(|s| s.sign_class == SignClass::Expense)
        .expect("rent detected");
    assert_eq!(rent.frequency, Frequency::Monthly);
    assert_eq!(rent.amount, Money::from_cents(-145000));
    assert_eq!(rent.occurrences, 4);

    // Coffee and hardware are one-offs
    assert_eq!(suggestions.len(), 2);

    // Accept both and project
    let obligations = vec![
        payroll.clone().into_obligation("payroll", "checking"),
        rent.clone().into_obligation("rent", "checking"),
    ];
    let dismissed = DismissalSet::new();
    let anchor = Money::from_cents(619050);
    let today = date(2024, 4, 14);
    let projection = project(&ProjectionInput::new(
        &records,
        &obligations,
        &dismissed,
        anchor,
        today,
    ));

    // The latest import carries the statement balance
    let latest = projection
        .entries
        .iter()
        .rev()
        .find(|e| !e.is_projected())
        .unwrap();
    assert_eq!(latest.record.description, "ACME CORP PAYROLL");
    assert_eq!(latest.balance, anchor);

    // Adjacent balances differ by exactly the later amount
    for pair in projection.entries.windows(2) {
        assert_eq!(
            pair[1].balance - pair[0].balance,
            pair[1].record.balance_amount()
        );
    }

    // today + 60 = 2024-06-13: paychecks 4/26, 5/10, 5/24, 6/7; rent 5/1, 6/1
    assert_eq!(projection.summary.projected_count, 6);
    assert_eq!(projection.summary.projected_inflow, Money::from_cents(1_000_000));
    assert_eq!(projection.summary.projected_outflow, Money::from_cents(-290_000));
    assert_eq!(
        projection.summary.ending_balance,
        anchor + Money::from_cents(1_000_000 - 290_000)
    );
}

#[test]
fn test_materialized_occurrence_becomes_actual() {
    let records = import_checking();
    let suggestion = RecurringDetector::default()
        .suggest(&records, &[])
        .into_iter()
        .find(|s| s.sign_class == SignClass::Expense)
        .unwrap();
    let obligations = vec![suggestion.into_obligation("rent", "checking")];

    let mut dismissed = DismissalSet::new();
    let anchor = Money::from_cents(619050);
    let today = date(2024, 4, 14);

    let before = project(&ProjectionInput::new(
        &records,
        &obligations,
        &dismissed,
        anchor,
        today,
    ));
    let may_rent = before.occurrence("rent@2024-05-01").unwrap().clone();
    let manual = materialize(&may_rent, &mut dismissed).unwrap();

    let mut ledger = records.clone();
    ledger.push(manual);
    let after = project(&ProjectionInput::new(
        &ledger,
        &obligations,
        &dismissed,
        anchor,
        today,
    ));

    let trajectory = |p: &reckon_core::Projection| -> Vec<(NaiveDate, Money)> {
        p.entries.iter().map(|e| (e.record.date, e.balance)).collect()
    };
    assert_eq!(trajectory(&before), trajectory(&after));
    assert!(after.occurrence("rent@2024-05-01").is_none());
    assert!(materialize(&may_rent, &mut dismissed).is_err());
}

#[test]
fn test_reimporting_overlapping_export_adds_only_new_rows() {
    let existing = import_checking();

    let newer = r#"Date,Description,Amount,Running Bal.
04/19/2024,CORNER COFFEE #221,-4.50,6186.00
04/12/2024,ACME CORP PAYROLL,2500.00,6190.50
04/05/2024,CORNER COFFEE #221,-4.50,3690.50"#;
    let (headers, rows) = read_csv(newer.as_bytes()).unwrap();
    let outcome = import_rows(&headers, &rows, None, "checking", &ImportConfig::default()).unwrap();

    let merged = merge_new(&existing, outcome.records);
    assert_eq!(merged.skipped, 2);
    assert_eq!(merged.added.len(), 1);
    assert_eq!(merged.added[0].date, date(2024, 4, 19));
}

#[test]
fn test_embedded_config_drives_components() {
    let config = EngineConfig::load(None).unwrap_or_default();
    let detector = RecurringDetector::new(config.detection.clone());
    assert_eq!(detector.config().bands.len(), 5);
    assert_eq!(config.projection.horizon_days, 60);
}
