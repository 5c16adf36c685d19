//! Test utilities for reckon-core
//!
//! Terse builders for records and obligations so tests can describe a
//! ledger in a few lines.

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use crate::models::{
    Cadence, ExpectedAmount, Frequency, Money, RecurringObligation, TransactionRecord,
    DEFAULT_CATEGORY,
};

/// Parse a `YYYY-MM-DD` literal
pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// A posted, visible, imported record
///
/// The id is derived from the date, description and amount, so it is
/// stable across calls and unique within a test ledger.
pub fn record(date_str: &str, description: &str, cents: i64) -> TransactionRecord {
    let date = date(date_str);
    let digest = hex::encode(Sha256::digest(
        format!("{}|{}|{}", date_str, description, cents).as_bytes(),
    ));

    TransactionRecord {
        id: TransactionRecord::imported_id(date, 1, &digest),
        account_id: "checking".to_string(),
        date,
        description: description.to_string(),
        category: DEFAULT_CATEGORY.to_string(),
        amount: Money::from_cents(cents),
        pending: false,
        reconciled: false,
        manual: false,
        visible: true,
        import_format: Some("test_csv".to_string()),
        import_hash: Some(digest),
        original_data: None,
    }
}

/// An active monthly obligation with a fixed amount
pub fn obligation(id: &str, description: &str, cents: i64, next_due: &str) -> RecurringObligation {
    RecurringObligation {
        id: id.to_string(),
        account_id: "checking".to_string(),
        description: description.to_string(),
        category: DEFAULT_CATEGORY.to_string(),
        amount: ExpectedAmount::Fixed {
            amount: Money::from_cents(cents),
        },
        cadence: Cadence::new(Frequency::Monthly),
        next_due: date(next_due),
        active: true,
    }
}
