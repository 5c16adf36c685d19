//! Cell-level parsing: dates, amounts, transaction types, statuses

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::models::Money;

/// Direction implied by a transaction-type column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inflow,
    Outflow,
}

/// Keywords are matched as substrings, inflow first so "Purchase Return" is a return
const INFLOW_KEYWORDS: &[&str] = &["payment", "refund", "return", "credit", "deposit"];
const OUTFLOW_KEYWORDS: &[&str] = &[
    "purchase",
    "sale",
    "installment",
    "interest",
    "fee",
    "other",
    "debit",
    "withdrawal",
];

/// Normalize a header name for comparison
pub fn normalize_header(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Parse a date string in various common formats
///
/// ISO timestamps keep the calendar date exactly as written; no timezone
/// conversion is applied, so the result never shifts by a day.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();

    let bytes = s.as_bytes();
    let candidate = if bytes.len() > 10 && bytes[4] == b'-' && matches!(bytes[10], b'T' | b' ') {
        &s[..10]
    } else {
        s
    };

    // "01/15/24": %Y would happily read "24" as the year 24
    let two_digit_year = candidate.contains('/')
        && candidate
            .rsplit('/')
            .next()
            .is_some_and(|year| year.len() == 2);

    let formats: &[&str] = if two_digit_year {
        &["%m/%d/%y", "%d/%m/%y"]
    } else {
        &[
            "%Y-%m-%d",  // 2024-01-15
            "%m/%d/%Y",  // 01/15/2024
            "%m-%d-%Y",  // 01-15-2024
            "%d/%m/%Y",  // 15/01/2024 (European)
            "%Y/%m/%d",  // 2024/01/15
            "%b %d, %Y", // Jan 15, 2024
            "%B %d, %Y", // January 15, 2024
            "%d %b %Y",  // 15 Jan 2024
            "%d-%b-%Y",  // 15-Jan-2024
        ]
    };

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(candidate, fmt) {
            return Ok(date);
        }
    }

    Err(Error::InvalidData(format!("unable to parse date '{}'", s)))
}

/// Parse an amount string, handling currency symbols, commas and
/// accounting-style parentheses
pub fn parse_amount(s: &str) -> Result<Money> {
    let trimmed = s.trim();
    let parenthesized = trimmed.starts_with('(') && trimmed.ends_with(')');

    let cleaned: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | ',' | '(' | ')' | '\u{a0}') && !c.is_whitespace())
        .collect();

    let amount = Money::parse_decimal(&cleaned)
        .ok_or_else(|| Error::InvalidData(format!("unable to parse amount '{}'", trimmed)))?;

    Ok(if parenthesized { -amount.abs() } else { amount })
}

/// Classify a transaction-type cell ("Sale", "Payment", "Interest Charge", ...)
///
/// Returns None when no keyword matches; callers keep the raw sign.
pub fn classify_kind(kind: &str) -> Option<Direction> {
    let kind = kind.to_lowercase();
    if INFLOW_KEYWORDS.iter().any(|k| kind.contains(k)) {
        Some(Direction::Inflow)
    } else if OUTFLOW_KEYWORDS.iter().any(|k| kind.contains(k)) {
        Some(Direction::Outflow)
    } else {
        None
    }
}

/// A status cell marks the row pending when it mentions "pending"
pub fn is_pending_status(status: &str) -> bool {
    status.to_lowercase().contains("pending")
}
