//! Domain models for Reckon

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Category assigned when a row carries none
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// A signed amount in currency minor units (cents)
///
/// Negative = value leaving the account, positive = value entering it.
/// Every value is a whole number of cents, so running sums are exact at
/// cent precision after every addition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Round a decimal amount to the nearest cent (half away from zero)
    pub fn from_major(value: f64) -> Self {
        Self((value * 100.0).round() as i64)
    }

    pub fn to_major(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Parse a plain decimal string ("-1234.565", "12.", ".5") without
    /// going through floating point. Digits past the cent are rounded half
    /// away from zero.
    pub fn parse_decimal(s: &str) -> Option<Self> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && frac.is_empty() {
            return None;
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }

        let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let mut frac_digits = frac.bytes().map(|b| i64::from(b - b'0'));
        let tenths = frac_digits.next().unwrap_or(0);
        let hundredths = frac_digits.next().unwrap_or(0);
        let round_up = frac_digits.next().is_some_and(|d| d >= 5);

        let mut cents = whole.checked_mul(100)?.checked_add(tenths * 10 + hundredths)?;
        if round_up {
            cents += 1;
        }
        Some(Self(if negative { -cents } else { cents }))
    }

    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl std::str::FromStr for Money {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let cleaned: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '$' | ',' | ' '))
            .collect();
        Self::parse_decimal(&cleaned).ok_or_else(|| format!("Invalid amount: {}", s))
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

/// Whether an account holds value (checking, savings) or owes it (credit card, loan)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Asset,
    Liability,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Liability => "liability",
        }
    }
}

impl std::str::FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asset" | "checking" | "savings" => Ok(Self::Asset),
            "liability" | "credit" | "loan" => Ok(Self::Liability),
            _ => Err(format!("Unknown account kind: {}", s)),
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Sortable identifier: `YYYYMMDD-SSSS-digest` for imported rows,
    /// `YYYYMMDD-M-digest` for manual entries
    pub id: String,
    pub account_id: String,
    pub date: NaiveDate,
    pub description: String,
    pub category: String,
    /// Negative = value leaving the account
    pub amount: Money,
    pub pending: bool,
    pub reconciled: bool,
    /// Entered by hand or materialized from a projection
    pub manual: bool,
    /// Included in balance sums
    pub visible: bool,
    /// Import format identifier (e.g., chase_csv, amex_csv); None for manual entries
    pub import_format: Option<String>,
    /// Hash for deduplication across overlapping imports
    pub import_hash: Option<String>,
    /// Original import row as JSON (for reprocessing)
    pub original_data: Option<String>,
}

impl TransactionRecord {
    /// Identifier for an imported record; `sequence` is the per-day tiebreak
    pub fn imported_id(date: NaiveDate, sequence: u32, digest: &str) -> String {
        format!(
            "{}-{:04}-{}",
            date.format("%Y%m%d"),
            sequence,
            short_digest(digest)
        )
    }

    /// Identifier for a manual record. Sorts after imported records of the same day.
    pub fn manual_id(date: NaiveDate, digest: &str) -> String {
        format!("{}-M-{}", date.format("%Y%m%d"), short_digest(digest))
    }

    /// Amount that counts toward balances (zero when hidden)
    pub fn balance_amount(&self) -> Money {
        if self.visible {
            self.amount
        } else {
            Money::ZERO
        }
    }

    /// Mark as reconciled against a statement. Pending rows cannot be reconciled.
    pub fn reconcile(&mut self) -> Result<()> {
        if self.pending {
            return Err(Error::InvalidData(format!(
                "Cannot reconcile pending transaction {}",
                self.id
            )));
        }
        self.reconciled = true;
        Ok(())
    }

    pub fn mark_posted(&mut self) {
        self.pending = false;
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
}

/// First 12 characters of a digest
fn short_digest(digest: &str) -> &str {
    match digest.char_indices().nth(12) {
        Some((end, _)) => &digest[..end],
        None => digest,
    }
}

/// Income and expense patterns are tracked separately
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignClass {
    Income,
    Expense,
}

impl SignClass {
    pub fn of(amount: Money) -> Option<Self> {
        if amount.is_positive() {
            Some(Self::Income)
        } else if amount.is_negative() {
            Some(Self::Expense)
        } else {
            None
        }
    }
}

/// Recurrence frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weekly" => Ok(Self::Weekly),
            "biweekly" | "fortnightly" => Ok(Self::Biweekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "yearly" | "annual" | "annually" => Ok(Self::Yearly),
            _ => Err(format!("Unknown frequency: {}", s)),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which occurrence of a weekday within a month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekOrdinal {
    First,
    Second,
    Third,
    Fourth,
    /// Whichever occurrence is last in the month (4th or 5th)
    Last,
}

/// Optional day anchor for monthly and quarterly cadences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CadenceAnchor {
    /// Snap to this day (clamped to the month length)
    DayOfMonth(u32),
    /// e.g. the last Friday of the month
    Weekday {
        ordinal: WeekOrdinal,
        weekday: Weekday,
    },
}

/// When a recurring obligation's occurrences fall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cadence {
    pub frequency: Frequency,
    #[serde(default)]
    pub anchor: Option<CadenceAnchor>,
}

impl Cadence {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            anchor: None,
        }
    }

    pub fn monthly_on_day(day: u32) -> Self {
        Self {
            frequency: Frequency::Monthly,
            anchor: Some(CadenceAnchor::DayOfMonth(day)),
        }
    }

    pub fn monthly_on_weekday(ordinal: WeekOrdinal, weekday: Weekday) -> Self {
        Self {
            frequency: Frequency::Monthly,
            anchor: Some(CadenceAnchor::Weekday { ordinal, weekday }),
        }
    }
}

/// Expected amount of a recurring obligation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpectedAmount {
    Fixed { amount: Money },
    /// Amount varies (utilities, usage billing) within +/- tolerance
    Variable { amount: Money, tolerance: Money },
}

impl ExpectedAmount {
    /// The amount used for projections
    pub fn expected(&self) -> Money {
        match self {
            Self::Fixed { amount } | Self::Variable { amount, .. } => *amount,
        }
    }

    /// Whether an observed amount is consistent with this expectation
    pub fn matches(&self, observed: Money) -> bool {
        match self {
            Self::Fixed { amount } => *amount == observed,
            Self::Variable { amount, tolerance } => (observed - *amount).abs() <= tolerance.abs(),
        }
    }
}

/// A bill, paycheck or subscription that repeats on a cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringObligation {
    pub id: String,
    pub account_id: String,
    pub description: String,
    pub category: String,
    pub amount: ExpectedAmount,
    pub cadence: Cadence,
    pub next_due: NaiveDate,
    /// Paused obligations are deactivated, not deleted
    pub active: bool,
}

impl RecurringObligation {
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn activate(&mut self) {
        self.active = true;
    }
}

/// Terminal state of a projected occurrence slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    /// Converted into a real (manual, pending) record
    Materialized,
    /// Suppressed without creating a record
    Dismissed,
}

impl SlotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Materialized => "materialized",
            Self::Dismissed => "dismissed",
        }
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
