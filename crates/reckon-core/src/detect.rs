//! Recurring obligation detection
//!
//! Finds bills, paychecks and subscriptions in settled history:
//! - Groups records by normalized description, income and expense apart
//! - Classifies the mean gap between occurrences into a frequency band
//! - Scores each group on count, amount consistency and interval consistency
//!
//! Suggestions are advisory; nothing here mutates the history or the
//! obligations list.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::{
    Cadence, ExpectedAmount, Frequency, Money, RecurringObligation, SignClass, TransactionRecord,
};
use crate::schedule;

/// Mean-gap range (inclusive, in days) that maps to a frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub frequency: Frequency,
    pub min_days: i64,
    pub max_days: i64,
}

impl FrequencyBand {
    pub const fn new(frequency: Frequency, min_days: i64, max_days: i64) -> Self {
        Self {
            frequency,
            min_days,
            max_days,
        }
    }

    fn contains(&self, days: f64) -> bool {
        days >= self.min_days as f64 && days <= self.max_days as f64
    }
}

/// Detection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Smallest group worth scoring
    pub min_occurrences: usize,
    /// Minimum confidence (0-100) to suggest an income pattern
    pub income_min_confidence: u8,
    /// Minimum confidence (0-100) to suggest an expense pattern.
    /// Higher than income: false bill suggestions are more annoying.
    pub expense_min_confidence: u8,
    /// Checked in order; the first band containing the mean gap wins
    pub bands: Vec<FrequencyBand>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_occurrences: 2,
            income_min_confidence: 50,
            expense_min_confidence: 60,
            bands: vec![
                FrequencyBand::new(Frequency::Weekly, 5, 9),
                FrequencyBand::new(Frequency::Biweekly, 12, 16),
                FrequencyBand::new(Frequency::Monthly, 27, 33),
                FrequencyBand::new(Frequency::Quarterly, 85, 97),
                FrequencyBand::new(Frequency::Yearly, 355, 375),
            ],
        }
    }
}

impl DetectionConfig {
    fn min_confidence(&self, class: SignClass) -> u8 {
        match class {
            SignClass::Income => self.income_min_confidence,
            SignClass::Expense => self.expense_min_confidence,
        }
    }
}

/// A detected recurring pattern, ready for the user to accept or ignore
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObligationSuggestion {
    /// Most recent raw description in the group
    pub description: String,
    /// Grouping key
    pub normalized_description: String,
    /// Most recent category in the group
    pub category: String,
    /// Mean amount, rounded to cents
    pub amount: Money,
    /// Largest minus smallest observed amount
    pub amount_spread: Money,
    pub frequency: Frequency,
    /// 0-100
    pub confidence: u8,
    pub sign_class: SignClass,
    pub occurrences: usize,
    pub last_seen: NaiveDate,
    /// Most recent occurrence advanced by one period
    pub next_date: NaiveDate,
}

impl ObligationSuggestion {
    /// Turn an accepted suggestion into an active obligation
    pub fn into_obligation(
        self,
        id: impl Into<String>,
        account_id: impl Into<String>,
    ) -> RecurringObligation {
        let amount = if self.amount_spread.is_zero() {
            ExpectedAmount::Fixed {
                amount: self.amount,
            }
        } else {
            ExpectedAmount::Variable {
                amount: self.amount,
                tolerance: Money::from_cents((self.amount_spread.cents() + 1) / 2),
            }
        };

        RecurringObligation {
            id: id.into(),
            account_id: account_id.into(),
            description: self.description,
            category: self.category,
            amount,
            cadence: Cadence::new(self.frequency),
            next_due: self.next_date,
            active: true,
        }
    }
}

/// Lowercase, drop digits and punctuation, collapse whitespace
///
/// "NETFLIX.COM*12345" and "Netflix.com *67890" both become "netflix com".
pub fn normalize_description(description: &str) -> String {
    description
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphabetic() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Map gaps between occurrences to a frequency by their mean
pub fn classify_frequency(gaps: &[i64], bands: &[FrequencyBand]) -> Option<Frequency> {
    if gaps.is_empty() {
        return None;
    }
    let mean = gaps.iter().sum::<i64>() as f64 / gaps.len() as f64;
    bands
        .iter()
        .find(|band| band.contains(mean))
        .map(|band| band.frequency)
}

/// 10 points per occurrence, capped at 40
fn count_score(occurrences: usize) -> u8 {
    (occurrences.min(4) * 10) as u8
}

/// Points for how tightly the amounts cluster around their mean
fn amount_score(spread_ratio: f64) -> u8 {
    if spread_ratio <= 0.01 {
        30
    } else if spread_ratio <= 0.05 {
        20
    } else if spread_ratio <= 0.15 {
        10
    } else {
        0
    }
}

/// Points for how far the worst gap strays from the mean gap
fn interval_score(max_deviation_days: f64) -> u8 {
    if max_deviation_days <= 1.0 {
        30
    } else if max_deviation_days <= 3.0 {
        20
    } else if max_deviation_days <= 5.0 {
        10
    } else {
        0
    }
}

/// Scans settled history for recurring patterns
#[derive(Debug, Clone, Default)]
pub struct RecurringDetector {
    config: DetectionConfig,
}

impl RecurringDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Ranked suggestions not already covered by `existing`
    pub fn suggest(
        &self,
        history: &[TransactionRecord],
        existing: &[RecurringObligation],
    ) -> Vec<ObligationSuggestion> {
        let mut groups: HashMap<(String, SignClass), Vec<&TransactionRecord>> = HashMap::new();
        for record in history.iter().filter(|r| !r.manual && !r.pending) {
            let Some(class) = SignClass::of(record.amount) else {
                continue;
            };
            let key = normalize_description(&record.description);
            if key.is_empty() {
                continue;
            }
            groups.entry((key, class)).or_default().push(record);
        }

        let known: Vec<String> = existing
            .iter()
            .map(|o| normalize_description(&o.description))
            .filter(|d| !d.is_empty())
            .collect();

        let mut suggestions: Vec<ObligationSuggestion> = groups
            .into_iter()
            .filter_map(|((key, class), mut records)| {
                if records.len() < self.config.min_occurrences {
                    return None;
                }
                records.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
                self.score_group(key, class, &records)
            })
            .filter(|s| {
                let covered = known.iter().any(|k| {
                    k.contains(&s.normalized_description) || s.normalized_description.contains(k)
                });
                if covered {
                    debug!(
                        "Skipping '{}': already tracked as an obligation",
                        s.normalized_description
                    );
                }
                !covered
            })
            .collect();

        suggestions.sort_by(|a, b| {
            b.confidence
                .cmp(&a.confidence)
                .then_with(|| b.amount.abs().cmp(&a.amount.abs()))
                .then_with(|| a.description.cmp(&b.description))
        });

        info!(
            "Detected {} recurring patterns in {} records",
            suggestions.len(),
            history.len()
        );
        suggestions
    }

    /// Classify and score one chronologically sorted group
    fn score_group(
        &self,
        key: String,
        class: SignClass,
        records: &[&TransactionRecord],
    ) -> Option<ObligationSuggestion> {
        let last = records.last()?;

        let gaps: Vec<i64> = records
            .windows(2)
            .map(|w| (w[1].date - w[0].date).num_days())
            .collect();
        let Some(frequency) = classify_frequency(&gaps, &self.config.bands) else {
            debug!("'{}': no frequency band for gaps {:?}", key, gaps);
            return None;
        };

        let cents: Vec<i64> = records.iter().map(|r| r.amount.cents()).collect();
        let n = cents.len() as f64;
        let mean_cents = cents.iter().sum::<i64>() as f64 / n;
        let min = cents.iter().copied().min()?;
        let max = cents.iter().copied().max()?;
        let spread_ratio = (max - min) as f64 / mean_cents.abs();

        let mean_gap = gaps.iter().sum::<i64>() as f64 / gaps.len() as f64;
        let max_deviation = gaps
            .iter()
            .map(|g| (*g as f64 - mean_gap).abs())
            .fold(0.0, f64::max);

        let confidence =
            count_score(records.len()) + amount_score(spread_ratio) + interval_score(max_deviation);
        let threshold = self.config.min_confidence(class);
        debug!(
            "'{}' ({:?}, {}): {} occurrences, spread {:.3}, max gap deviation {:.1}, confidence {}",
            key,
            class,
            frequency,
            records.len(),
            spread_ratio,
            max_deviation,
            confidence
        );
        if confidence < threshold {
            return None;
        }

        let next_date = schedule::advance(last.date, &Cadence::new(frequency), 1)?;

        Some(ObligationSuggestion {
            description: last.description.clone(),
            normalized_description: key,
            category: last.category.clone(),
            amount: Money::from_cents(mean_cents.round() as i64),
            amount_spread: Money::from_cents(max - min),
            frequency,
            confidence,
            sign_class: class,
            occurrences: records.len(),
            last_seen: last.date,
            next_date,
        })
    }
}
