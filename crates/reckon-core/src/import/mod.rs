//! Statement ingestion: format detection, row parsing and sign normalization
//!
//! Input is a header list plus header-keyed rows (as produced by [`read_csv`]
//! or any other tabular source). Output is canonical [`TransactionRecord`]s
//! where negative amounts always mean money leaving the account.

pub mod fields;
pub mod formats;

use std::collections::{HashMap, HashSet};
use std::io::Read;

use chrono::NaiveDate;
use csv::ReaderBuilder;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{AccountKind, Money, TransactionRecord, DEFAULT_CATEGORY};

use fields::{classify_kind, is_pending_status, parse_amount, parse_date, Direction};
use formats::{Field, FormatRegistry, HeaderSet, ParsePlan, SignRule};

/// One raw row, keyed by header name
pub type RawRow = HashMap<String, String>;

/// Import configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Category for rows without one
    pub default_category: String,
    /// Regex matched against description and category to spot card payments
    pub payment_signature: String,
    /// Fraction of positive payment rows above which a shared-layout file is inverted
    pub inversion_threshold: f64,
    /// Ratios this close to the threshold are reported as ambiguous
    pub ambiguity_margin: f64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            default_category: DEFAULT_CATEGORY.to_string(),
            payment_signature:
                r"(?i)(payment\s*(received|-?\s*thank\s*you)|thank\s*you\s*for\s*your\s*payment|autopay|^credit\s*card\s*payments?$)"
                    .to_string(),
            inversion_threshold: 0.05,
            ambiguity_margin: 0.02,
        }
    }
}

/// Reported when the shared-layout heuristic lands near its threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignAmbiguity {
    /// Fraction of rows that look like a positive "payment received"
    pub ratio: f64,
    pub threshold: f64,
    /// What the heuristic decided anyway
    pub inverted: bool,
}

/// Result of importing one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOutcome {
    /// Format name that parsed the file
    pub format: String,
    pub records: Vec<TransactionRecord>,
    /// Row-level problems; the rows were dropped, the batch continued
    pub errors: Vec<String>,
    /// Whether every amount in the file was sign-inverted
    pub sign_inverted: bool,
    #[serde(default)]
    pub ambiguity: Option<SignAmbiguity>,
}

/// Read CSV bytes into a header list and header-keyed rows
///
/// Rows may be shorter or longer than the header; blank lines are dropped.
pub fn read_csv<R: Read>(reader: R) -> Result<(Vec<String>, Vec<RawRow>)> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if record.iter().all(|value| value.trim().is_empty()) {
            continue;
        }
        let row: RawRow = headers
            .iter()
            .enumerate()
            .filter_map(|(i, header)| record.get(i).map(|v| (header.clone(), v.to_string())))
            .collect();
        rows.push(row);
    }

    Ok((headers, rows))
}

/// Parse rows with the built-in format registry
pub fn import_rows(
    headers: &[String],
    rows: &[RawRow],
    hint: Option<AccountKind>,
    account_id: &str,
    config: &ImportConfig,
) -> Result<ImportOutcome> {
    Importer::new(config)?.import(headers, rows, hint, account_id)
}

/// Parses files against a format registry with a fixed configuration
#[derive(Debug, Clone)]
pub struct Importer {
    registry: FormatRegistry,
    config: ImportConfig,
    payment_signature: Regex,
}

/// A row that made it through parsing, before ids are assigned
struct ParsedRow {
    date: NaiveDate,
    description: String,
    category: String,
    amount: Money,
    pending: bool,
    original_data: String,
}

enum RowOutcome {
    Parsed(ParsedRow),
    /// Missing mandatory cell; dropped silently
    Skipped,
    Failed(String),
}

impl Importer {
    pub fn new(config: &ImportConfig) -> Result<Self> {
        Self::with_registry(config, FormatRegistry::builtin())
    }

    pub fn with_registry(config: &ImportConfig, registry: FormatRegistry) -> Result<Self> {
        Ok(Self {
            registry,
            config: config.clone(),
            payment_signature: Regex::new(&config.payment_signature)?,
        })
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    /// Parse one file's rows into records for `account_id`
    pub fn import(
        &self,
        headers: &[String],
        rows: &[RawRow],
        hint: Option<AccountKind>,
        account_id: &str,
    ) -> Result<ImportOutcome> {
        if rows.is_empty() {
            return Err(Error::NoData);
        }

        let header_set = HeaderSet::new(headers);
        let plan = self.registry.plan(&header_set).ok_or_else(|| {
            Error::UnsupportedFormat(format!("unrecognized headers: {}", headers.join(",")))
        })?;
        debug!("Detected format {} ({:?} signs)", plan.format, plan.sign);

        let (invert, ambiguity) = match plan.sign {
            SignRule::ProductHeuristic => self.decide_inversion(rows, &plan, hint),
            SignRule::Invert => (true, None),
            _ => (false, None),
        };

        let mut parsed = Vec::new();
        let mut errors = Vec::new();
        let mut skipped = 0usize;
        for (i, row) in rows.iter().enumerate() {
            match self.parse_row(headers, row, &plan, invert) {
                RowOutcome::Parsed(p) => parsed.push(p),
                RowOutcome::Skipped => skipped += 1,
                RowOutcome::Failed(message) => errors.push(format!("row {}: {}", i + 1, message)),
            }
        }

        if parsed.is_empty() && plan.format == formats::GENERIC_FORMAT {
            return Err(Error::UnsupportedFormat(format!(
                "no rows could be parsed with the generic layout ({} row errors)",
                errors.len()
            )));
        }

        let records = build_records(parsed, &plan.format, account_id);

        if skipped > 0 {
            debug!("Skipped {} incomplete rows", skipped);
        }
        if !errors.is_empty() {
            warn!("{} rows could not be parsed", errors.len());
        }
        info!(
            "Parsed {} {} records{}",
            records.len(),
            plan.format,
            if invert { " (signs inverted)" } else { "" }
        );

        Ok(ImportOutcome {
            format: plan.format,
            records,
            errors,
            sign_inverted: invert,
            ambiguity,
        })
    }

    /// Decide whether a shared-layout file needs its signs inverted
    ///
    /// An explicit hint wins. Otherwise count rows that look like a card
    /// payment ("Payment received") and carry a positive raw amount; a
    /// ratio above the threshold marks the liability product.
    fn decide_inversion(
        &self,
        rows: &[RawRow],
        plan: &ParsePlan,
        hint: Option<AccountKind>,
    ) -> (bool, Option<SignAmbiguity>) {
        if let Some(kind) = hint {
            debug!("Sign convention taken from account hint: {}", kind);
            return (kind == AccountKind::Liability, None);
        }

        let mut considered = 0usize;
        let mut payments = 0usize;
        for row in rows {
            let Some(amount) = cell(row, plan, Field::Amount).and_then(|s| parse_amount(s).ok())
            else {
                continue;
            };
            considered += 1;

            let looks_like_payment = [Field::Description, Field::Category]
                .into_iter()
                .filter_map(|field| cell(row, plan, field))
                .any(|text| self.payment_signature.is_match(text));
            if looks_like_payment && amount.is_positive() {
                payments += 1;
            }
        }

        if considered == 0 {
            return (false, None);
        }

        let ratio = payments as f64 / considered as f64;
        let threshold = self.config.inversion_threshold;
        let invert = ratio > threshold;
        debug!(
            "Payment signature ratio {:.3} ({} of {} rows), threshold {:.3}",
            ratio, payments, considered, threshold
        );

        let ambiguity = ((ratio - threshold).abs() <= self.config.ambiguity_margin).then(|| {
            warn!(
                "Sign convention is ambiguous (ratio {:.3} near threshold {:.3}); {}",
                ratio,
                threshold,
                if invert { "inverting" } else { "keeping signs" }
            );
            SignAmbiguity {
                ratio,
                threshold,
                inverted: invert,
            }
        });

        (invert, ambiguity)
    }

    fn parse_row(
        &self,
        headers: &[String],
        row: &RawRow,
        plan: &ParsePlan,
        invert: bool,
    ) -> RowOutcome {
        let (Some(date_str), Some(description)) = (
            cell(row, plan, Field::Date),
            cell(row, plan, Field::Description),
        ) else {
            return RowOutcome::Skipped;
        };

        let date = match parse_date(date_str) {
            Ok(d) => d,
            Err(e) => return RowOutcome::Failed(error_message(e)),
        };

        let amount = match plan.sign {
            SignRule::SplitColumns => {
                let inflow = cell(row, plan, Field::Inflow);
                let outflow = cell(row, plan, Field::Outflow);
                if inflow.is_none() && outflow.is_none() {
                    return RowOutcome::Skipped;
                }
                let inflow = match inflow.map(parse_amount).transpose() {
                    Ok(v) => v.unwrap_or(Money::ZERO),
                    Err(e) => return RowOutcome::Failed(error_message(e)),
                };
                let outflow = match outflow.map(parse_amount).transpose() {
                    Ok(v) => v.unwrap_or(Money::ZERO),
                    Err(e) => return RowOutcome::Failed(error_message(e)),
                };
                if inflow.is_positive() {
                    inflow
                } else {
                    -outflow
                }
            }
            sign => {
                let Some(raw) = cell(row, plan, Field::Amount) else {
                    return RowOutcome::Skipped;
                };
                let raw = match parse_amount(raw) {
                    Ok(v) => v,
                    Err(e) => return RowOutcome::Failed(error_message(e)),
                };
                match sign {
                    SignRule::TypeKeyword => {
                        match cell(row, plan, Field::Kind).and_then(classify_kind) {
                            Some(Direction::Outflow) => -raw.abs(),
                            Some(Direction::Inflow) => raw.abs(),
                            None => raw,
                        }
                    }
                    _ if invert => -raw,
                    _ => raw,
                }
            }
        };

        let description = match cell(row, plan, Field::SecondaryDescription) {
            Some(original) if !original.eq_ignore_ascii_case(description) => {
                format!("{} - {}", description, original)
            }
            _ => description.to_string(),
        };

        let category = cell(row, plan, Field::Category)
            .map(str::to_string)
            .unwrap_or_else(|| self.config.default_category.clone());

        let pending = cell(row, plan, Field::Status).is_some_and(is_pending_status);

        RowOutcome::Parsed(ParsedRow {
            date,
            description,
            category,
            amount,
            pending,
            original_data: row_to_json(headers, row),
        })
    }
}

/// Trimmed, non-empty cell for a field
fn cell<'r>(row: &'r RawRow, plan: &ParsePlan, field: Field) -> Option<&'r str> {
    plan.columns
        .get(field)
        .and_then(|header| row.get(header))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn error_message(e: Error) -> String {
    match e {
        Error::InvalidData(message) => message,
        other => other.to_string(),
    }
}

/// Convert a row to a JSON object, keeping only the file's own columns
fn row_to_json(headers: &[String], row: &RawRow) -> String {
    let mut map = serde_json::Map::new();
    for header in headers {
        if let Some(value) = row.get(header) {
            map.insert(header.clone(), Value::String(value.clone()));
        }
    }
    Value::Object(map).to_string()
}

/// Assign per-day sequence numbers, hashes and ids
///
/// Exports list the newest row first, so among rows sharing a date the one
/// nearest the top gets the highest sequence number and the last gets 1.
/// Sorting ids lexically then yields oldest-to-newest order within a day.
fn build_records(parsed: Vec<ParsedRow>, format: &str, account_id: &str) -> Vec<TransactionRecord> {
    let mut remaining: HashMap<NaiveDate, u32> = HashMap::new();
    for row in &parsed {
        *remaining.entry(row.date).or_insert(0) += 1;
    }

    // Duplicate index counted from the bottom (oldest) so overlapping
    // exports produce the same hash for the same transaction
    let mut duplicate_index = vec![0u32; parsed.len()];
    {
        let mut seen: HashMap<(NaiveDate, &str, Money), u32> = HashMap::new();
        for (i, row) in parsed.iter().enumerate().rev() {
            let count = seen
                .entry((row.date, row.description.as_str(), row.amount))
                .or_insert(0);
            duplicate_index[i] = *count;
            *count += 1;
        }
    }

    let mut records = Vec::with_capacity(parsed.len());
    for (row, dup) in parsed.into_iter().zip(duplicate_index) {
        let sequence = remaining.get_mut(&row.date).map_or(1, |n| {
            let current = *n;
            *n -= 1;
            current
        });
        let import_hash =
            generate_hash(account_id, &row.date, &row.description, row.amount, dup);

        records.push(TransactionRecord {
            id: TransactionRecord::imported_id(row.date, sequence, &import_hash),
            account_id: account_id.to_string(),
            date: row.date,
            description: row.description,
            category: row.category,
            amount: row.amount,
            pending: row.pending,
            reconciled: false,
            manual: false,
            visible: true,
            import_format: Some(format.to_string()),
            import_hash: Some(import_hash),
            original_data: Some(row.original_data),
        });
    }

    records
}

/// Generate a unique hash for deduplication
fn generate_hash(
    account_id: &str,
    date: &NaiveDate,
    description: &str,
    amount: Money,
    duplicate_index: u32,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(account_id.as_bytes());
    hasher.update(date.to_string().as_bytes());
    hasher.update(description.as_bytes());
    hasher.update(amount.cents().to_be_bytes());
    // Distinguishes separate transactions with identical date/description/amount
    hasher.update(duplicate_index.to_be_bytes());
    hex::encode(hasher.finalize())
}

/// Records kept after dropping ones already imported
#[derive(Debug, Clone, Default)]
pub struct MergeResult {
    pub added: Vec<TransactionRecord>,
    pub skipped: usize,
}

/// Drop incoming records whose import hash already exists
pub fn merge_new(existing: &[TransactionRecord], incoming: Vec<TransactionRecord>) -> MergeResult {
    let known: HashSet<&str> = existing
        .iter()
        .filter_map(|r| r.import_hash.as_deref())
        .collect();

    let mut result = MergeResult::default();
    let mut added_hashes = HashSet::new();
    for record in incoming {
        let duplicate = match record.import_hash.as_deref() {
            Some(hash) => known.contains(hash) || !added_hashes.insert(hash.to_string()),
            None => false,
        };
        if duplicate {
            result.skipped += 1;
        } else {
            result.added.push(record);
        }
    }
    debug!(
        "Merged import: {} new, {} already present",
        result.added.len(),
        result.skipped
    );
    result
}
