//! Format registry: which institution layout a file uses and how to read it
//!
//! Each format is a (name, header predicate, column table + sign rule) entry.
//! The registry is checked in order and the first predicate that matches wins,
//! so entries are listed most-specific first. Files that match nothing fall
//! back to the generic synonym table.

use std::collections::HashMap;

use super::fields::normalize_header;

/// Semantic fields a row parser reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Date,
    Description,
    /// Appended to the description when present ("Original Description")
    SecondaryDescription,
    Category,
    /// Single signed amount column
    Amount,
    /// Money-in column of a split layout
    Inflow,
    /// Money-out column of a split layout
    Outflow,
    /// Transaction type column ("Sale", "Payment", ...)
    Kind,
    Status,
}

/// How a layout encodes the sign of an amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignRule {
    /// Already negative for money leaving the account
    AsIs,
    /// Charges exported as positive numbers
    Invert,
    /// Separate inflow/outflow magnitude columns
    SplitColumns,
    /// Magnitude signed by the transaction-type column
    TypeKeyword,
    /// One layout shared by asset and liability products with opposite
    /// conventions; decided per file
    ProductHeuristic,
}

/// Column table: each field with its header synonyms in priority order
pub type ColumnTable = &'static [(Field, &'static [&'static str])];

/// A file's header row, normalized once for matching
#[derive(Debug, Clone)]
pub struct HeaderSet {
    original: Vec<String>,
    normalized: Vec<String>,
}

impl HeaderSet {
    pub fn new<S: AsRef<str>>(headers: &[S]) -> Self {
        let original: Vec<String> = headers.iter().map(|h| h.as_ref().to_string()).collect();
        let normalized = original.iter().map(|h| normalize_header(h)).collect();
        Self {
            original,
            normalized,
        }
    }

    pub fn len(&self) -> usize {
        self.original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    /// Whether a header is present (compared normalized)
    pub fn has(&self, name: &str) -> bool {
        let name = normalize_header(name);
        self.normalized.iter().any(|h| *h == name)
    }

    pub fn has_all(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.has(n))
    }

    /// The original header name of the first synonym present
    pub fn resolve(&self, synonyms: &[&str]) -> Option<&str> {
        synonyms.iter().find_map(|synonym| {
            let synonym = normalize_header(synonym);
            self.normalized
                .iter()
                .position(|h| *h == synonym)
                .map(|i| self.original[i].as_str())
        })
    }
}

/// Fields resolved to concrete header names for one file
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    columns: HashMap<Field, String>,
}

impl ColumnMap {
    pub fn resolve(headers: &HeaderSet, table: ColumnTable) -> Self {
        let columns = table
            .iter()
            .filter_map(|(field, synonyms)| {
                headers
                    .resolve(synonyms)
                    .map(|header| (*field, header.to_string()))
            })
            .collect();
        Self { columns }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.columns.get(&field).map(String::as_str)
    }

    pub fn has(&self, field: Field) -> bool {
        self.columns.contains_key(&field)
    }
}

/// A supported institution layout
#[derive(Clone, Copy)]
pub struct FormatSpec {
    /// Provenance recorded on each parsed record
    pub name: &'static str,
    pub matches: fn(&HeaderSet) -> bool,
    pub columns: ColumnTable,
    pub sign: SignRule,
}

impl std::fmt::Debug for FormatSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatSpec")
            .field("name", &self.name)
            .field("sign", &self.sign)
            .finish()
    }
}

/// Everything needed to parse the rows of one file
#[derive(Debug, Clone)]
pub struct ParsePlan {
    pub format: String,
    pub columns: ColumnMap,
    pub sign: SignRule,
}

impl ParsePlan {
    fn for_spec(spec: &FormatSpec, headers: &HeaderSet) -> Self {
        Self {
            format: spec.name.to_string(),
            columns: ColumnMap::resolve(headers, spec.columns),
            sign: spec.sign,
        }
    }
}

/// Name recorded for rows parsed by the synonym fallback
pub const GENERIC_FORMAT: &str = "generic_csv";

/// Ordered list of known layouts
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    formats: Vec<FormatSpec>,
}

impl FormatRegistry {
    pub fn new(formats: Vec<FormatSpec>) -> Self {
        Self { formats }
    }

    /// Built-in layouts, most specific first
    pub fn builtin() -> Self {
        Self::new(vec![
            CAPITAL_ONE,
            SHARED_LAYOUT,
            CHASE,
            AMEX_EXTENDED,
            DEBIT_CREDIT,
            BOFA,
            AMEX,
        ])
    }

    pub fn formats(&self) -> &[FormatSpec] {
        &self.formats
    }

    /// First format whose predicate matches the headers
    pub fn detect(&self, headers: &HeaderSet) -> Option<&FormatSpec> {
        self.formats.iter().find(|spec| (spec.matches)(headers))
    }

    /// Resolve a parse plan: a registered format, else the generic synonym table
    pub fn plan(&self, headers: &HeaderSet) -> Option<ParsePlan> {
        match self.detect(headers) {
            Some(spec) => Some(ParsePlan::for_spec(spec, headers)),
            None => generic_plan(headers),
        }
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Build a plan from the generic synonym table
///
/// Needs a date, a description and either an amount or both split columns.
pub fn generic_plan(headers: &HeaderSet) -> Option<ParsePlan> {
    let columns = ColumnMap::resolve(headers, GENERIC_COLUMNS);
    let split = columns.has(Field::Inflow) && columns.has(Field::Outflow);

    if !columns.has(Field::Date) || !columns.has(Field::Description) {
        return None;
    }
    if !split && !columns.has(Field::Amount) {
        return None;
    }

    let sign = if split {
        SignRule::SplitColumns
    } else if columns.has(Field::Kind) {
        SignRule::TypeKeyword
    } else {
        SignRule::AsIs
    };

    Some(ParsePlan {
        format: GENERIC_FORMAT.to_string(),
        columns,
        sign,
    })
}

/// Header synonyms for the fallback parser, highest priority first
pub const GENERIC_COLUMNS: ColumnTable = &[
    (
        Field::Date,
        &[
            "date",
            "transaction date",
            "trans. date",
            "posting date",
            "posted date",
            "post date",
            "value date",
        ],
    ),
    (
        Field::Description,
        &[
            "description",
            "transaction description",
            "payee",
            "merchant",
            "name",
            "details",
            "memo",
        ],
    ),
    (
        Field::SecondaryDescription,
        &["original description", "extended description"],
    ),
    (Field::Category, &["category", "transaction category"]),
    (
        Field::Amount,
        &["amount", "transaction amount", "amount (usd)", "value"],
    ),
    (
        Field::Inflow,
        &[
            "credit",
            "credits",
            "credit amount",
            "deposit",
            "deposits",
            "inflow",
            "money in",
        ],
    ),
    (
        Field::Outflow,
        &[
            "debit",
            "debits",
            "debit amount",
            "withdrawal",
            "withdrawals",
            "outflow",
            "money out",
        ],
    ),
    (
        Field::Kind,
        &["transaction type", "type", "trans. type", "trans type"],
    ),
    (Field::Status, &["status", "transaction status"]),
];

/// Capital One: Transaction Date,Posted Date,Card No.,Description,Category,Debit,Credit
/// Note: "Posted" with 'ed' distinguishes it from Chase's "Post Date"
pub const CAPITAL_ONE: FormatSpec = FormatSpec {
    name: "capitalone_csv",
    matches: is_capital_one,
    columns: &[
        (Field::Date, &["transaction date"]),
        (Field::Description, &["description"]),
        (Field::Category, &["category"]),
        (Field::Inflow, &["credit"]),
        (Field::Outflow, &["debit"]),
    ],
    sign: SignRule::SplitColumns,
};

/// Shared checking/credit-card export:
/// Date,Description,Original Description,Category,Amount,Status
///
/// The institution uses this exact layout for both its deposit and its card
/// products, with opposite sign conventions.
pub const SHARED_LAYOUT: FormatSpec = FormatSpec {
    name: "shared_layout_csv",
    matches: is_shared_layout,
    columns: &[
        (Field::Date, &["date"]),
        (Field::Description, &["description"]),
        (Field::SecondaryDescription, &["original description"]),
        (Field::Category, &["category"]),
        (Field::Amount, &["amount"]),
        (Field::Status, &["status"]),
    ],
    sign: SignRule::ProductHeuristic,
};

/// Chase: Transaction Date,Post Date,Description,Category,Type,Amount,Memo
pub const CHASE: FormatSpec = FormatSpec {
    name: "chase_csv",
    matches: is_chase,
    columns: &[
        (Field::Date, &["transaction date"]),
        (Field::Description, &["description"]),
        (Field::Category, &["category"]),
        (Field::Amount, &["amount"]),
        (Field::Kind, &["type"]),
    ],
    sign: SignRule::TypeKeyword,
};

/// Amex extended: Date,Description,Card Member,Account #,Amount,Extended Details,...,Category
/// Amex shows charges as POSITIVE numbers (inverted from typical)
pub const AMEX_EXTENDED: FormatSpec = FormatSpec {
    name: "amex_extended_csv",
    matches: is_amex_extended,
    columns: &[
        (Field::Date, &["date"]),
        (
            Field::Description,
            &["appears on your statement as", "description"],
        ),
        (Field::Category, &["category"]),
        (Field::Amount, &["amount"]),
    ],
    sign: SignRule::Invert,
};

/// Generic bank layout with separate Debit and Credit columns.
/// Must be checked before the single-amount layouts, since a file may carry
/// an informational Amount column as well.
pub const DEBIT_CREDIT: FormatSpec = FormatSpec {
    name: "debit_credit_csv",
    matches: is_debit_credit,
    columns: &[
        (Field::Date, &["date"]),
        (Field::Description, &["description"]),
        (Field::Category, &["category"]),
        (Field::Inflow, &["credit"]),
        (Field::Outflow, &["debit"]),
        (Field::Status, &["status"]),
    ],
    sign: SignRule::SplitColumns,
};

/// Bank of America: Date,Description,Amount,Running Bal.
/// BECU and similar banks use "Balance" instead of "Running Bal."
pub const BOFA: FormatSpec = FormatSpec {
    name: "bofa_csv",
    matches: is_bofa,
    columns: &[
        (Field::Date, &["date"]),
        (Field::Description, &["description"]),
        (Field::Amount, &["amount"]),
    ],
    sign: SignRule::AsIs,
};

/// Amex simple: exactly Date,Description,Amount
pub const AMEX: FormatSpec = FormatSpec {
    name: "amex_csv",
    matches: is_amex_simple,
    columns: &[
        (Field::Date, &["date"]),
        (Field::Description, &["description"]),
        (Field::Amount, &["amount"]),
    ],
    sign: SignRule::Invert,
};

fn is_capital_one(h: &HeaderSet) -> bool {
    h.has_all(&["transaction date", "posted date", "card no.", "debit", "credit"])
}

fn is_shared_layout(h: &HeaderSet) -> bool {
    h.has_all(&[
        "date",
        "description",
        "original description",
        "category",
        "amount",
        "status",
    ])
}

fn is_chase(h: &HeaderSet) -> bool {
    h.has_all(&["transaction date", "post date", "description", "type", "amount"])
}

fn is_amex_extended(h: &HeaderSet) -> bool {
    h.has_all(&["date", "description", "card member", "amount"])
}

fn is_debit_credit(h: &HeaderSet) -> bool {
    h.has_all(&["date", "description", "debit", "credit"])
}

fn is_bofa(h: &HeaderSet) -> bool {
    h.has_all(&["date", "description", "amount"]) && (h.has("running bal.") || h.has("balance"))
}

fn is_amex_simple(h: &HeaderSet) -> bool {
    h.len() == 3 && h.has_all(&["date", "description", "amount"])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(header: &str) -> Option<&'static str> {
        let headers: Vec<&str> = header.split(',').collect();
        FormatRegistry::builtin()
            .detect(&HeaderSet::new(&headers))
            .map(|spec| spec.name)
    }

    #[test]
    fn test_detect_chase() {
        let header = "Transaction Date,Post Date,Description,Category,Type,Amount,Memo";
        assert_eq!(detect(header), Some("chase_csv"));
    }

    #[test]
    fn test_detect_bofa() {
        assert_eq!(detect("Date,Description,Amount,Running Bal."), Some("bofa_csv"));
        assert_eq!(detect("Date,Description,Amount,Balance"), Some("bofa_csv"));
    }

    #[test]
    fn test_detect_amex() {
        assert_eq!(detect("Date,Description,Amount"), Some("amex_csv"));
        let extended = "Date,Description,Card Member,Account #,Amount,Extended Details,Appears On Your Statement As,Address,City/State,Zip Code,Country,Reference,Category";
        assert_eq!(detect(extended), Some("amex_extended_csv"));
    }

    #[test]
    fn test_detect_capitalone() {
        let header = "Transaction Date,Posted Date,Card No.,Description,Category,Debit,Credit";
        assert_eq!(detect(header), Some("capitalone_csv"));
    }

    #[test]
    fn test_detect_shared_layout() {
        let header = "Date,Description,Original Description,Category,Amount,Status";
        assert_eq!(detect(header), Some("shared_layout_csv"));
    }

    #[test]
    fn test_split_columns_checked_before_single_amount() {
        // Would also satisfy the BofA predicate if it were checked first
        let header = "Date,Description,Amount,Debit,Credit,Balance";
        assert_eq!(detect(header), Some("debit_credit_csv"));
    }

    #[test]
    fn test_detect_header_case_and_whitespace() {
        assert_eq!(detect(" date , DESCRIPTION ,amount"), Some("amex_csv"));
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(detect("Some,Random,Headers,Here"), None);
    }

    #[test]
    fn test_generic_plan_resolves_synonyms_by_priority() {
        let headers = HeaderSet::new(&["Posting Date", "Payee", "Memo", "Withdrawals", "Deposits"]);
        let plan = generic_plan(&headers).unwrap();

        assert_eq!(plan.format, GENERIC_FORMAT);
        assert_eq!(plan.sign, SignRule::SplitColumns);
        assert_eq!(plan.columns.get(Field::Date), Some("Posting Date"));
        // "payee" outranks "memo"
        assert_eq!(plan.columns.get(Field::Description), Some("Payee"));
        assert_eq!(plan.columns.get(Field::Outflow), Some("Withdrawals"));
        assert_eq!(plan.columns.get(Field::Inflow), Some("Deposits"));
    }

    #[test]
    fn test_generic_plan_single_amount() {
        let headers = HeaderSet::new(&["Value Date", "Details", "Transaction Amount"]);
        let plan = generic_plan(&headers).unwrap();
        assert_eq!(plan.sign, SignRule::AsIs);
        assert_eq!(plan.columns.get(Field::Amount), Some("Transaction Amount"));
    }

    #[test]
    fn test_generic_plan_type_column() {
        let headers = HeaderSet::new(&["Posting Date", "Payee", "Trans. Type", "Amount"]);
        let plan = generic_plan(&headers).unwrap();
        assert_eq!(plan.sign, SignRule::TypeKeyword);
        assert_eq!(plan.columns.get(Field::Kind), Some("Trans. Type"));
    }

    #[test]
    fn test_generic_plan_requires_core_fields() {
        assert!(generic_plan(&HeaderSet::new(&["Date", "Amount"])).is_none());
        assert!(generic_plan(&HeaderSet::new(&["Date", "Payee", "Debit"])).is_none());
    }

    #[test]
    fn test_custom_registry_order() {
        // A registry is plain data; callers can supply their own ordering
        let registry = FormatRegistry::new(vec![BOFA, DEBIT_CREDIT]);
        let headers = HeaderSet::new(&["Date", "Description", "Amount", "Debit", "Credit", "Balance"]);
        assert_eq!(registry.detect(&headers).map(|s| s.name), Some("bofa_csv"));
    }
}
