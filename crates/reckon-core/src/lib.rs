//! Reckon Core Library
//!
//! Ledger reconciliation and balance projection for personal accounts:
//! - Bank CSV import with format detection and sign normalization
//! - Recurring obligation detection (bills, paychecks, subscriptions)
//! - Cadence scheduling (day-of-month and nth-weekday anchors)
//! - Running-balance projection anchored to a known balance
//!
//! Everything is synchronous and works on owned values passed in by the
//! caller; the only I/O is reading a config file or a CSV when asked.

pub mod config;
pub mod detect;
pub mod error;
pub mod import;
pub mod models;
pub mod projection;
pub mod schedule;

/// Record and obligation builders for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::EngineConfig;
pub use detect::{
    classify_frequency, normalize_description, DetectionConfig, FrequencyBand,
    ObligationSuggestion, RecurringDetector,
};
pub use error::{Error, Result};
pub use import::formats::{FormatRegistry, FormatSpec, HeaderSet, SignRule};
pub use import::{
    import_rows, merge_new, read_csv, ImportConfig, ImportOutcome, Importer, MergeResult,
    SignAmbiguity,
};
pub use models::*;
pub use projection::{
    dismiss, generate_occurrences, materialize, project, strip_projection_marker, DismissalSet,
    LedgerEntry, ProjectedOccurrence, Projection, ProjectionConfig, ProjectionInput,
    ProjectionSummary,
};
