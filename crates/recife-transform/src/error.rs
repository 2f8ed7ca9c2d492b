//! Error types for transformation stages.

use chrono::NaiveDate;
use thiserror::Error;

/// Result type for transformation stages.
pub type Result<T> = std::result::Result<T, TransformError>;

/// Errors that abort a transformation stage.
#[derive(Debug, Error)]
pub enum TransformError {
    /// Landing rows missing a mandatory key
    #[error("Malformed input: {rows} {kind} row(s) missing a mandatory key")]
    MalformedInput {
        /// Which landing table the rows came from
        kind: &'static str,
        /// Number of offending rows
        rows: usize,
    },

    /// A cleaned row references a date absent from the date dimension
    #[error("Join integrity: date {0} is not in the date dimension")]
    UnknownDate(NaiveDate),

    /// A cleaned row references a ticker absent from the stock dimension
    #[error("Join integrity: ticker '{0}' is not in the stock dimension")]
    UnknownTicker(String),

    /// Invalid date range
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        /// Start date of the range
        start: NaiveDate,
        /// End date of the range
        end: NaiveDate,
    },
}

impl TransformError {
    /// Whether this error is a join-integrity failure.
    pub const fn is_join_integrity(&self) -> bool {
        matches!(self, Self::UnknownDate(_) | Self::UnknownTicker(_))
    }
}
