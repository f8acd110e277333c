//! Record Source Port (Driven Port)
//!
//! Supplies daily snapshots, whether from per-day flat files or a
//! relational dump table.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::record::{RawRecord, SnapshotError};

/// Errors raised by a record source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source cannot be reached at all.
    #[error("Record source unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// A listed day has no data.
    #[error("No snapshot for {date}")]
    MissingDay {
        /// The missing day.
        date: NaiveDate,
    },

    /// A day's data could not be decoded.
    #[error("Malformed snapshot at {location}: {message}")]
    Malformed {
        /// File or table the day came from.
        location: String,
        /// Decoding failure.
        message: String,
    },

    /// A day decoded but failed validation.
    #[error("Invalid snapshot: {0}")]
    Invalid(#[from] SnapshotError),
}

impl SourceError {
    /// Whether the error affects a single day only.
    #[must_use]
    pub const fn is_per_day(&self) -> bool {
        !matches!(self, Self::Unavailable { .. })
    }
}

/// Port for reading raw daily snapshots.
pub trait RecordSource {
    /// Trading dates with data, ascending.
    fn list_available_dates(&self) -> Result<Vec<NaiveDate>, SourceError>;

    /// Every record of one trading date.
    fn records_for(&self, date: NaiveDate) -> Result<Vec<RawRecord>, SourceError>;

    /// Source name for logs.
    fn name(&self) -> &'static str;
}
