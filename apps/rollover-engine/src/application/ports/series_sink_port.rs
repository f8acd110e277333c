//! Series Sink Port (Driven Port)
//!
//! Durable home of continuous series, the expiry history, the multiplier
//! table and the audit exports. Implementations must make each write
//! all-or-nothing so a failure never corrupts data flushed earlier.

use std::fmt;

use thiserror::Error;

use crate::domain::adjustment::MultiplierTable;
use crate::domain::audit::AuditReport;
use crate::domain::expiry::ExpiryHistory;
use crate::domain::record::RawRecord;

/// Which flavour of a label's series is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeriesKind {
    /// Unadjusted prices as selected.
    Continuous,
    /// Ratio-adjusted prices.
    RatioAdjusted,
}

impl SeriesKind {
    /// Storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Continuous => "continuous",
            Self::RatioAdjusted => "ratio_adjusted",
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Filesystem failure.
    #[error("Sink I/O error at {location}: {source}")]
    Io {
        /// Path involved.
        location: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Data could not be encoded or decoded.
    #[error("Sink encoding error at {location}: {message}")]
    Encoding {
        /// Path or table involved.
        location: String,
        /// Error details.
        message: String,
    },

    /// Database failure.
    #[error("Sink storage error: {message}")]
    Storage {
        /// Error details.
        message: String,
    },

    /// Write refused (e.g. injected failure in tests, read-only store).
    #[error("Sink rejected write for {label}")]
    Rejected {
        /// Label whose write was refused.
        label: String,
    },
}

/// Port for persisting pass outputs.
pub trait SeriesSink {
    /// Replace the stored series for `label`.
    fn persist_series(
        &mut self,
        label: &str,
        kind: SeriesKind,
        records: &[RawRecord],
    ) -> Result<(), SinkError>;

    /// Stored series for `label`, in date order. Empty when absent.
    fn read_series(&self, label: &str, kind: SeriesKind) -> Result<Vec<RawRecord>, SinkError>;

    /// Labels with a stored series, sorted.
    fn series_labels(&self, kind: SeriesKind) -> Result<Vec<String>, SinkError>;

    /// Replace the stored expiry history.
    fn persist_expiry_history(&mut self, history: &ExpiryHistory) -> Result<(), SinkError>;

    /// Stored expiry history, if any.
    fn read_expiry_history(&self) -> Result<Option<ExpiryHistory>, SinkError>;

    /// Replace the stored multiplier table.
    fn persist_multiplier_table(&mut self, table: &MultiplierTable) -> Result<(), SinkError>;

    /// Stored multiplier table, if any.
    fn read_multiplier_table(&self) -> Result<Option<MultiplierTable>, SinkError>;

    /// Replace the audit exports.
    fn persist_audit(&mut self, report: &AuditReport) -> Result<(), SinkError>;

    /// Sink name for logs.
    fn name(&self) -> &'static str;
}
