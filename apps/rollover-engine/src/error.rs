//! Rich error handling for the rollover engine.
//!
//! Layer errors ([`SourceError`], [`SinkError`], [`ConfigError`],
//! [`IntegrityError`]) convert into an [`EngineError`] carrying a stable
//! code, a message and key-value context for logs and exit reporting.
//!
//! | Code | Severity | Usage |
//! |------|----------|-------|
//! | `CONFIG_INVALID` | Fatal | Config file unreadable or invalid |
//! | `SOURCE_UNAVAILABLE` | Fatal | Record source cannot be listed |
//! | `SNAPSHOT_MISSING` | Recoverable | A listed day has no records |
//! | `SNAPSHOT_MALFORMED` | Recoverable | A day failed decoding or validation |
//! | `SINK_FAILURE` | Fatal | Output store write or read failed |
//! | `EXPIRY_REGRESSION` | Recoverable | A series moved to an earlier expiry |
//! | `FLAT_MULTIPLIER` | Recoverable | A rollover ratio defaulted to 1 |
//! | `NON_FINITE_MULTIPLIER` | Recoverable | A multiplier cannot be applied |
//! | `INTERNAL_ERROR` | Fatal | Anything else |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::ports::{SinkError, SourceError};
use crate::application::use_cases::PassError;
use crate::config::ConfigError;
use crate::domain::adjustment::IntegrityError;

/// Error codes for the rollover engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Configuration unreadable or invalid.
    ConfigInvalid,
    /// Record source cannot be reached.
    SourceUnavailable,
    /// A listed trading day has no records.
    SnapshotMissing,
    /// A trading day failed decoding or validation.
    SnapshotMalformed,
    /// Output store failure.
    SinkFailure,
    /// Expiry sequence decreased within a series.
    ExpiryRegression,
    /// Rollover multiplier defaulted to 1.
    FlatMultiplier,
    /// Multiplier not applicable to decimal prices.
    NonFiniteMultiplier,
    /// Unexpected failure.
    InternalError,
}

/// Whether a pass can continue past an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Logged, counted and skipped.
    Recoverable,
    /// Aborts the command.
    Fatal,
}

impl ErrorCode {
    /// Stable reason string.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::SourceUnavailable => "SOURCE_UNAVAILABLE",
            Self::SnapshotMissing => "SNAPSHOT_MISSING",
            Self::SnapshotMalformed => "SNAPSHOT_MALFORMED",
            Self::SinkFailure => "SINK_FAILURE",
            Self::ExpiryRegression => "EXPIRY_REGRESSION",
            Self::FlatMultiplier => "FLAT_MULTIPLIER",
            Self::NonFiniteMultiplier => "NON_FINITE_MULTIPLIER",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Severity class.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::SnapshotMissing
            | Self::SnapshotMalformed
            | Self::ExpiryRegression
            | Self::FlatMultiplier
            | Self::NonFiniteMultiplier => Severity::Recoverable,

            Self::ConfigInvalid
            | Self::SourceUnavailable
            | Self::SinkFailure
            | Self::InternalError => Severity::Fatal,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

/// A rich error with context for the rollover engine.
#[derive(Debug, Error)]
pub struct EngineError {
    code: ErrorCode,
    message: String,
    context: Vec<(String, String)>,
}

impl EngineError {
    /// Create a new engine error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    /// Add context to the error.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }

    /// Get the error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the context.
    #[must_use]
    pub fn context(&self) -> &[(String, String)] {
        &self.context
    }

    /// Whether the error aborts the command.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self.code.severity(), Severity::Fatal)
    }

    /// Internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.reason(), self.message)?;
        for (key, value) in &self.context {
            write!(f, " {key}={value}")?;
        }
        Ok(())
    }
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        let error = Self::new(ErrorCode::ConfigInvalid, err.to_string());
        match err {
            ConfigError::ReadError { path, .. } => error.with_context("path", path),
            ConfigError::ParseError(_) | ConfigError::ValidationError(_) => error,
        }
    }
}

impl From<SourceError> for EngineError {
    fn from(err: SourceError) -> Self {
        let message = err.to_string();
        match err {
            SourceError::Unavailable { .. } => Self::new(ErrorCode::SourceUnavailable, message),
            SourceError::MissingDay { date } => {
                Self::new(ErrorCode::SnapshotMissing, message).with_context("date", date.to_string())
            }
            SourceError::Malformed { location, .. } => {
                Self::new(ErrorCode::SnapshotMalformed, message).with_context("location", location)
            }
            SourceError::Invalid(_) => Self::new(ErrorCode::SnapshotMalformed, message),
        }
    }
}

impl From<SinkError> for EngineError {
    fn from(err: SinkError) -> Self {
        let error = Self::new(ErrorCode::SinkFailure, err.to_string());
        match err {
            SinkError::Io { location, .. } | SinkError::Encoding { location, .. } => {
                error.with_context("location", location)
            }
            SinkError::Rejected { label } => error.with_context("label", label),
            SinkError::Storage { .. } => error,
        }
    }
}

impl From<PassError> for EngineError {
    fn from(err: PassError) -> Self {
        match err {
            PassError::Source(e) => e.into(),
            PassError::Sink(e) => e.into(),
        }
    }
}

impl From<IntegrityError> for EngineError {
    fn from(err: IntegrityError) -> Self {
        let message = err.to_string();
        match err {
            IntegrityError::ExpiryRegression(r) => Self::new(ErrorCode::ExpiryRegression, message)
                .with_context("label", r.label)
                .with_context("date", r.date.to_string()),
            IntegrityError::FlatMultiplier(f) => Self::new(ErrorCode::FlatMultiplier, message)
                .with_context("label", f.label)
                .with_context("date", f.date.to_string()),
            IntegrityError::NonFiniteMultiplier { label, date, .. } => {
                Self::new(ErrorCode::NonFiniteMultiplier, message)
                    .with_context("label", label)
                    .with_context("date", date.to_string())
            }
        }
    }
}
