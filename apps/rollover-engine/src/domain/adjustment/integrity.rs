//! Data-integrity findings raised while building multipliers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A rollover for which no lookback day had both contracts priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatMultiplier {
    /// Output label.
    pub label: String,
    /// Rollover date.
    pub date: NaiveDate,
    /// Expiry rolled away from.
    pub previous_expiry: NaiveDate,
    /// Expiry rolled to.
    pub current_expiry: NaiveDate,
}

/// The expiry followed by a series moved backwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryRegression {
    /// Output label.
    pub label: String,
    /// Date the earlier expiry reappeared.
    pub date: NaiveDate,
    /// Expiry held the day before.
    pub previous_expiry: NaiveDate,
    /// Earlier expiry found on `date`.
    pub current_expiry: NaiveDate,
}

/// Integrity errors surfaced by the multiplier engine.
///
/// None of these abort a pass; they are logged and exported for review.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrityError {
    /// Expiry sequence decreased.
    #[error(
        "expiry regression for {} on {}: {} -> {}",
        .0.label, .0.date, .0.previous_expiry, .0.current_expiry
    )]
    ExpiryRegression(ExpiryRegression),

    /// Multiplier defaulted to 1.
    #[error(
        "flat multiplier for {} on {}: no lookback day priced both {} and {}",
        .0.label, .0.date, .0.previous_expiry, .0.current_expiry
    )]
    FlatMultiplier(FlatMultiplier),

    /// A cumulative multiplier cannot be applied to decimal prices.
    #[error("multiplier {value} for {label} on {date} cannot be applied")]
    NonFiniteMultiplier {
        /// Output label.
        label: String,
        /// Trading date.
        date: NaiveDate,
        /// Offending cumulative multiplier.
        value: f64,
    },
}

impl From<ExpiryRegression> for IntegrityError {
    fn from(value: ExpiryRegression) -> Self {
        Self::ExpiryRegression(value)
    }
}

impl From<FlatMultiplier> for IntegrityError {
    fn from(value: FlatMultiplier) -> Self {
        Self::FlatMultiplier(value)
    }
}
