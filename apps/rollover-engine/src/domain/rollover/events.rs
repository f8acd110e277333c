//! Audit events produced while selecting: unselected days, next-contract
//! selections and rollovers.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Why an exception could not be repaired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// No current expiry was known for the label on that day.
    NoAnchor,
    /// The current expiry is the last one known; nothing to roll to.
    LastExpiry,
    /// The day falls outside the reconciliation window of its group.
    OutsideWindow,
    /// The next contract did not trade on at least as many window days as
    /// the current one.
    InsufficientCoverage,
    /// The group was admitted but the next contract has no record that day.
    NoReplacement,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoAnchor => "no_anchor",
            Self::LastExpiry => "last_expiry",
            Self::OutsideWindow => "outside_window",
            Self::InsufficientCoverage => "insufficient_coverage",
            Self::NoReplacement => "no_replacement",
        };
        f.write_str(text)
    }
}

/// Lifecycle of a none-selected exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionStatus {
    /// Raised by the selector, not yet examined by reconciliation.
    #[default]
    Open,
    /// Examined and left unrepaired.
    Unresolved(UnresolvedReason),
}

impl fmt::Display for ExceptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Unresolved(reason) => write!(f, "unresolved:{reason}"),
        }
    }
}

/// A (label, date) on which the selector could not emit a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoneSelected {
    /// Output label.
    pub label: String,
    /// Underlying symbol.
    pub symbol: String,
    /// Trading date.
    pub date: NaiveDate,
    /// Expiry the label was following, if any.
    pub implied_current_expiry: Option<NaiveDate>,
    /// Expiries the symbol actually traded that day.
    pub available_expiries: Vec<NaiveDate>,
    /// Where the exception stands.
    pub status: ExceptionStatus,
}

impl NoneSelected {
    /// Whether reconciliation already gave up on the day because the next
    /// contract had no record.
    #[must_use]
    pub fn lacks_replacement(&self) -> bool {
        self.status == ExceptionStatus::Unresolved(UnresolvedReason::NoReplacement)
    }

    /// Copy with a new status.
    #[must_use]
    pub fn with_status(mut self, status: ExceptionStatus) -> Self {
        self.status = status;
        self
    }
}

/// Exceptions keyed by (label, date).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionSet {
    entries: BTreeMap<(String, NaiveDate), NoneSelected>,
}

/// Exceptions grouped by (label, implied current expiry), members in date
/// order.
pub type ExceptionGroups = BTreeMap<(String, Option<NaiveDate>), Vec<NoneSelected>>;

impl ExceptionSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the exception for its (label, date).
    pub fn insert(&mut self, exception: NoneSelected) {
        self.entries
            .insert((exception.label.clone(), exception.date), exception);
    }

    /// Remove the exception for (label, date).
    pub fn remove(&mut self, label: &str, date: NaiveDate) -> Option<NoneSelected> {
        self.entries.remove(&(label.to_string(), date))
    }

    /// Exception for (label, date).
    #[must_use]
    pub fn get(&self, label: &str, date: NaiveDate) -> Option<&NoneSelected> {
        self.entries.get(&(label.to_string(), date))
    }

    /// Number of exceptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exceptions ordered by (label, date).
    pub fn iter(&self) -> impl Iterator<Item = &NoneSelected> {
        self.entries.values()
    }

    /// Consume the set into reconciliation groups.
    #[must_use]
    pub fn into_groups(self) -> ExceptionGroups {
        let mut groups = ExceptionGroups::new();
        for exception in self.entries.into_values() {
            groups
                .entry((exception.label.clone(), exception.implied_current_expiry))
                .or_default()
                .push(exception);
        }
        groups
    }
}

impl Extend<NoneSelected> for ExceptionSet {
    fn extend<T: IntoIterator<Item = NoneSelected>>(&mut self, iter: T) {
        for exception in iter {
            self.insert(exception);
        }
    }
}

impl FromIterator<NoneSelected> for ExceptionSet {
    fn from_iter<T: IntoIterator<Item = NoneSelected>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

/// The selector emitted the next contract because the current one had no
/// record that day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextSelected {
    /// Output label.
    pub label: String,
    /// Trading date.
    pub date: NaiveDate,
    /// Expiry that was expected.
    pub current_expiry: NaiveDate,
    /// Expiry emitted instead.
    pub selected_expiry: NaiveDate,
}

/// A label moved to a new contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloverEvent {
    /// Output label.
    pub label: String,
    /// Date the roll was decided. A crossover takes effect the next trading day.
    pub date: NaiveDate,
    /// Expiry rolled away from; empty for the first selection.
    pub from_expiry: Option<NaiveDate>,
    /// Expiry rolled to.
    pub to_expiry: NaiveDate,
    /// Next-to-current metric ratio that triggered a crossover roll.
    pub observed_ratio: Option<f64>,
}
