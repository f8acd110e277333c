//! Audit trail of reconciliation mutations.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Kind of change made to a series day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeAction {
    /// No drafted record; a replacement was inserted.
    Added,
    /// A different drafted record was swapped for the replacement.
    Replaced,
    /// The drafted record was removed and nothing replaced it.
    Dropped,
    /// Neither a drafted record nor a replacement exists.
    #[serde(rename = "None Selected")]
    NoneSelected,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "Added"),
            Self::Replaced => write!(f, "Replaced"),
            Self::Dropped => write!(f, "Dropped"),
            Self::NoneSelected => write!(f, "None Selected"),
        }
    }
}

/// One reconciliation decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    /// Trading date.
    pub date: NaiveDate,
    /// Output label.
    pub label: String,
    /// Expiry of the drafted record, or the expiry the label was following.
    pub old_expiry: Option<NaiveDate>,
    /// Expiry reconciliation moved to.
    pub new_expiry: NaiveDate,
    /// What happened.
    pub action: ChangeAction,
}

/// Ordered change log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeLog {
    entries: Vec<ChangeLogEntry>,
}

impl ChangeLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn record(
        &mut self,
        date: NaiveDate,
        label: &str,
        old_expiry: Option<NaiveDate>,
        new_expiry: NaiveDate,
        action: ChangeAction,
    ) {
        self.entries.push(ChangeLogEntry {
            date,
            label: label.to_string(),
            old_expiry,
            new_expiry,
            action,
        });
    }

    /// Entries in the order recorded.
    #[must_use]
    pub fn entries(&self) -> &[ChangeLogEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries with a given action.
    #[must_use]
    pub fn count(&self, action: ChangeAction) -> usize {
        self.entries.iter().filter(|e| e.action == action).count()
    }

    /// Entries that changed the series (everything but `NoneSelected`).
    #[must_use]
    pub fn mutations(&self) -> usize {
        self.entries.len() - self.count(ChangeAction::NoneSelected)
    }

    /// Append another log.
    pub fn append(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }

    /// Consume into entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<ChangeLogEntry> {
        self.entries
    }
}
