//! Per-label rollover state.

use std::collections::BTreeMap;

use chrono::NaiveDate;

/// What a label is currently following.
///
/// `current_expiry` only ever moves forward. `rollover_pending` is set by a
/// crossover observed on one day and consumed on the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolloverState {
    /// Expiry currently selected.
    pub current_expiry: Option<NaiveDate>,
    /// Expiry selected before the last roll.
    pub previous_expiry: Option<NaiveDate>,
    /// A crossover was observed and the roll takes effect on the next day.
    pub rollover_pending: bool,
}

impl RolloverState {
    /// Move to `expiry`, returning the expiry rolled away from.
    ///
    /// Rolling backwards, or to the expiry already held, leaves the state
    /// untouched and returns `None`.
    pub fn roll_to(&mut self, expiry: NaiveDate) -> Option<Option<NaiveDate>> {
        if self.current_expiry.is_some_and(|current| expiry <= current) {
            return None;
        }
        let from = self.current_expiry;
        self.previous_expiry = from;
        self.current_expiry = Some(expiry);
        Some(from)
    }
}

/// Rollover state for every label driven by one policy.
#[derive(Debug, Clone, Default)]
pub struct RolloverBook {
    states: BTreeMap<String, RolloverState>,
}

impl RolloverBook {
    /// Create an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State for a label, created on first use.
    pub fn state_mut(&mut self, label: &str) -> &mut RolloverState {
        self.states.entry(label.to_string()).or_default()
    }

    /// State for a label, if it has been seen.
    #[must_use]
    pub fn state(&self, label: &str) -> Option<&RolloverState> {
        self.states.get(label)
    }

    /// Labels tracked, sorted.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }
}
