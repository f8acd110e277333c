//! Everything a pass exports for external review.

use super::adjustment::{ExpiryRegression, FlatMultiplier};
use super::reconciliation::ChangeLogEntry;
use super::rollover::{NextSelected, NoneSelected, RolloverEvent};

/// Audit exports of one pass. Written out by the sink, never read back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditReport {
    /// Exceptions left after reconciliation.
    pub none_selected: Vec<NoneSelected>,
    /// Rollovers that defaulted to a multiplier of 1.
    pub flat_multipliers: Vec<FlatMultiplier>,
    /// Reconciliation decisions.
    pub change_log: Vec<ChangeLogEntry>,
    /// Backwards expiry moves in the final series.
    pub expiry_regressions: Vec<ExpiryRegression>,
    /// Next-contract selections.
    pub next_selected: Vec<NextSelected>,
    /// Rolls decided by the selector.
    pub rollover_events: Vec<RolloverEvent>,
}

impl AuditReport {
    /// Whether there is nothing to export.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.none_selected.is_empty()
            && self.flat_multipliers.is_empty()
            && self.change_log.is_empty()
            && self.expiry_regressions.is_empty()
            && self.next_selected.is_empty()
            && self.rollover_events.is_empty()
    }
}
