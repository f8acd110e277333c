//! Reconciliation: repair a draft continuous series after selection.
//!
//! Two strategies share the [`ChangeLog`] audit trail:
//!
//! - [`reconcile`] consumes the selector's none-selected exceptions.
//! - [`gap_fill`] works from a persisted series alone, re-admitting raw rows
//!   the series missed.

mod change_log;
mod exceptions;
mod gap_fill;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use change_log::{ChangeAction, ChangeLog, ChangeLogEntry};
pub use exceptions::{ReconciliationOutcome, ReconciliationStats, reconcile};
pub use gap_fill::{GapFillOutcome, GapFillStats, gap_fill};

/// Which reconciliation strategy a pass runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationMode {
    /// Exception-driven next-expiry vote.
    #[default]
    Exceptions,
    /// Nearest-anchor gap filling.
    GapFill,
}

impl fmt::Display for ReconciliationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exceptions => write!(f, "exceptions"),
            Self::GapFill => write!(f, "gap_fill"),
        }
    }
}

impl FromStr for ReconciliationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exceptions" => Ok(Self::Exceptions),
            "gap_fill" | "gap-fill" => Ok(Self::GapFill),
            other => Err(format!("unknown reconciliation mode '{other}'")),
        }
    }
}
