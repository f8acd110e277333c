//! Reconciliation configuration.

use serde::{Deserialize, Serialize};

use super::default_true;
use crate::domain::reconciliation::ReconciliationMode;

/// Reconciliation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Run reconciliation after selection.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Strategy.
    #[serde(default)]
    pub mode: ReconciliationMode,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: ReconciliationMode::default(),
        }
    }
}

impl ReconciliationConfig {
    /// Mode to run, if enabled.
    #[must_use]
    pub const fn mode(&self) -> Option<ReconciliationMode> {
        if self.enabled { Some(self.mode) } else { None }
    }
}
