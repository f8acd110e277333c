//! Rollover policy configuration.

use serde::{Deserialize, Serialize};

use crate::domain::rollover::RolloverPolicy;

/// Policy family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Roll a fixed number of trading days before expiry.
    #[default]
    FixedOffset,
    /// Roll when the next contract out-trades the current one.
    Volume,
    /// Roll when the next contract's open interest is higher.
    OpenInterest,
}

/// Rollover settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloverConfig {
    /// Policy family.
    #[serde(default)]
    pub policy: PolicyKind,
    /// Trading-day offsets, one series variant each (fixed offset only).
    #[serde(default = "default_offsets")]
    pub offsets: Vec<u32>,
    /// Symbols to process; empty means all.
    #[serde(default)]
    pub symbols: Vec<String>,
}

impl Default for RolloverConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::default(),
            offsets: default_offsets(),
            symbols: Vec::new(),
        }
    }
}

impl RolloverConfig {
    /// Policy variants to run in one pass.
    #[must_use]
    pub fn policies(&self) -> Vec<RolloverPolicy> {
        match self.policy {
            PolicyKind::FixedOffset => self
                .offsets
                .iter()
                .map(|&delta| RolloverPolicy::FixedOffset { delta })
                .collect(),
            PolicyKind::Volume => vec![RolloverPolicy::VolumeCrossover],
            PolicyKind::OpenInterest => vec![RolloverPolicy::OpenInterestCrossover],
        }
    }
}

fn default_offsets() -> Vec<u32> {
    vec![0]
}
