//! Ratio adjustment configuration.

use serde::{Deserialize, Serialize};

use super::default_true;
use crate::application::use_cases::AdjustmentOptions;
use crate::domain::adjustment::{AdjustmentDirection, DEFAULT_LOOKBACK_DAYS, DEFAULT_PRICE_DECIMALS};

/// Largest accepted number of decimal places for adjusted prices.
pub const MAX_DECIMALS: u32 = 8;

/// Ratio adjustment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentConfig {
    /// Produce ratio-adjusted series.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// When a multiplier starts to apply.
    #[serde(default)]
    pub direction: AdjustmentDirection,
    /// Prior snapshots searched for a rollover ratio.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: usize,
    /// Decimal places of adjusted prices.
    #[serde(default = "default_decimals")]
    pub decimals: u32,
}

impl Default for AdjustmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            direction: AdjustmentDirection::default(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            decimals: DEFAULT_PRICE_DECIMALS,
        }
    }
}

impl AdjustmentConfig {
    /// Options for the pass, if enabled.
    #[must_use]
    pub const fn options(&self) -> Option<AdjustmentOptions> {
        if self.enabled {
            Some(AdjustmentOptions {
                direction: self.direction,
                lookback_days: self.lookback_days,
                decimals: self.decimals,
            })
        } else {
            None
        }
    }
}

const fn default_lookback_days() -> usize {
    DEFAULT_LOOKBACK_DAYS
}

const fn default_decimals() -> u32 {
    DEFAULT_PRICE_DECIMALS
}
