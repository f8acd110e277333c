//! Multiplier engine: rollover ratios and ratio-adjusted series.
//!
//! Multipliers are `f64`; prices stay `Decimal` and are rounded after
//! scaling.

mod apply;
mod engine;
mod integrity;
mod table;

pub use apply::{DEFAULT_PRICE_DECIMALS, apply_adjustment};
pub use engine::{DEFAULT_LOOKBACK_DAYS, MultiplierOutcome, compute_multipliers, lookback_ratio};
pub use integrity::{ExpiryRegression, FlatMultiplier, IntegrityError};
pub use table::{AdjustmentDirection, MultiplierTable};
