//! Domain Layer
//!
//! Pure rollover logic with no I/O. Every stage takes values and returns
//! values, so a pass reads as a pipeline:
//!
//! 1. [`expiry`]: expiry history and trading-day ordinals from raw records.
//! 2. [`rollover`]: day-by-day contract selection into a draft series.
//! 3. [`reconciliation`]: repair of days the selector could not fill.
//! 4. [`adjustment`]: rollover multipliers and ratio-adjusted prices.

pub mod adjustment;
pub mod audit;
pub mod expiry;
pub mod reconciliation;
pub mod record;
pub mod rollover;
pub mod series;
