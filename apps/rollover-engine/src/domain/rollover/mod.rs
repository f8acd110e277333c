//! Rollover selection: which contract a continuous series follows each day.
//!
//! # Policies
//!
//! - [`RolloverPolicy::FixedOffset`]: roll a fixed number of trading days
//!   before expiry, measured with [`TradingDayIndex`](crate::domain::expiry::TradingDayIndex).
//! - [`RolloverPolicy::VolumeCrossover`] / [`RolloverPolicy::OpenInterestCrossover`]:
//!   roll the trading day after the next contract overtakes the current one.
//!
//! Days where no record can be selected become [`NoneSelected`] exceptions,
//! carrying the expiry the label was following, for reconciliation.

mod events;
mod policy;
mod rules;
mod selector;
mod state;
mod windowed;

pub use events::{
    ExceptionGroups, ExceptionSet, ExceptionStatus, NextSelected, NoneSelected, RolloverEvent,
    UnresolvedReason,
};
pub use policy::{CrossoverMetric, RolloverPolicy, roman, series_label};
pub use rules::{CrossoverRule, FixedOffsetRule, Roll, RolloverRule, RuleOutcome, SymbolDay};
pub use selector::{DaySelection, DraftSeries, RolloverSelector, SelectionStats};
pub use state::{RolloverBook, RolloverState};
pub use windowed::build_windowed_series;
