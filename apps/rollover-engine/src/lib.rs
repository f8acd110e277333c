// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::items_after_statements
    )
)]

//! Rollover Engine - Continuous Futures Library
//!
//! Turns daily futures snapshots (every listed expiry of every symbol, one
//! file or table slice per trading day) into continuous per-symbol series,
//! then chains rollover multipliers into ratio-adjusted prices.
//!
//! # Architecture
//!
//! - **Domain**: pure logic, no I/O
//!   - `expiry`: expiry history, trading-day ordinals, trading day of month
//!   - `rollover`: policies, per-label rollover state, the day selector
//!   - `reconciliation`: exception reconciliation, gap filling, change log
//!   - `adjustment`: multiplier table, multiplier computation, ratio adjustment
//!
//! - **Application**: ports (`RecordSource`, `SeriesSink`) and the use cases
//!   that drive a pass through them
//!
//! - **Infrastructure**: in-memory, flat-file and SQLite adapters

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Layers
// =============================================================================

/// Domain layer - Core logic with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters for snapshot sources and output stores.
pub mod infrastructure;

// =============================================================================
// Cross-cutting
// =============================================================================

pub mod config;
pub mod error;
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use application::ports::{RecordSource, SeriesKind, SeriesSink, SinkError, SourceError};
pub use application::use_cases::{PassError, PassOptions, PassReport, RunPassUseCase};
pub use config::{Config, ConfigError, load_config};
pub use domain::record::{DailySnapshot, RawRecord, SnapshotArchive};
pub use domain::rollover::RolloverPolicy;
pub use domain::series::ContinuousSeries;
pub use error::{EngineError, ErrorCode};
