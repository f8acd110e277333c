//! Flat-file backings: per-day CSV snapshots in, CSV/JSON outputs out.

mod sink;
mod source;

pub use sink::FlatFileSeriesSink;
pub use source::FlatFileRecordSource;
