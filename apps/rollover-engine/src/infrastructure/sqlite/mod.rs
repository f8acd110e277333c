//! SQLite adapters: the `tblDump` snapshot source and a relational sink.

mod schema;
mod sink;
mod source;

pub use sink::SqliteSeriesSink;
pub use source::SqliteRecordSource;
