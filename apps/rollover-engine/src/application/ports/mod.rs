//! Application Ports (Driven)
//!
//! The core reads raw snapshots through [`RecordSource`] and writes every
//! output through [`SeriesSink`]. Flat-file, relational and in-memory
//! backings are interchangeable.

mod record_source_port;
mod series_sink_port;

pub use record_source_port::{RecordSource, SourceError};
pub use series_sink_port::{SeriesKind, SeriesSink, SinkError};
