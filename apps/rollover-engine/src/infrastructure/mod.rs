//! Infrastructure Layer
//!
//! Adapters for the ports defined in the application layer:
//!
//! - `memory/`: in-memory source and sink (tests, embedding)
//! - `flat_file/`: per-day CSV snapshots in; CSV and JSON artifacts out
//! - `sqlite/`: `tblDump` snapshots in; relational tables out

pub mod flat_file;
pub mod memory;
pub mod sqlite;
