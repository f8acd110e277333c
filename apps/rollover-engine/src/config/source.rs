//! Snapshot source configuration.

use serde::{Deserialize, Serialize};

/// Backing store kind, shared by source and persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Directory of CSV files.
    #[default]
    FlatFile,
    /// SQLite database.
    Sqlite,
}

/// Where daily snapshots are read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Store kind.
    #[serde(default)]
    pub kind: StoreKind,
    /// Snapshot directory or database file.
    #[serde(default = "default_source_path")]
    pub path: String,
    /// Instrument type filter for the relational dump (e.g. `FUTCOM`).
    #[serde(default)]
    pub instrument_type: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            path: default_source_path(),
            instrument_type: None,
        }
    }
}

fn default_source_path() -> String {
    "./data/formatted".to_string()
}
