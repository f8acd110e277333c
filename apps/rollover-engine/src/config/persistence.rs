//! Output persistence configuration.

use serde::{Deserialize, Serialize};

use super::default_true;
use super::source::StoreKind;

/// Where series and artifacts are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Store kind.
    #[serde(default)]
    pub kind: StoreKind,
    /// Output directory or database file.
    #[serde(default = "default_output_path")]
    pub path: String,
    /// Reuse a stored expiry history unless newer data exists.
    #[serde(default = "default_true")]
    pub reuse_expiry_history: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            path: default_output_path(),
            reuse_expiry_history: true,
        }
    }
}

fn default_output_path() -> String {
    "./data/continuous".to_string()
}
