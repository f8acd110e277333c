//! Configuration module for the rollover engine.
//!
//! Loads `config.yaml`, interpolates environment variables and validates
//! the result before a pass is assembled from it.
//!
//! # Usage
//!
//! ```rust,ignore
//! use rollover_engine::config::load_config;
//!
//! let config = load_config(Some("config.yaml"))?;
//! let options = config.pass_options();
//! ```

mod adjustment;
mod observability;
mod persistence;
mod reconciliation;
mod rollover;
mod source;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use adjustment::{AdjustmentConfig, MAX_DECIMALS};
pub use observability::{LogFormat, LoggingConfig, ObservabilityConfig};
pub use persistence::PersistenceConfig;
pub use reconciliation::ReconciliationConfig;
pub use rollover::{PolicyKind, RolloverConfig};
pub use source::{SourceConfig, StoreKind};

use crate::application::use_cases::PassOptions;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Snapshot source.
    #[serde(default)]
    pub source: SourceConfig,
    /// Output store.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Rollover policy.
    #[serde(default)]
    pub rollover: RolloverConfig,
    /// Reconciliation.
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    /// Ratio adjustment.
    #[serde(default)]
    pub adjustment: AdjustmentConfig,
    /// Logging.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Options for a full pass.
    #[must_use]
    pub fn pass_options(&self) -> PassOptions {
        PassOptions {
            policies: self.rollover.policies(),
            symbols: self.rollover.symbols.clone(),
            reconciliation: self.reconciliation.mode(),
            adjustment: self.adjustment.options(),
            reuse_expiry_history: self.persistence.reuse_expiry_history,
        }
    }
}

pub(crate) const fn default_true() -> bool {
    true
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to "config.yaml".
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or("config.yaml");

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is a compile-time constant
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map(|m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.map_or_else(String::new, str::to_string),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    if config.source.path.trim().is_empty() {
        return invalid("source.path must not be empty");
    }
    if config.source.kind == StoreKind::Sqlite
        && config
            .source
            .instrument_type
            .as_deref()
            .is_none_or(|t| t.trim().is_empty())
    {
        return invalid("source.instrument_type is required for a sqlite source");
    }
    if config.persistence.path.trim().is_empty() {
        return invalid("persistence.path must not be empty");
    }

    if config.rollover.policy == PolicyKind::FixedOffset {
        let offsets = &config.rollover.offsets;
        if offsets.is_empty() {
            return invalid("rollover.offsets must not be empty");
        }
        if offsets.iter().collect::<BTreeSet<_>>().len() != offsets.len() {
            return invalid("rollover.offsets must not contain duplicates");
        }
    }

    if config.adjustment.lookback_days == 0 {
        return invalid("adjustment.lookback_days must be positive");
    }
    if config.adjustment.decimals > MAX_DECIMALS {
        return Err(ConfigError::ValidationError(format!(
            "adjustment.decimals must be at most {MAX_DECIMALS}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::adjustment::AdjustmentDirection;
    use crate::domain::reconciliation::ReconciliationMode;
    use crate::domain::rollover::RolloverPolicy;
    use test_case::test_case;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.source.kind, StoreKind::FlatFile);
        assert_eq!(config.rollover.offsets, vec![0]);
        assert!(config.reconciliation.enabled);
        assert_eq!(config.adjustment.lookback_days, 5);
        assert_eq!(config.adjustment.decimals, 2);
        assert_eq!(config.observability.logging.level, "info");
        assert_eq!(config.pass_options(), PassOptions::default());
    }

    #[test]
    fn test_load_empty_config() {
        let config = match load_config_from_string("{}") {
            Ok(c) => c,
            Err(e) => panic!("should load empty config: {e}"),
        };
        assert_eq!(config.persistence.path, "./data/continuous");
        assert!(config.persistence.reuse_expiry_history);
    }

    #[test]
    fn test_env_var_with_default_when_missing() {
        let input = "path: ${ROLLOVER_CONFIG_TEST_NONEXISTENT_VAR:-./data}";
        assert_eq!(interpolate_env_vars(input), "path: ./data");
    }

    #[test]
    fn test_env_var_without_default_becomes_empty() {
        let input = "instrument_type: ${ROLLOVER_CONFIG_TEST_UNLIKELY_TO_EXIST}";
        assert_eq!(interpolate_env_vars(input), "instrument_type: ");
    }

    #[test]
    #[expect(clippy::literal_string_with_formatting_args)] // ${...} is env var syntax
    fn test_env_var_uses_existing() {
        let result = interpolate_env_vars("path: ${PATH:-default}");
        assert_ne!(result, "path: default");
        assert!(result.starts_with("path: "));
    }

    #[test_case("rollover:\n  offsets: []", "offsets must not be empty" ; "empty offsets")]
    #[test_case("rollover:\n  offsets: [1, 1]", "duplicates" ; "duplicate offsets")]
    #[test_case("adjustment:\n  lookback_days: 0", "lookback_days" ; "zero lookback")]
    #[test_case("adjustment:\n  decimals: 9", "decimals" ; "too many decimals")]
    #[test_case("source:\n  kind: sqlite\n  path: dump.db", "instrument_type" ; "sqlite without instrument")]
    fn test_validation_rejects(yaml: &str, needle: &str) {
        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected validation error");
        };
        assert!(err.to_string().contains(needle), "{err}");
    }

    #[test]
    fn test_crossover_ignores_offsets() {
        let config = load_config_from_string("rollover:\n  policy: volume\n  offsets: []").unwrap();
        assert_eq!(config.rollover.policies(), vec![RolloverPolicy::VolumeCrossover]);
    }

    #[test]
    fn test_full_config_parse() {
        let yaml = r"
source:
  kind: sqlite
  path: ./data/dump.db
  instrument_type: FUTCOM
persistence:
  kind: sqlite
  path: ./data/continuous.db
  reuse_expiry_history: false
rollover:
  policy: fixed_offset
  offsets: [0, 1, 2]
  symbols: [GOLDM, SILVERM]
reconciliation:
  enabled: true
  mode: gap_fill
adjustment:
  enabled: false
  direction: next_day
  lookback_days: 3
  decimals: 4
observability:
  logging:
    level: debug
    format: json
";

        let config = match load_config_from_string(yaml) {
            Ok(c) => c,
            Err(e) => panic!("should load full config: {e}"),
        };

        assert_eq!(config.source.instrument_type.as_deref(), Some("FUTCOM"));
        assert_eq!(config.persistence.kind, StoreKind::Sqlite);
        assert_eq!(config.adjustment.direction, AdjustmentDirection::NextDay);
        assert_eq!(config.observability.logging.format, LogFormat::Json);

        let options = config.pass_options();
        assert_eq!(
            options.policies,
            vec![
                RolloverPolicy::FixedOffset { delta: 0 },
                RolloverPolicy::FixedOffset { delta: 1 },
                RolloverPolicy::FixedOffset { delta: 2 },
            ]
        );
        assert_eq!(options.symbols, vec!["GOLDM", "SILVERM"]);
        assert_eq!(options.reconciliation, Some(ReconciliationMode::GapFill));
        assert_eq!(options.adjustment, None);
        assert!(!options.reuse_expiry_history);
    }
}
