//! Tracing Setup
//!
//! Installs a `tracing-subscriber` formatter. `RUST_LOG` wins over the
//! configured level.
//!
//! # Usage
//!
//! ```rust,ignore
//! use rollover_engine::telemetry::init_telemetry;
//!
//! let _guard = init_telemetry(&config.observability.logging);
//! ```

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Marks the subscriber as installed; keep it alive for the whole run.
#[derive(Debug)]
#[must_use]
pub struct TelemetryGuard {
    format: LogFormat,
}

impl TelemetryGuard {
    /// Output format in use.
    pub const fn format(&self) -> LogFormat {
        self.format
    }
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize logging.
///
/// A second call is a no-op (the first subscriber stays installed).
pub fn init_telemetry(config: &LoggingConfig) -> TelemetryGuard {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_target(config.include_target)
        .with_writer(std::io::stderr);

    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    if installed.is_ok() {
        tracing::debug!(level = %config.level, format = ?config.format, "Logging initialized");
    }

    TelemetryGuard {
        format: config.format,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_does_not_panic() {
        let config = LoggingConfig::default();
        let first = init_telemetry(&config);
        let second = init_telemetry(&config);
        assert_eq!(first.format(), second.format());
    }

    #[test]
    fn test_bad_level_falls_back() {
        let config = LoggingConfig {
            level: "not a level [".to_string(),
            ..LoggingConfig::default()
        };
        let _ = env_filter(&config);
    }
}
