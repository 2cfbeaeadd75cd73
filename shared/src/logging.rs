//! Logging setup for resfs
//!
//! File managers log through `tracing`. Binaries call [`init_logging`] once
//! to install a `tracing-subscriber` fmt subscriber; `RUST_LOG` takes
//! precedence over the configured level.

use std::sync::Once;

use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Level names accepted in the configuration
pub const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

static INIT: Once = Once::new();

/// Output format of log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Level and message only
    #[default]
    Compact,
    /// Adds targets, thread ids and source locations
    Full,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of [`VALID_LOG_LEVELS`]
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl LoggingConfig {
    /// Configuration with `debug` forced on
    pub fn debug(format: LogFormat) -> Self {
        Self {
            level: "debug".to_string(),
            format,
        }
    }

    /// Filter built from `RUST_LOG`, falling back to the configured level
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = config.env_filter();
        let result = match config.format {
            LogFormat::Compact => tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .with(filter)
                .try_init(),
            LogFormat::Full => tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true)
                        .with_writer(std::io::stderr),
                )
                .with(filter)
                .try_init(),
        };

        if let Err(e) = result {
            eprintln!("resfs: logging already configured: {e}");
        }
    });
}

/// Check if logging has been initialized
pub fn is_logging_initialized() -> bool {
    INIT.is_completed()
}
