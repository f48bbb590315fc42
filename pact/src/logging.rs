//! Tracing subscriber setup.
//!
//! The subscriber is installed at most once per process. Later calls, or a
//! subscriber already installed by the host application, leave logging as
//! it is.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable overriding the default log level.
pub const LOG_LEVEL_ENV: &str = "PACT_LOG_LEVEL";

const DEFAULT_LOG_LEVEL: &str = "warn";

static INIT: Once = Once::new();

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level filter, used when `RUST_LOG` is not set
    pub log_level: String,
    /// Whether to output JSON format
    pub json_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: std::env::var(LOG_LEVEL_ENV)
                .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string()),
            json_output: false,
        }
    }
}

impl LoggingConfig {
    /// Set the log level filter.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable JSON output.
    #[must_use]
    pub const fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// Install the global tracing subscriber.
///
/// Safe to call any number of times; only the first call has an effect.
pub fn init(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

        let result = if config.json_output {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init()
        };

        if let Err(err) = result {
            tracing::debug!(error = %err, "tracing subscriber already installed");
        }
    });
}
