//! Message pact configuration.

use crate::error::{PactError, PactResult};
use crate::logging::LoggingConfig;
use std::path::PathBuf;

/// Environment variable overriding the default pact directory.
pub const PACT_DIR_ENV: &str = "PACT_DIR";

/// Configuration of one consumer/provider message pact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PactConfig {
    /// Name of the consuming application
    pub consumer: String,
    /// Name of the producing application
    pub provider: String,
    /// Directory pact files are written to
    pub pact_dir: PathBuf,
    /// Logging setup applied when the pact is created
    pub logging: LoggingConfig,
}

impl PactConfig {
    /// Create a configuration for a consumer/provider pair.
    ///
    /// The pact directory defaults to `$PACT_DIR`, or `pacts` under the
    /// current directory.
    #[must_use]
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            consumer: consumer.into(),
            provider: provider.into(),
            pact_dir: default_pact_dir(),
            logging: LoggingConfig::default(),
        }
    }

    /// Set the pact directory.
    #[must_use]
    pub fn with_pact_dir(mut self, pact_dir: impl Into<PathBuf>) -> Self {
        self.pact_dir = pact_dir.into();
        self
    }

    /// Set the log level filter.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.logging = self.logging.with_log_level(level);
        self
    }

    /// Emit logs as JSON.
    #[must_use]
    pub fn with_json_logs(mut self) -> Self {
        self.logging = self.logging.with_json_output();
        self
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::InvalidConfig`] if a participant name is blank.
    pub fn validate(&self) -> PactResult<()> {
        if self.consumer.trim().is_empty() {
            return Err(PactError::invalid_config("consumer name is required"));
        }
        if self.provider.trim().is_empty() {
            return Err(PactError::invalid_config("provider name is required"));
        }
        Ok(())
    }
}

fn default_pact_dir() -> PathBuf {
    std::env::var_os(PACT_DIR_ENV)
        .filter(|dir| !dir.is_empty())
        .map_or_else(
            || std::env::current_dir().unwrap_or_default().join("pacts"),
            PathBuf::from,
        )
}
