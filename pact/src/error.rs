//! Message pact error types using thiserror 2.0.
//!
//! Every failure of a verification call surfaces as a [`PactError`]. Errors
//! raised while reading or writing pact files are [`StoreError`]s and are
//! wrapped as [`PactError::Persistence`].

use crate::store::StoreError;
use thiserror::Error;

/// Errors returned by message pact operations.
#[derive(Error, Debug)]
pub enum PactError {
    /// Pact configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Interaction cannot be verified as built
    #[error("Invalid interaction: {0}")]
    InvalidInteraction(String),

    /// A matcher is missing a required attribute or example
    #[error("Invalid matcher: {0}")]
    InvalidMatcher(String),

    /// Reification met a matching rule it does not know how to resolve
    #[error("Unsupported matcher kind: {0}")]
    UnsupportedMatcherKind(String),

    /// Reified content does not fit the requested target type
    #[error("Unable to narrow message content to {target}: {source}")]
    TypeNarrowing {
        /// Name of the requested target type
        target: &'static str,
        /// Underlying decode error
        #[source]
        source: serde_json::Error,
    },

    /// The consumer handler rejected the message
    #[error("Message handler failed: {0}")]
    Handler(#[source] anyhow::Error),

    /// Writing the pact file failed after the handler succeeded
    #[error("Failed to persist pact: {0}")]
    Persistence(#[from] StoreError),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for message pact operations.
pub type PactResult<T> = Result<T, PactError>;

impl PactError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an invalid interaction error.
    #[must_use]
    pub fn invalid_interaction(msg: impl Into<String>) -> Self {
        Self::InvalidInteraction(msg.into())
    }

    /// Create an invalid matcher error.
    #[must_use]
    pub fn invalid_matcher(msg: impl Into<String>) -> Self {
        Self::InvalidMatcher(msg.into())
    }

    /// Create an unsupported matcher kind error.
    #[must_use]
    pub fn unsupported_matcher(kind: impl Into<String>) -> Self {
        Self::UnsupportedMatcherKind(kind.into())
    }

    /// Check if the failure happened while recording the pact file.
    ///
    /// A persistence failure means the handler accepted the message but the
    /// contract was not advanced.
    #[must_use]
    pub const fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}
