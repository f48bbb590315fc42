//! Message pact verification.
//!
//! A verification call walks one interaction through
//! `validate -> reify -> narrow -> handle -> persist`. Any failing step ends
//! the call; the contract only advances when the pact file was written.

use crate::config::PactConfig;
use crate::contract::Contract;
use crate::error::{PactError, PactResult};
use crate::logging;
use crate::message::{Message, MessageInteraction, ReifiedMessage};
use crate::reify::reify_message;
use crate::store::ContractStore;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// Consumer code under test: receives a reified message and accepts or rejects it.
pub trait MessageHandler<T> {
    /// Handle the message; an error fails the verification.
    ///
    /// # Errors
    ///
    /// Any error the consumer raises while processing the message.
    fn handle(&mut self, message: ReifiedMessage<T>) -> anyhow::Result<()>;
}

impl<T, F> MessageHandler<T> for F
where
    F: FnMut(ReifiedMessage<T>) -> anyhow::Result<()>,
{
    fn handle(&mut self, message: ReifiedMessage<T>) -> anyhow::Result<()> {
        self(message)
    }
}

/// Message pact for one consumer/provider pair.
///
/// Cheap to clone; clones share the same contract.
#[derive(Debug, Clone)]
pub struct MessagePact {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: PactConfig,
    store: ContractStore,
    contract: Mutex<Contract>,
}

impl MessagePact {
    /// Create a message pact.
    ///
    /// Initialises logging the first time it is called in a process.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::InvalidConfig`] if the configuration is unusable.
    pub fn new(config: PactConfig) -> PactResult<Self> {
        config.validate()?;
        logging::init(&config.logging);
        tracing::debug!(
            consumer = %config.consumer,
            provider = %config.provider,
            pact_dir = %config.pact_dir.display(),
            "message pact created"
        );

        let store = ContractStore::new(config.pact_dir.clone());
        let contract = Contract::new(config.consumer.clone(), config.provider.clone());
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                store,
                contract: Mutex::new(contract),
            }),
        })
    }

    /// The configuration this pact was created with.
    #[must_use]
    pub fn config(&self) -> &PactConfig {
        &self.inner.config
    }

    /// Create a new asynchronous message expectation.
    #[deprecated(note = "use `add_asynchronous_message` instead")]
    #[must_use]
    pub fn add_message(&self) -> Message {
        self.add_asynchronous_message()
    }

    /// Create a new asynchronous message expectation.
    #[must_use]
    pub fn add_asynchronous_message(&self) -> Message {
        tracing::debug!("add message");
        Message::new(self.clone())
    }

    /// Verify a message against a consumer handler.
    ///
    /// # Errors
    ///
    /// See [`MessagePact::verify_with`].
    pub fn verify<T, F>(&self, message: &Message<T>, mut handler: F) -> PactResult<()>
    where
        T: DeserializeOwned,
        F: FnMut(ReifiedMessage<T>) -> anyhow::Result<()>,
    {
        self.verify_with(message, &mut handler)
    }

    /// Verify a message against a [`MessageHandler`].
    ///
    /// On success the interaction, in matcher form, is recorded in the pact
    /// file for this pair.
    ///
    /// # Errors
    ///
    /// - [`PactError::InvalidInteraction`] if the description is blank or the
    ///   content could not be read; the handler is not called.
    /// - [`PactError::UnsupportedMatcherKind`] / [`PactError::InvalidMatcher`]
    ///   if the content cannot be reified.
    /// - [`PactError::TypeNarrowing`] if the content does not fit `T`.
    /// - [`PactError::Handler`] if the handler rejects the message; nothing
    ///   is written.
    /// - [`PactError::Persistence`] if the pact file cannot be written.
    pub fn verify_with<T: DeserializeOwned>(
        &self,
        message: &Message<T>,
        handler: &mut dyn MessageHandler<T>,
    ) -> PactResult<()> {
        let interaction = message.interaction();
        if interaction.description.trim().is_empty() {
            return Err(PactError::invalid_interaction(
                "description is required, call expects_to_receive",
            ));
        }
        if let Some(err) = message.content_error() {
            return Err(PactError::invalid_interaction(format!(
                "message content is invalid: {err}"
            )));
        }
        tracing::debug!(description = %interaction.description, "verify message");

        let reified = reify_message(interaction)?;
        tracing::debug!(contents = %reified.contents, "reified message");

        let narrowed = reified.narrow::<T>()?;
        handler.handle(narrowed).map_err(PactError::Handler)?;
        tracing::debug!(description = %interaction.description, "message handler succeeded");

        self.record(interaction.clone())
    }

    /// Append an interaction and persist it; the contract is untouched if the write fails.
    fn record(&self, interaction: MessageInteraction) -> PactResult<()> {
        let mut contract = self
            .inner
            .contract
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut candidate = contract.clone();
        candidate.add_interaction(interaction);
        self.inner.store.write(&candidate, false)?;
        *contract = candidate;
        Ok(())
    }

    /// Write the interactions verified so far to the pact file.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::Persistence`] if the pact file cannot be written.
    pub fn write_pact_file(&self, overwrite: bool) -> PactResult<PathBuf> {
        let contract = self
            .inner
            .contract
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(self.inner.store.write(&contract, overwrite)?)
    }

    /// Snapshot of the interactions verified by this pact.
    #[must_use]
    pub fn contract(&self) -> Contract {
        self.inner
            .contract
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Path of the pact file for this pair.
    #[must_use]
    pub fn pact_file_path(&self) -> PathBuf {
        let config = &self.inner.config;
        self.inner.store.path_for(&config.consumer, &config.provider)
    }
}
