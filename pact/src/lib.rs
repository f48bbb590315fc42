//! Consumer-driven contract testing for asynchronous messages.
//!
//! A consumer describes the messages it expects from a provider, using
//! matchers where only the shape matters. Each expectation is turned into a
//! concrete example, handed to the consumer's handler, and on success
//! recorded in a pact file shared by every test of the same
//! consumer/provider pair.
//!
//! ```no_run
//! use message_pact::{MessagePact, PactConfig, ReifiedMessage};
//! use message_pact::matchers::{each_like, like};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), message_pact::PactError> {
//! let pact = MessagePact::new(PactConfig::new("billing", "orders"))?;
//! let message = pact
//!     .add_asynchronous_message()
//!     .given("an order exists")
//!     .expects_to_receive("an order created event")
//!     .with_json_content(json!({
//!         "id": like(27),
//!         "skus": each_like(like("A-1"), 1),
//!     }));
//!
//! pact.verify(&message, |event: ReifiedMessage| {
//!     assert_eq!(event.contents["id"], 27);
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod contract;
pub mod error;
pub mod logging;
pub mod matchers;
pub mod message;
pub mod pact;
pub mod reify;
pub mod store;

pub use config::PactConfig;
pub use contract::{
    Contract, ContractMetadata, PactSpecification, Participant, StoredInteraction,
};
pub use error::{PactError, PactResult};
pub use matchers::{Generator, Matched, MatcherNode, MatchingRule, TimestampTag};
pub use message::{
    InteractionType, Message, MessageContents, MessageInteraction, ProviderState, ReifiedMessage,
};
pub use pact::{MessageHandler, MessagePact};
pub use store::{ContractStore, StoreError};
