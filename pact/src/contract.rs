//! Pact contract types.

use crate::message::MessageInteraction;
use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Pact specification version written by this library.
pub const PACT_SPECIFICATION_VERSION: &str = "4.0";

const LIBRARY_METADATA_KEY: &str = "messagePact";

/// A Pact contract between consumer and provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contract {
    /// Consumer participant
    pub consumer: Participant,
    /// Provider participant
    pub provider: Participant,
    /// Recorded interactions in file order: verified messages in matcher
    /// form, plus interactions of other kinds kept as found
    #[serde(default)]
    pub interactions: Vec<StoredInteraction>,
    /// Contract metadata
    #[serde(default)]
    pub metadata: ContractMetadata,
}

impl Contract {
    /// Create an empty contract for a consumer/provider pair.
    #[must_use]
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            consumer: Participant::new(consumer),
            provider: Participant::new(provider),
            interactions: Vec::new(),
            metadata: ContractMetadata::default(),
        }
    }

    /// Check whether a structurally equal message interaction is already recorded.
    #[must_use]
    pub fn contains(&self, interaction: &MessageInteraction) -> bool {
        self.messages()
            .any(|existing| existing.same_interaction(interaction))
    }

    /// The message interactions, in file order.
    pub fn messages(&self) -> impl Iterator<Item = &MessageInteraction> {
        self.interactions.iter().filter_map(StoredInteraction::as_message)
    }

    /// Append an interaction unless an equal one is present.
    ///
    /// Returns `true` if the interaction was added.
    pub fn add_interaction(&mut self, interaction: MessageInteraction) -> bool {
        if self.contains(&interaction) {
            return false;
        }
        self.interactions.push(StoredInteraction::Message(interaction));
        true
    }

    /// Merge another contract for the same pair into this one.
    ///
    /// Interactions already present are left untouched; new ones are appended
    /// in order. Returns the number of interactions added.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Incompatible`] if the participants or the pact
    /// specification versions differ.
    pub fn merge(&mut self, other: &Self) -> Result<usize, StoreError> {
        if self.consumer != other.consumer || self.provider != other.provider {
            return Err(StoreError::Incompatible(format!(
                "cannot merge pact for {} -> {} into pact for {} -> {}",
                other.consumer.name, other.provider.name, self.consumer.name, self.provider.name
            )));
        }
        let ours = &self.metadata.pact_specification.version;
        let theirs = &other.metadata.pact_specification.version;
        if ours != theirs {
            return Err(StoreError::Incompatible(format!(
                "cannot merge pact specification {theirs} into existing pact specification {ours}"
            )));
        }

        let mut added = 0;
        for interaction in &other.interactions {
            let is_new = match interaction {
                StoredInteraction::Message(message) => self.add_interaction(message.clone()),
                StoredInteraction::Other(_) if self.interactions.contains(interaction) => false,
                StoredInteraction::Other(_) => {
                    self.interactions.push(interaction.clone());
                    true
                }
            };
            if is_new {
                added += 1;
            }
        }
        self.metadata.extra.extend(
            other
                .metadata
                .extra
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        Ok(added)
    }
}

/// One entry of a pact file's `interactions` array.
///
/// Entries that are not asynchronous messages (HTTP or synchronous message
/// interactions written by other tools) are carried as raw JSON and written
/// back unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum StoredInteraction {
    /// Asynchronous message interaction
    Message(MessageInteraction),
    /// Any other interaction, kept verbatim
    Other(Value),
}

impl StoredInteraction {
    /// The message interaction, if this entry is one.
    #[must_use]
    pub const fn as_message(&self) -> Option<&MessageInteraction> {
        match self {
            Self::Message(message) => Some(message),
            Self::Other(_) => None,
        }
    }

    /// Description of the entry, if it has one.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Message(message) => Some(&message.description),
            Self::Other(value) => value.get("description").and_then(Value::as_str),
        }
    }

    /// Structural equality used for de-duplication.
    #[must_use]
    pub fn same_interaction(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Message(a), Self::Message(b)) => a.same_interaction(b),
            (a, b) => a == b,
        }
    }
}

impl From<MessageInteraction> for StoredInteraction {
    fn from(interaction: MessageInteraction) -> Self {
        Self::Message(interaction)
    }
}

/// A participant in a contract (consumer or provider).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    /// Participant name
    pub name: String,
}

impl Participant {
    /// Create a new participant.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Contract metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContractMetadata {
    /// Pact specification version
    #[serde(rename = "pactSpecification")]
    pub pact_specification: PactSpecification,
    /// Other metadata entries, such as the writing library's version
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Pact specification version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PactSpecification {
    /// Version string
    pub version: String,
}

impl Default for ContractMetadata {
    fn default() -> Self {
        Self {
            pact_specification: PactSpecification {
                version: PACT_SPECIFICATION_VERSION.to_string(),
            },
            extra: BTreeMap::from([(
                LIBRARY_METADATA_KEY.to_string(),
                json!({ "version": env!("CARGO_PKG_VERSION") }),
            )]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::{MatcherNode, like};
    use crate::message::{MessageContents, ProviderState};

    fn order_created() -> MessageInteraction {
        let mut interaction = MessageInteraction::new("an order created event");
        interaction.provider_states.push(ProviderState::new("an order exists"));
        interaction.contents = MessageContents::Json {
            content_type: "application/json".to_string(),
            body: MatcherNode::from_json(json!({"orderId": like("abc123")})).unwrap(),
        };
        interaction
    }

    #[test]
    fn test_contract_serialization() {
        let mut contract = Contract::new("order-consumer", "order-service");
        contract.add_interaction(order_created());

        let json = serde_json::to_string(&contract).unwrap();
        let restored: Contract = serde_json::from_str(&json).unwrap();
        assert_eq!(contract, restored);
    }

    #[test]
    fn test_wire_layout() {
        let mut contract = Contract::new("order-consumer", "order-service");
        contract.add_interaction(order_created());

        let wire = serde_json::to_value(&contract).unwrap();
        assert_eq!(wire["consumer"]["name"], "order-consumer");
        assert_eq!(wire["provider"]["name"], "order-service");
        assert_eq!(wire["metadata"]["pactSpecification"]["version"], "4.0");
        assert_eq!(wire["interactions"][0]["type"], "Asynchronous/Messages");
        assert_eq!(
            wire["interactions"][0]["contents"]["content"]["orderId"]["pact:matcher:type"],
            "type"
        );
    }

    #[test]
    fn test_add_interaction_deduplicates() {
        let mut contract = Contract::new("c", "p");
        assert!(contract.add_interaction(order_created()));
        assert!(!contract.add_interaction(order_created()));
        assert_eq!(contract.interactions.len(), 1);
    }

    #[test]
    fn test_merge_appends_new_interactions() {
        let mut existing = Contract::new("c", "p");
        existing.add_interaction(order_created());

        let mut incoming = Contract::new("c", "p");
        incoming.add_interaction(order_created());
        incoming.add_interaction(MessageInteraction::new("an order cancelled event"));

        let added = existing.merge(&incoming).unwrap();
        assert_eq!(added, 1);
        assert_eq!(existing.interactions.len(), 2);
        assert_eq!(
            existing.interactions[1].description(),
            Some("an order cancelled event")
        );
    }

    #[test]
    fn test_merge_keeps_foreign_metadata() {
        let mut existing = Contract::new("c", "p");
        existing
            .metadata
            .extra
            .insert("pactJs".to_string(), json!({"version": "12.0.0"}));

        existing.merge(&Contract::new("c", "p")).unwrap();
        assert!(existing.metadata.extra.contains_key("pactJs"));
        assert!(existing.metadata.extra.contains_key(LIBRARY_METADATA_KEY));
    }

    #[test]
    fn test_merge_rejects_other_pair() {
        let mut existing = Contract::new("c", "p");
        let err = existing.merge(&Contract::new("c", "other")).unwrap_err();
        assert!(matches!(err, StoreError::Incompatible(_)));
    }

    #[test]
    fn test_merge_rejects_other_specification() {
        let mut existing = Contract::new("c", "p");
        existing.metadata.pact_specification.version = "3.0.0".to_string();
        let err = existing.merge(&Contract::new("c", "p")).unwrap_err();
        assert!(err.to_string().contains("3.0.0"));
    }

    #[test]
    fn test_other_interaction_kinds_are_kept() {
        let http = json!({
            "type": "Synchronous/HTTP",
            "description": "get an order",
            "request": {"method": "GET", "path": "/orders/1"},
            "response": {"status": 200}
        });
        let mut existing: Contract = serde_json::from_value(json!({
            "consumer": {"name": "c"},
            "provider": {"name": "p"},
            "interactions": [http.clone()],
            "metadata": {"pactSpecification": {"version": "4.0"}}
        }))
        .unwrap();
        assert_eq!(existing.interactions[0], StoredInteraction::Other(http.clone()));

        let mut incoming = Contract::new("c", "p");
        incoming.add_interaction(order_created());
        assert_eq!(existing.merge(&incoming).unwrap(), 1);
        assert_eq!(existing.merge(&existing.clone()).unwrap(), 0);

        assert_eq!(existing.interactions.len(), 2);
        assert_eq!(existing.messages().count(), 1);
        assert_eq!(existing.interactions[0].description(), Some("get an order"));
        let wire = serde_json::to_value(&existing).unwrap();
        assert_eq!(wire["interactions"][0], http);
    }
}
