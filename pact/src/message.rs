//! Message interaction model and builder.

use crate::error::{PactError, PactResult};
use crate::matchers::MatcherNode;
use crate::pact::{MessageHandler, MessagePact};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Content type assumed for JSON content.
pub const JSON_CONTENT_TYPE: &str = "application/json";
const BINARY_CONTENT_TYPE: &str = "application/octet-stream";
const BASE64_ENCODING: &str = "base64";

/// A precondition the provider must establish before producing the message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderState {
    /// State name
    pub name: String,
    /// State parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Value>,
}

impl ProviderState {
    /// Create a provider state without parameters.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    /// Create a provider state with parameters.
    #[must_use]
    pub fn with_params<K, I>(name: impl Into<String>, params: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self {
            name: name.into(),
            params: params.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl From<&str> for ProviderState {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ProviderState {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Message payload as recorded in the contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawContents", into = "RawContents")]
pub enum MessageContents {
    /// No content was set
    #[default]
    Empty,
    /// Structured content that may carry matchers
    Json {
        /// Content type, a JSON media type
        content_type: String,
        /// Content tree in matcher form
        body: MatcherNode,
    },
    /// Opaque payload
    Bytes {
        /// Content type of the payload
        content_type: String,
        /// Raw bytes
        data: Vec<u8>,
    },
}

impl MessageContents {
    /// True when no content was set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Content type of the payload, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::Json { content_type, .. } | Self::Bytes { content_type, .. } => {
                Some(content_type)
            }
        }
    }
}

/// Wire form of [`MessageContents`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContents {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(default)]
    encoded: Encoded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum Encoded {
    Flag(bool),
    Scheme(String),
}

impl Default for Encoded {
    fn default() -> Self {
        Self::Flag(false)
    }
}

impl TryFrom<RawContents> for MessageContents {
    type Error = PactError;

    fn try_from(raw: RawContents) -> PactResult<Self> {
        let base64 = match &raw.encoded {
            Encoded::Flag(flag) => *flag,
            Encoded::Scheme(scheme) if scheme.eq_ignore_ascii_case(BASE64_ENCODING) => true,
            Encoded::Scheme(scheme) => {
                return Err(PactError::invalid_interaction(format!(
                    "unsupported content encoding `{scheme}`"
                )));
            }
        };

        let contents = match (raw.content, raw.content_type) {
            (None, None) => Self::Empty,
            (content, content_type) if base64 => {
                let Some(Value::String(encoded)) = content else {
                    return Err(PactError::invalid_interaction(
                        "base64 encoded content must be a string",
                    ));
                };
                let data = BASE64.decode(encoded).map_err(|err| {
                    PactError::invalid_interaction(format!("invalid base64 content: {err}"))
                })?;
                Self::Bytes {
                    content_type: content_type.unwrap_or_else(|| BINARY_CONTENT_TYPE.to_string()),
                    data,
                }
            }
            (Some(Value::String(text)), Some(content_type))
                if !is_json_content_type(&content_type) =>
            {
                Self::Bytes {
                    content_type,
                    data: text.into_bytes(),
                }
            }
            (None, Some(content_type)) if is_json_content_type(&content_type) => Self::Json {
                content_type,
                body: MatcherNode::Null,
            },
            (None, Some(content_type)) => Self::Bytes {
                content_type,
                data: Vec::new(),
            },
            (Some(content), content_type) => Self::Json {
                content_type: content_type.unwrap_or_else(|| JSON_CONTENT_TYPE.to_string()),
                body: MatcherNode::from_json(content)?,
            },
        };
        Ok(contents)
    }
}

impl From<MessageContents> for RawContents {
    fn from(contents: MessageContents) -> Self {
        match contents {
            MessageContents::Empty => Self {
                content: None,
                content_type: None,
                encoded: Encoded::Flag(false),
            },
            MessageContents::Json { content_type, body } => Self {
                content: Some(body.to_json()),
                content_type: Some(content_type),
                encoded: Encoded::Flag(false),
            },
            MessageContents::Bytes { content_type, data } => {
                if is_text_content_type(&content_type) {
                    match String::from_utf8(data) {
                        Ok(text) => Self {
                            content: Some(Value::String(text)),
                            content_type: Some(content_type),
                            encoded: Encoded::Flag(false),
                        },
                        Err(err) => Self {
                            content: Some(Value::String(BASE64.encode(err.into_bytes()))),
                            content_type: Some(content_type),
                            encoded: Encoded::Scheme(BASE64_ENCODING.to_string()),
                        },
                    }
                } else {
                    Self {
                        content: Some(Value::String(BASE64.encode(data))),
                        content_type: Some(content_type),
                        encoded: Encoded::Scheme(BASE64_ENCODING.to_string()),
                    }
                }
            }
        }
    }
}

fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// True for `application/json` and `*/*+json` media types.
#[must_use]
pub fn is_json_content_type(content_type: &str) -> bool {
    let media = media_type(content_type);
    media == JSON_CONTENT_TYPE || media.ends_with("+json")
}

/// True for media types whose payload is stored as plain text.
#[must_use]
pub fn is_text_content_type(content_type: &str) -> bool {
    let media = media_type(content_type);
    media.starts_with("text/") || media == "application/xml" || media.ends_with("+xml")
}

/// Kind tag of a pact interaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionType {
    /// Unidirectional message (queue, pub/sub, event)
    #[default]
    #[serde(rename = "Asynchronous/Messages")]
    AsynchronousMessages,
}

/// One expected message, in matcher form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageInteraction {
    /// Interaction kind
    #[serde(rename = "type", default)]
    pub interaction_type: InteractionType,
    /// What the consumer expects to receive
    #[serde(default)]
    pub description: String,
    /// Preconditions, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provider_states: Vec<ProviderState>,
    /// Message payload
    #[serde(default, skip_serializing_if = "MessageContents::is_empty")]
    pub contents: MessageContents,
    /// Transport metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Fields written by other tools, kept verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl MessageInteraction {
    /// Create an interaction with the given description.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    /// Structural equality used to de-duplicate interactions in a pact file.
    ///
    /// Fields written by other tools are ignored.
    #[must_use]
    pub fn same_interaction(&self, other: &Self) -> bool {
        self.interaction_type == other.interaction_type
            && self.description == other.description
            && self.provider_states == other.provider_states
            && self.contents == other.contents
            && self.metadata == other.metadata
    }
}

/// A concrete message handed to the consumer handler.
///
/// `T` is the shape the content was narrowed into; by default it is a
/// generic JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReifiedMessage<T = Value> {
    /// Interaction description
    pub description: String,
    /// Concrete content
    pub contents: T,
    /// Content type of the payload
    pub content_type: Option<String>,
    /// Transport metadata
    pub metadata: BTreeMap<String, String>,
}

impl ReifiedMessage<Value> {
    /// Decode the content into `U`.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::TypeNarrowing`] if the content does not fit `U`.
    pub fn narrow<U: DeserializeOwned>(self) -> PactResult<ReifiedMessage<U>> {
        let contents =
            serde_json::from_value(self.contents).map_err(|source| PactError::TypeNarrowing {
                target: std::any::type_name::<U>(),
                source,
            })?;
        Ok(ReifiedMessage {
            description: self.description,
            contents,
            content_type: self.content_type,
            metadata: self.metadata,
        })
    }
}

/// Fluent builder for one asynchronous message expectation.
///
/// Created by [`MessagePact::add_asynchronous_message`]. `T` is the type the
/// reified content is decoded into before it reaches the handler.
pub struct Message<T = Value> {
    pact: MessagePact,
    interaction: MessageInteraction,
    content_error: Option<String>,
    handler: Option<Box<dyn MessageHandler<T>>>,
}

impl Message<Value> {
    pub(crate) fn new(pact: MessagePact) -> Self {
        Self {
            pact,
            interaction: MessageInteraction::default(),
            content_error: None,
            handler: None,
        }
    }
}

impl<T> Message<T> {
    /// Add a provider state. Optional; may be called repeatedly.
    #[must_use]
    pub fn given(mut self, state: impl Into<ProviderState>) -> Self {
        self.interaction.provider_states.push(state.into());
        self
    }

    /// Describe the message the consumer expects to receive.
    #[must_use]
    pub fn expects_to_receive(mut self, description: impl Into<String>) -> Self {
        self.interaction.description = description.into();
        self
    }

    /// Replace the message metadata.
    #[must_use]
    pub fn with_metadata<K, V, I>(mut self, metadata: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.interaction.metadata = metadata
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Set the payload from raw bytes.
    ///
    /// JSON content types are parsed so that embedded matchers are recognised.
    #[must_use]
    pub fn with_content(
        mut self,
        content_type: impl Into<String>,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        let content_type = content_type.into();
        let body = body.into();
        if !is_json_content_type(&content_type) {
            return self.with_binary_content(content_type, body);
        }

        let parsed = serde_json::from_slice::<Value>(&body)
            .map_err(PactError::from)
            .and_then(MatcherNode::from_json);
        self.set_json(content_type, parsed);
        self
    }

    /// Set the payload from any serializable value.
    ///
    /// Matchers built with [`crate::matchers`] keep their rules.
    #[must_use]
    pub fn with_json_content(mut self, content: impl Serialize) -> Self {
        let parsed = serde_json::to_value(content)
            .map_err(PactError::from)
            .and_then(MatcherNode::from_json);
        self.set_json(JSON_CONTENT_TYPE.to_string(), parsed);
        self
    }

    /// Set an opaque binary payload.
    #[must_use]
    pub fn with_binary_content(
        mut self,
        content_type: impl Into<String>,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        self.interaction.contents = MessageContents::Bytes {
            content_type: content_type.into(),
            data: body.into(),
        };
        self.content_error = None;
        self
    }

    /// Decode the reified content into `U` before handing it to the handler.
    ///
    /// Any handler registered for the previous type is dropped.
    #[must_use]
    pub fn as_type<U: DeserializeOwned>(self) -> Message<U> {
        tracing::debug!(target_type = std::any::type_name::<U>(), "setting message decoding type");
        Message {
            pact: self.pact,
            interaction: self.interaction,
            content_error: self.content_error,
            handler: None,
        }
    }

    /// Register the function that consumes the message.
    #[must_use]
    pub fn consumed_by<F>(self, handler: F) -> Self
    where
        F: FnMut(ReifiedMessage<T>) -> anyhow::Result<()> + 'static,
        T: 'static,
    {
        self.consumed_by_handler(handler)
    }

    /// Register a [`MessageHandler`] implementation as the consumer.
    #[must_use]
    pub fn consumed_by_handler<H>(mut self, handler: H) -> Self
    where
        H: MessageHandler<T> + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    /// The interaction built so far.
    #[must_use]
    pub const fn interaction(&self) -> &MessageInteraction {
        &self.interaction
    }

    /// Content conversion failure remembered for verification.
    pub(crate) fn content_error(&self) -> Option<&str> {
        self.content_error.as_deref()
    }

    fn set_json(&mut self, content_type: String, parsed: PactResult<MatcherNode>) {
        match parsed {
            Ok(body) => {
                self.interaction.contents = MessageContents::Json { content_type, body };
                self.content_error = None;
            }
            Err(err) => {
                tracing::debug!(error = %err, "message content rejected");
                self.content_error = Some(err.to_string());
            }
        }
    }
}

impl<T: DeserializeOwned> Message<T> {
    /// Verify the message with the handler registered by [`Message::consumed_by`].
    ///
    /// # Errors
    ///
    /// Returns [`PactError::InvalidInteraction`] when no handler was
    /// registered, otherwise whatever [`MessagePact::verify`] returns.
    pub fn verify(mut self) -> PactResult<()> {
        let mut handler = self.handler.take().ok_or_else(|| {
            PactError::invalid_interaction("no handler registered, call consumed_by before verify")
        })?;
        let pact = self.pact.clone();
        pact.verify_with(&self, handler.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::like;
    use serde_json::json;

    #[test]
    fn test_json_contents_wire_form() {
        let contents = MessageContents::Json {
            content_type: JSON_CONTENT_TYPE.to_string(),
            body: MatcherNode::from_json(json!({"id": like(1)})).unwrap(),
        };

        let wire = serde_json::to_value(&contents).unwrap();
        assert_eq!(wire["contentType"], "application/json");
        assert_eq!(wire["encoded"], false);
        assert_eq!(wire["content"]["id"]["pact:matcher:type"], "type");

        let restored: MessageContents = serde_json::from_value(wire).unwrap();
        assert_eq!(restored, contents);
    }

    #[test]
    fn test_binary_contents_are_base64() {
        let contents = MessageContents::Bytes {
            content_type: "application/octet-stream".to_string(),
            data: vec![0, 159, 146, 150],
        };

        let wire = serde_json::to_value(&contents).unwrap();
        assert_eq!(wire["encoded"], "base64");
        assert_eq!(wire["content"], "AJ+Slg==");

        let restored: MessageContents = serde_json::from_value(wire).unwrap();
        assert_eq!(restored, contents);
    }

    #[test]
    fn test_text_contents_stay_readable() {
        let contents = MessageContents::Bytes {
            content_type: "text/plain; charset=utf-8".to_string(),
            data: b"order created".to_vec(),
        };

        let wire = serde_json::to_value(&contents).unwrap();
        assert_eq!(wire["content"], "order created");

        let restored: MessageContents = serde_json::from_value(wire).unwrap();
        assert_eq!(restored, contents);
    }

    #[test]
    fn test_json_bytes_round_trip_as_bytes() {
        let contents = MessageContents::Bytes {
            content_type: "application/json".to_string(),
            data: br#"{"a":1}"#.to_vec(),
        };

        let wire = serde_json::to_value(&contents).unwrap();
        let restored: MessageContents = serde_json::from_value(wire).unwrap();
        assert_eq!(restored, contents);
    }

    #[test]
    fn test_unknown_encoding_rejected() {
        let result = serde_json::from_value::<MessageContents>(json!({
            "content": "abc",
            "contentType": "application/octet-stream",
            "encoded": "gzip"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_content_type_detection() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("application/vnd.orders.v1+json; charset=utf-8"));
        assert!(!is_json_content_type("text/plain"));
        assert!(is_text_content_type("text/csv"));
        assert!(is_text_content_type("application/soap+xml"));
        assert!(!is_text_content_type("application/octet-stream"));
    }

    #[test]
    fn test_interaction_skips_empty_fields() {
        let interaction = MessageInteraction::new("an event");
        let wire = serde_json::to_value(&interaction).unwrap();
        assert_eq!(
            wire,
            json!({"type": "Asynchronous/Messages", "description": "an event"})
        );
    }

    #[test]
    fn test_same_interaction_ignores_foreign_fields() {
        let mut loaded = MessageInteraction::new("an event");
        loaded.extra.insert("pending".to_string(), json!(false));
        let fresh = MessageInteraction::new("an event");

        assert!(loaded.same_interaction(&fresh));
        assert_ne!(loaded, fresh);
    }

    #[test]
    fn test_provider_state_params() {
        let state = ProviderState::with_params("order exists", [("id", json!("abc123"))]);
        let wire = serde_json::to_value(&state).unwrap();
        assert_eq!(wire, json!({"name": "order exists", "params": {"id": "abc123"}}));

        let bare: ProviderState = "no orders".into();
        assert_eq!(serde_json::to_value(&bare).unwrap(), json!({"name": "no orders"}));
    }

    #[test]
    fn test_narrow_reports_target_type() {
        #[derive(Debug, Deserialize)]
        struct Event {
            #[allow(dead_code)]
            id: u64,
        }

        let message = ReifiedMessage {
            description: "an event".to_string(),
            contents: json!({"id": "not a number"}),
            content_type: Some(JSON_CONTENT_TYPE.to_string()),
            metadata: BTreeMap::new(),
        };

        let err = message.narrow::<Event>().unwrap_err();
        assert!(matches!(err, PactError::TypeNarrowing { .. }));
        assert!(err.to_string().contains("Event"));
    }
}
