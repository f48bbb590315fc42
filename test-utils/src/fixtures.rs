//! Test fixtures with sample data.
//!
//! The fixtures model an order service publishing order events and a
//! billing service consuming them.

use message_pact::matchers::{self, MatcherNode};
use message_pact::message::JSON_CONTENT_TYPE;
use message_pact::{Contract, MessageContents, MessageInteraction, ProviderState};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Consumer name used by the fixtures.
pub const SAMPLE_CONSUMER: &str = "billing-service";

/// Provider name used by the fixtures.
pub const SAMPLE_PROVIDER: &str = "order-service";

/// Sample order event as the consumer decodes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SampleOrderEvent {
    /// Order identifier
    pub order_id: String,
    /// Customer identifier
    pub customer_id: i64,
    /// Ordered items
    pub items: Vec<SampleLineItem>,
    /// Order total
    pub total: f64,
    /// Creation timestamp
    pub created_at: String,
}

/// Sample order line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SampleLineItem {
    /// Stock keeping unit
    pub sku: String,
    /// Ordered quantity
    pub quantity: i64,
}

/// Matcher-form content of an order created event.
///
/// Reifies to an order `abc123` for customer 42 with one `A-1` line.
#[must_use]
pub fn order_created_content() -> MatcherNode {
    let line = MatcherNode::Object(
        [
            ("sku".to_string(), matchers::like("A-1")),
            ("quantity".to_string(), matchers::integer(2)),
        ]
        .into_iter()
        .collect(),
    );
    MatcherNode::Object(
        [
            ("orderId".to_string(), matchers::regex("abc123", "^[a-z0-9]+$")),
            ("customerId".to_string(), matchers::integer(42)),
            ("items".to_string(), matchers::each_like(line, 1)),
            ("total".to_string(), matchers::decimal(19.5)),
            (
                "createdAt".to_string(),
                matchers::timestamp("yyyy-MM-dd'T'HH:mm:ss", "2024-05-01T10:00:00"),
            ),
        ]
        .into_iter()
        .collect(),
    )
}

/// The concrete event [`order_created_content`] reifies to.
#[must_use]
pub fn order_created_event() -> SampleOrderEvent {
    SampleOrderEvent {
        order_id: "abc123".to_string(),
        customer_id: 42,
        items: vec![SampleLineItem {
            sku: "A-1".to_string(),
            quantity: 2,
        }],
        total: 19.5,
        created_at: "2024-05-01T10:00:00".to_string(),
    }
}

/// Interaction for an order created event with the given description.
#[must_use]
pub fn sample_interaction(description: &str) -> MessageInteraction {
    let mut interaction = MessageInteraction::new(description);
    interaction.provider_states = vec![ProviderState::with_params(
        "an order exists",
        [("orderId", json!("abc123"))],
    )];
    interaction.contents = MessageContents::Json {
        content_type: JSON_CONTENT_TYPE.to_string(),
        body: order_created_content(),
    };
    interaction
        .metadata
        .insert("topic".to_string(), "orders".to_string());
    interaction
}

/// Contract between the sample consumer and provider holding the given interactions.
#[must_use]
pub fn sample_contract(descriptions: &[&str]) -> Contract {
    let mut contract = Contract::new(SAMPLE_CONSUMER, SAMPLE_PROVIDER);
    for description in descriptions {
        contract.add_interaction(sample_interaction(description));
    }
    contract
}
