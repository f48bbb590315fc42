//! Shared proptest generators.
//!
//! Every generated matcher tree can be reified: it only uses rules that have
//! a canonical example and valid regex patterns.

use message_pact::matchers::{self, MatcherNode};
use message_pact::message::JSON_CONTENT_TYPE;
use message_pact::{MessageContents, MessageInteraction, ProviderState};
use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use serde_json::Value;

/// Generate consumer and provider names.
pub fn participant_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("order-service".to_string()),
        Just("billing-service".to_string()),
        Just("shipping-worker".to_string()),
        "[a-z][a-z0-9-]{2,15}",
    ]
}

/// Generate interaction descriptions.
pub fn description_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("an order created event".to_string()),
        Just("an invoice paid event".to_string()),
        "an? [a-z]{3,10} (created|updated|deleted) event",
    ]
}

/// Generate provider states, with or without parameters.
pub fn provider_state_strategy() -> impl Strategy<Value = ProviderState> {
    (
        "[a-z]{3,10}( [a-z]{3,10}){0,3}",
        btree_map("[a-z]{1,8}", scalar_value_strategy(), 0..3),
    )
        .prop_map(|(name, params)| ProviderState::with_params(name, params))
}

fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,12}".prop_map(Value::String),
    ]
}

/// Generate matcher-free leaves.
pub fn literal_strategy() -> impl Strategy<Value = MatcherNode> {
    prop_oneof![
        Just(MatcherNode::Null),
        any::<bool>().prop_map(MatcherNode::from),
        any::<i64>().prop_map(MatcherNode::from),
        "[a-zA-Z0-9 _-]{0,16}".prop_map(MatcherNode::from),
    ]
}

/// Generate leaves carrying a matching rule.
pub fn matched_leaf_strategy() -> impl Strategy<Value = MatcherNode> {
    prop_oneof![
        any::<i64>().prop_map(matchers::like),
        "[a-z]{1,10}".prop_map(matchers::like),
        any::<i64>().prop_map(matchers::integer),
        (-1000i32..1000).prop_map(|n| matchers::decimal(f64::from(n) / 4.0)),
        any::<bool>().prop_map(matchers::boolean),
        "[a-z]{1,8}".prop_map(matchers::equality),
        "[0-9]{1,6}".prop_map(|digits| matchers::regex(digits, r"^\d+$")),
        (0u32..20, 0u32..20, 0u32..20)
            .prop_map(|(a, b, c)| matchers::semver(format!("{a}.{b}.{c}"))),
        Just(matchers::date("yyyy-MM-dd", "2024-05-01")),
    ]
}

/// Generate content trees mixing literals and matchers.
pub fn matcher_tree_strategy() -> impl Strategy<Value = MatcherNode> {
    let leaf = prop_oneof![literal_strategy(), matched_leaf_strategy()];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..4).prop_map(MatcherNode::Array),
            btree_map("[a-z]{1,8}", inner.clone(), 0..4).prop_map(MatcherNode::Object),
            (inner.clone(), 0usize..4).prop_map(|(example, min)| matchers::each_like(example, min)),
            inner.prop_map(matchers::like),
        ]
    })
}

/// Generate message interactions with JSON content.
pub fn interaction_strategy() -> impl Strategy<Value = MessageInteraction> {
    (
        description_strategy(),
        vec(provider_state_strategy(), 0..3),
        matcher_tree_strategy(),
        btree_map("[a-z-]{1,10}", "[a-z0-9./-]{1,16}", 0..3),
    )
        .prop_map(|(description, provider_states, body, metadata)| {
            let mut interaction = MessageInteraction::new(description);
            interaction.provider_states = provider_states;
            interaction.contents = MessageContents::Json {
                content_type: JSON_CONTENT_TYPE.to_string(),
                body,
            };
            interaction.metadata = metadata;
            interaction
        })
}
