//! Property-based tests for message-pact.
//!
//! Tests validate:
//! - Property 1: Reification Is Deterministic
//! - Property 2: Reified Content Carries No Matchers
//! - Property 3: Literal Content Reifies To Itself
//! - Property 4: Interaction Serialization Round-Trip
//! - Property 5: Contract Merge Is Idempotent
//! - Property 6: Contract Merge Is Additive
//! - Property 7: Pact File Writes Are Stable

use message_pact::matchers::{MATCHER_TYPE_KEY, MatcherNode, each_like, each_like_between};
use message_pact::reify::reify;
use message_pact::store::pact_file_name;
use message_pact::{Contract, ContractStore, MessageInteraction};
use proptest::collection::vec;
use proptest::prelude::*;
use serde_json::Value;
use test_utils::{
    interaction_strategy, literal_strategy, matcher_tree_strategy, participant_name_strategy,
};

fn contains_matcher_key(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            map.contains_key(MATCHER_TYPE_KEY) || map.values().any(contains_matcher_key)
        }
        Value::Array(items) => items.iter().any(contains_matcher_key),
        _ => false,
    }
}

fn contract_with(interactions: Vec<MessageInteraction>) -> Contract {
    let mut contract = Contract::new("billing-service", "order-service");
    for interaction in interactions {
        contract.add_interaction(interaction);
    }
    contract
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 1: Reification Is Deterministic**
    ///
    /// *For any* content tree, reifying it twice yields the same value.
    #[test]
    fn prop_reify_deterministic(tree in matcher_tree_strategy()) {
        let first = reify(&tree).unwrap();
        let second = reify(&tree).unwrap();
        prop_assert_eq!(first, second);
    }

    /// **Property 2: Reified Content Carries No Matchers**
    #[test]
    fn prop_reified_has_no_matcher_keys(tree in matcher_tree_strategy()) {
        let value = reify(&tree).unwrap();
        prop_assert!(
            !contains_matcher_key(&value),
            "reified value still carries a matcher: {}", value
        );
    }

    /// **Property 3: Literal Content Reifies To Itself**
    #[test]
    fn prop_literal_reifies_to_itself(items in vec(literal_strategy(), 0..6)) {
        let tree = MatcherNode::Array(items);
        prop_assert!(tree.is_literal());
        prop_assert_eq!(reify(&tree).unwrap(), tree.to_json());
    }

    /// Property: each-like arrays honour their bounds
    #[test]
    fn prop_each_like_length_within_bounds(
        example in literal_strategy(),
        min in 0usize..6,
        extra in 0usize..4,
    ) {
        let max = min.max(1) + extra;
        let value = reify(&each_like_between(example.clone(), min, max)).unwrap();
        let len = value.as_array().map_or(0, Vec::len);
        prop_assert_eq!(len, min.max(1));

        let value = reify(&each_like(example, min)).unwrap();
        prop_assert_eq!(value.as_array().map_or(0, Vec::len), min.max(1));
    }

    /// **Property 4: Interaction Serialization Round-Trip**
    ///
    /// *For any* interaction, serializing to the pact wire form and parsing
    /// it back yields the same interaction, matchers included.
    #[test]
    fn prop_interaction_roundtrip(interaction in interaction_strategy()) {
        let json = serde_json::to_string(&interaction).unwrap();
        let parsed: MessageInteraction = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(parsed, interaction);
    }

    /// **Property 5: Contract Merge Is Idempotent**
    #[test]
    fn prop_merge_idempotent(interactions in vec(interaction_strategy(), 0..5)) {
        let contract = contract_with(interactions);
        let mut merged = contract.clone();

        let added = merged.merge(&contract).unwrap();

        prop_assert_eq!(added, 0);
        prop_assert_eq!(merged, contract);
    }

    /// **Property 6: Contract Merge Is Additive**
    ///
    /// *For any* two contracts of the same pair, the merge keeps every
    /// interaction of both, the first contract's order first, without
    /// duplicates.
    #[test]
    fn prop_merge_additive(
        left in vec(interaction_strategy(), 0..4),
        right in vec(interaction_strategy(), 0..4),
    ) {
        let left = contract_with(left);
        let right = contract_with(right);
        let mut merged = left.clone();

        let added = merged.merge(&right).unwrap();

        prop_assert_eq!(merged.interactions.len(), left.interactions.len() + added);
        prop_assert_eq!(&merged.interactions[..left.interactions.len()], &left.interactions[..]);
        for interaction in left.messages().chain(right.messages()) {
            prop_assert!(merged.contains(interaction));
        }
        for (i, a) in merged.interactions.iter().enumerate() {
            for b in &merged.interactions[i + 1..] {
                prop_assert!(!a.same_interaction(b), "duplicate interaction {:?}", a.description());
            }
        }
    }

    /// Property: pact file names are plain file names
    #[test]
    fn prop_pact_file_name_is_plain(
        consumer in "[a-zA-Z0-9/\\\\:*?<>| _.-]{1,20}",
        provider in participant_name_strategy(),
    ) {
        let name = pact_file_name(&consumer, &provider);
        prop_assert!(name.ends_with(".json"));
        prop_assert!(!name.contains('/') && !name.contains('\\'));
        prop_assert_eq!(name, pact_file_name(&consumer, &provider));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// **Property 7: Pact File Writes Are Stable**
    ///
    /// *For any* contract, writing it into a pact file that already holds it
    /// leaves the file byte-identical.
    #[test]
    fn prop_rewrite_is_byte_identical(interactions in vec(interaction_strategy(), 1..4)) {
        let dir = tempfile::tempdir().unwrap();
        let store = ContractStore::new(dir.path());
        let contract = contract_with(interactions);

        let path = store.write(&contract, false).unwrap();
        let first = std::fs::read(&path).unwrap();
        store.write(&contract, false).unwrap();
        let second = std::fs::read(&path).unwrap();

        prop_assert_eq!(first, second);
        let loaded = store.load("billing-service", "order-service").unwrap().unwrap();
        prop_assert_eq!(loaded.interactions, contract.interactions);
    }
}

#[test]
fn test_merge_rejects_other_pair() {
    let mut contract = Contract::new("billing-service", "order-service");
    let other = Contract::new("billing-service", "shipping-service");
    assert!(contract.merge(&other).is_err());
}
