//! Helpers for end-to-end tests: independent pact sessions against one directory.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use message_pact::{MessagePact, PactConfig, PactResult, ReifiedMessage};
use std::path::Path;
use test_utils::fixtures::{SAMPLE_CONSUMER, SAMPLE_PROVIDER, order_created_content};

/// Start a fresh session for the sample pair, as a separate test process would.
///
/// # Errors
///
/// Returns an error if the configuration is rejected.
pub fn sample_session(pact_dir: &Path) -> PactResult<MessagePact> {
    MessagePact::new(PactConfig::new(SAMPLE_CONSUMER, SAMPLE_PROVIDER).with_pact_dir(pact_dir))
}

/// Verify one order event with the given description in a fresh session.
///
/// # Errors
///
/// Returns the verification error, if any.
pub fn verify_order_event(pact_dir: &Path, description: &str) -> PactResult<()> {
    let pact = sample_session(pact_dir)?;
    let message = pact
        .add_asynchronous_message()
        .given("an order exists")
        .expects_to_receive(description)
        .with_json_content(order_created_content());
    tracing::debug!(description, "verifying order event");
    pact.verify(&message, |_: ReifiedMessage| Ok(()))
}

/// Descriptions recorded in the sample pair's pact file, in file order.
///
/// # Errors
///
/// Returns an error if the file is missing or unreadable.
pub fn recorded_descriptions(pact_dir: &Path) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let path = pact_dir.join(message_pact::store::pact_file_name(SAMPLE_CONSUMER, SAMPLE_PROVIDER));
    let file: serde_json::Value = serde_json::from_slice(&std::fs::read(path)?)?;
    Ok(file["interactions"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["description"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default())
}
