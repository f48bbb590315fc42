//! Reification: turning matcher-form content into one concrete example.
//!
//! Every matched node resolves to its example value. Format rules without an
//! example render a fixed instant, so the output depends on nothing but the
//! input tree.

use crate::error::{PactError, PactResult};
use crate::matchers::{Matched, MatcherNode, MatchingRule};
use crate::message::{MessageContents, MessageInteraction, ReifiedMessage, is_text_content_type};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Instant used when a date/time matcher has no example: 2000-01-01T00:00:00Z.
const CANONICAL_EPOCH_SECONDS: i64 = 946_684_800;

/// Largest array a `min` bound may expand to.
const MAX_GENERATED_ITEMS: usize = 1_000;

const DEFAULT_TIMESTAMP_FORMAT: &str = "yyyy-MM-dd'T'HH:mm:ss";
const DEFAULT_DATE_FORMAT: &str = "yyyy-MM-dd";
const DEFAULT_TIME_FORMAT: &str = "HH:mm:ss";

/// Resolve a content tree into a plain JSON value.
///
/// # Errors
///
/// Returns [`PactError::UnsupportedMatcherKind`] for rule kinds the engine
/// does not know and [`PactError::InvalidMatcher`] when a rule needs an
/// example it does not have.
pub fn reify(node: &MatcherNode) -> PactResult<Value> {
    match node {
        MatcherNode::Null => Ok(Value::Null),
        MatcherNode::Bool(b) => Ok(Value::Bool(*b)),
        MatcherNode::Number(n) => Ok(Value::Number(n.clone())),
        MatcherNode::String(s) => Ok(Value::String(s.clone())),
        MatcherNode::Array(items) => items
            .iter()
            .map(reify)
            .collect::<PactResult<Vec<_>>>()
            .map(Value::Array),
        MatcherNode::Object(map) => map
            .iter()
            .map(|(key, value)| Ok((key.clone(), reify(value)?)))
            .collect::<PactResult<Map<_, _>>>()
            .map(Value::Object),
        MatcherNode::Matched(matched) => reify_matched(matched),
    }
}

fn reify_matched(matched: &Matched) -> PactResult<Value> {
    let example = matched.example.as_ref();
    match &matched.rule {
        MatchingRule::Unsupported { kind } => Err(PactError::unsupported_matcher(kind.clone())),
        MatchingRule::Type { min, max } => match example {
            Some(MatcherNode::Array(items)) if min.is_some() || max.is_some() => {
                reify_bounded_array(items, *min, *max)
            }
            Some(node) => reify(node),
            None => Err(missing_example(&matched.rule)),
        },
        MatchingRule::Regex { regex } => {
            let value = reify(example.ok_or_else(|| missing_example(&matched.rule))?)?;
            check_regex_example(regex, &value)?;
            Ok(value)
        }
        MatchingRule::Equality | MatchingRule::Include => {
            reify(example.ok_or_else(|| missing_example(&matched.rule))?)
        }
        rule => match example {
            Some(node) => reify(node),
            None => canonical_instance(rule),
        },
    }
}

/// Repeat the example elements up to the minimum length, capped at `max`.
fn reify_bounded_array(
    items: &[MatcherNode],
    min: Option<usize>,
    max: Option<usize>,
) -> PactResult<Value> {
    let reified = items.iter().map(reify).collect::<PactResult<Vec<_>>>()?;
    let count = match (min, max) {
        (Some(min), Some(max)) => min.max(1).min(max),
        (Some(min), None) => min.max(1),
        (None, Some(max)) => reified.len().min(max),
        (None, None) => reified.len(),
    };
    if count > MAX_GENERATED_ITEMS && count > reified.len() {
        return Err(PactError::invalid_matcher(format!(
            "array of {count} items exceeds the limit of {MAX_GENERATED_ITEMS}"
        )));
    }
    if reified.is_empty() {
        return Ok(Value::Array(reified));
    }
    Ok(Value::Array(reified.iter().cycle().take(count).cloned().collect()))
}

fn check_regex_example(pattern: &str, value: &Value) -> PactResult<()> {
    let compiled = regex::Regex::new(pattern)
        .map_err(|err| PactError::invalid_matcher(format!("invalid regex `{pattern}`: {err}")))?;
    match value {
        Value::String(example) if !compiled.is_match(example) => {
            tracing::warn!(
                pattern,
                example = example.as_str(),
                "regex matcher example does not match its pattern"
            );
        }
        Value::String(_) => {}
        other => {
            tracing::warn!(pattern, example = %other, "regex matcher example is not a string");
        }
    }
    Ok(())
}

fn canonical_instance(rule: &MatchingRule) -> PactResult<Value> {
    let value = match rule {
        MatchingRule::Integer | MatchingRule::Number => Value::from(1),
        MatchingRule::Decimal => Value::from(1.0),
        MatchingRule::Boolean => Value::Bool(true),
        MatchingRule::Null => Value::Null,
        MatchingRule::Semver => Value::String("1.0.0".to_string()),
        MatchingRule::Timestamp { format, .. } => {
            render_canonical(format.as_deref().unwrap_or(DEFAULT_TIMESTAMP_FORMAT))?
        }
        MatchingRule::Date { format } => {
            render_canonical(format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT))?
        }
        MatchingRule::Time { format } => {
            render_canonical(format.as_deref().unwrap_or(DEFAULT_TIME_FORMAT))?
        }
        other => return Err(missing_example(other)),
    };
    Ok(value)
}

fn missing_example(rule: &MatchingRule) -> PactError {
    PactError::invalid_matcher(format!("`{}` matcher requires an example value", rule.kind()))
}

fn render_canonical(java_format: &str) -> PactResult<Value> {
    let strftime = java_to_strftime(java_format)?;
    if StrftimeItems::new(&strftime).any(|item| matches!(item, Item::Error)) {
        return Err(PactError::invalid_matcher(format!(
            "unsupported date format `{java_format}`"
        )));
    }
    let instant = DateTime::<Utc>::from_timestamp(CANONICAL_EPOCH_SECONDS, 0)
        .ok_or_else(|| PactError::invalid_matcher("canonical instant out of range"))?;
    Ok(Value::String(instant.format(&strftime).to_string()))
}

/// Convert a Java `SimpleDateFormat` pattern into a chrono strftime string.
pub(crate) fn java_to_strftime(pattern: &str) -> PactResult<String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            // '' is a literal quote, otherwise copy until the closing quote
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        out.push('\'');
                        i += 2;
                        continue;
                    }
                    break;
                }
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            if i >= chars.len() {
                return Err(PactError::invalid_matcher(format!(
                    "unterminated quote in date format `{pattern}`"
                )));
            }
            i += 1;
            continue;
        }

        if !c.is_ascii_alphabetic() {
            push_literal(&mut out, c);
            i += 1;
            continue;
        }

        let run = chars[i..].iter().take_while(|&&next| next == c).count();
        let spec = match (c, run) {
            ('y', 2) => "%y",
            ('y' | 'u', _) => "%Y",
            ('M', 1) => "%-m",
            ('M', 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', 1) => "%-d",
            ('d', _) => "%d",
            ('D', _) => "%j",
            ('H', 1) => "%-H",
            ('H', _) => "%H",
            ('h', 1) => "%-I",
            ('h', _) => "%I",
            ('m', 1) => "%-M",
            ('m', _) => "%M",
            ('s', 1) => "%-S",
            ('s', _) => "%S",
            ('S', 1..=3) => "%3f",
            ('S', 4..=6) => "%6f",
            ('S', _) => "%9f",
            ('a', _) => "%p",
            ('E', 1..=3) => "%a",
            ('E', _) => "%A",
            ('X', 3..) => "%:z",
            ('X' | 'Z', _) => "%z",
            ('z', _) => "%Z",
            _ => {
                return Err(PactError::invalid_matcher(format!(
                    "unsupported pattern letter `{c}` in date format `{pattern}`"
                )));
            }
        };
        out.push_str(spec);
        i += run;
    }

    Ok(out)
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

/// Reify the content of a message body.
///
/// Text payloads become strings; other binary payloads become base64 strings.
///
/// # Errors
///
/// Propagates reification errors of JSON content.
pub fn reify_contents(contents: &MessageContents) -> PactResult<Value> {
    match contents {
        MessageContents::Empty => Ok(Value::Null),
        MessageContents::Json { body, .. } => reify(body),
        MessageContents::Bytes { content_type, data } => {
            if is_text_content_type(content_type) {
                if let Ok(text) = std::str::from_utf8(data) {
                    return Ok(Value::String(text.to_string()));
                }
            }
            Ok(Value::String(BASE64.encode(data)))
        }
    }
}

/// Produce the concrete message for an interaction.
///
/// # Errors
///
/// Propagates reification errors of the content.
pub fn reify_message(interaction: &MessageInteraction) -> PactResult<ReifiedMessage> {
    Ok(ReifiedMessage {
        description: interaction.description.clone(),
        contents: reify_contents(&interaction.contents)?,
        content_type: interaction.contents.content_type().map(str::to_string),
        metadata: interaction.metadata.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::{
        each_like, each_like_between, equality, includes, integer, like, null_value, regex,
        semver, timestamp,
    };
    use serde_json::json;
    use std::collections::BTreeMap;

    fn node(value: Value) -> MatcherNode {
        MatcherNode::from_json(value).unwrap()
    }

    #[test]
    fn test_order_created_example() {
        let content = node(json!({
            "orderId": like("abc123"),
            "amount": like(42),
        }));

        assert_eq!(reify(&content).unwrap(), json!({"orderId": "abc123", "amount": 42}));
    }

    #[test]
    fn test_literals_pass_through() {
        let raw = json!({"a": [1, "two", null, true], "b": {"c": 1.5}});
        assert_eq!(reify(&node(raw.clone())).unwrap(), raw);
    }

    #[test]
    fn test_each_like_generates_minimum() {
        let content = each_like(node(json!({"sku": like("A-1")})), 3);
        assert_eq!(
            reify(&content).unwrap(),
            json!([{"sku": "A-1"}, {"sku": "A-1"}, {"sku": "A-1"}])
        );
    }

    #[test]
    fn test_oversized_minimum_rejected() {
        let content = node(json!({
            "pact:matcher:type": "type",
            "min": 1_000_000_000u64,
            "value": [1]
        }));
        let err = reify(&content).unwrap_err();
        assert!(matches!(err, PactError::InvalidMatcher(_)));

        let capped = node(json!({
            "pact:matcher:type": "type",
            "min": 1_000_000_000u64,
            "max": 3,
            "value": [1]
        }));
        assert_eq!(reify(&capped).unwrap(), json!([1, 1, 1]));
    }

    #[test]
    fn test_each_like_with_zero_minimum_keeps_one_example() {
        let content = each_like(integer(7), 0);
        assert_eq!(reify(&content).unwrap(), json!([7]));
    }

    #[test]
    fn test_each_like_between_is_capped() {
        let content = each_like_between(like("x"), 5, 2);
        assert_eq!(reify(&content).unwrap(), json!(["x", "x"]));
    }

    #[test]
    fn test_max_only_truncates_example() {
        let content = node(json!({
            "pact:matcher:type": "type",
            "max": 2,
            "value": [1, 2, 3]
        }));
        assert_eq!(reify(&content).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_type_without_bounds_keeps_example_count() {
        let content = like(vec![MatcherNode::from(1), MatcherNode::from(2), MatcherNode::from(3)]);
        assert_eq!(reify(&content).unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn test_nested_matchers_resolve() {
        let content = node(json!({
            "customer": like("Ada"),
            "items": each_like(node(json!({"qty": integer(2)})), 1),
            "status": equality("CREATED"),
            "note": includes("gift"),
            "version": semver("2.1.0"),
            "cancelled": null_value(),
        }));

        assert_eq!(
            reify(&content).unwrap(),
            json!({
                "customer": "Ada",
                "items": [{"qty": 2}],
                "status": "CREATED",
                "note": "gift",
                "version": "2.1.0",
                "cancelled": null,
            })
        );
    }

    #[test]
    fn test_regex_uses_example() {
        let content = regex("2024-05-01", r"^\d{4}-\d{2}-\d{2}$");
        assert_eq!(reify(&content).unwrap(), json!("2024-05-01"));
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let content = regex("x", "(unclosed");
        assert!(matches!(reify(&content), Err(PactError::InvalidMatcher(_))));
    }

    #[test]
    fn test_unsupported_kind_fails() {
        let content = node(json!({
            "event": {"pact:matcher:type": "arrayContains", "variants": [], "value": []}
        }));
        let err = reify(&content).unwrap_err();
        assert!(
            matches!(err, PactError::UnsupportedMatcherKind(ref kind) if kind == "arrayContains")
        );
    }

    #[test]
    fn test_type_without_example_fails() {
        let content = node(json!({"pact:matcher:type": "type"}));
        assert!(matches!(reify(&content), Err(PactError::InvalidMatcher(_))));
    }

    #[test]
    fn test_timestamp_example_is_used() {
        let content = timestamp("yyyy-MM-dd'T'HH:mm:ss", "2024-05-01T10:00:00");
        assert_eq!(reify(&content).unwrap(), json!("2024-05-01T10:00:00"));
    }

    #[test]
    fn test_format_without_example_is_canonical() {
        let content = node(json!({
            "at": {"pact:matcher:type": "timestamp", "format": "yyyy-MM-dd'T'HH:mm:ss.SSSXXX"},
            "on": {"pact:matcher:type": "date", "format": "dd/MM/yyyy"},
            "default": {"pact:matcher:type": "time"},
            "count": {"pact:matcher:type": "integer"},
        }));

        assert_eq!(
            reify(&content).unwrap(),
            json!({
                "at": "2000-01-01T00:00:00.000+00:00",
                "on": "01/01/2000",
                "default": "00:00:00",
                "count": 1,
            })
        );
    }

    #[test]
    fn test_java_format_conversion() {
        assert_eq!(java_to_strftime("yyyy-MM-dd").unwrap(), "%Y-%m-%d");
        assert_eq!(java_to_strftime("EEE, d MMM yy").unwrap(), "%a, %-d %b %y");
        assert_eq!(java_to_strftime("HH 'o''clock' a").unwrap(), "%H o'clock %p");
        assert_eq!(java_to_strftime("100%").unwrap(), "100%%");
        assert!(java_to_strftime("'open").is_err());
        assert!(java_to_strftime("qq").is_err());
    }

    #[test]
    fn test_reification_is_deterministic() {
        let content = node(json!({
            "at": {"pact:matcher:type": "timestamp"},
            "items": each_like(like("x"), 2),
        }));
        assert_eq!(reify(&content).unwrap(), reify(&content).unwrap());
    }

    #[test]
    fn test_binary_contents_reify_to_base64() {
        let contents = MessageContents::Bytes {
            content_type: "application/octet-stream".to_string(),
            data: vec![1, 2, 3],
        };
        assert_eq!(reify_contents(&contents).unwrap(), json!("AQID"));

        let text = MessageContents::Bytes {
            content_type: "text/plain".to_string(),
            data: b"hello".to_vec(),
        };
        assert_eq!(reify_contents(&text).unwrap(), json!("hello"));
    }

    #[test]
    fn test_reify_message_carries_metadata() {
        let mut interaction = MessageInteraction::new("an order created event");
        interaction.metadata = BTreeMap::from([("queue".to_string(), "orders".to_string())]);
        interaction.contents = MessageContents::Json {
            content_type: "application/json".to_string(),
            body: node(json!({"id": like(1)})),
        };

        let message = reify_message(&interaction).unwrap();
        assert_eq!(message.description, "an order created event");
        assert_eq!(message.contents, json!({"id": 1}));
        assert_eq!(message.content_type.as_deref(), Some("application/json"));
        assert_eq!(message.metadata["queue"], "orders");
    }
}
