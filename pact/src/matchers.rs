//! Matcher model for message content.
//!
//! Content is a tree of [`MatcherNode`]s. Leaves are either plain literals or
//! [`Matched`] nodes that carry one [`MatchingRule`] together with an example
//! value. On the wire a matched node uses the pact integration JSON form:
//!
//! ```json
//! { "pact:matcher:type": "regex", "regex": "\\d+", "value": "42" }
//! ```
//!
//! The constructor functions in this module (`like`, `each_like`, `regex`,
//! ...) build matched nodes and compose with `serde_json::json!`.

use crate::error::{PactError, PactResult};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Key marking a JSON object as a matched node.
pub const MATCHER_TYPE_KEY: &str = "pact:matcher:type";
/// Key naming the generator hint of a matched node.
pub const GENERATOR_TYPE_KEY: &str = "pact:generator:type";
const VALUE_KEY: &str = "value";

/// A constraint placed on a value instead of an exact literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchingRule {
    /// Value must equal the example
    Equality,
    /// Value must have the same type as the example; arrays may be bounded
    Type {
        /// Minimum array length
        min: Option<usize>,
        /// Maximum array length
        max: Option<usize>,
    },
    /// String must match the pattern
    Regex {
        /// Regular expression the value must match
        regex: String,
    },
    /// Value must be an integer
    Integer,
    /// Value must be a decimal number
    Decimal,
    /// Value must be any number
    Number,
    /// Value must be a boolean
    Boolean,
    /// Value must be null
    Null,
    /// String must contain the example
    Include,
    /// String must be a timestamp in the given format
    Timestamp {
        /// Java date pattern, e.g. `yyyy-MM-dd'T'HH:mm:ss`
        format: Option<String>,
        /// Tag the rule was written with
        tag: TimestampTag,
    },
    /// String must be a date in the given format
    Date {
        /// Java date pattern, e.g. `yyyy-MM-dd`
        format: Option<String>,
    },
    /// String must be a time in the given format
    Time {
        /// Java date pattern, e.g. `HH:mm:ss`
        format: Option<String>,
    },
    /// String must be a semantic version
    Semver,
    /// A rule kind this engine does not interpret
    Unsupported {
        /// Raw `pact:matcher:type` tag
        kind: String,
    },
}

impl MatchingRule {
    /// Integration JSON tag for this rule.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Equality => "equality",
            Self::Type { .. } => "type",
            Self::Regex { .. } => "regex",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::Include => "include",
            Self::Timestamp { tag, .. } => tag.as_str(),
            Self::Date { .. } => "date",
            Self::Time { .. } => "time",
            Self::Semver => "semver",
            Self::Unsupported { kind } => kind,
        }
    }

    /// Build a rule from its tag, consuming the attributes it understands.
    fn from_attributes(kind: &str, attributes: &mut Map<String, Value>) -> PactResult<Self> {
        let rule = match kind {
            "equality" => Self::Equality,
            "type" => Self::Type {
                min: take_count(attributes, "min")?,
                max: take_count(attributes, "max")?,
            },
            "regex" => Self::Regex {
                regex: take_string(attributes, "regex")?.ok_or_else(|| {
                    PactError::invalid_matcher("regex matcher requires a `regex` pattern")
                })?,
            },
            "integer" => Self::Integer,
            "decimal" => Self::Decimal,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "null" => Self::Null,
            "include" => Self::Include,
            "timestamp" => Self::Timestamp {
                format: take_string(attributes, "format")?,
                tag: TimestampTag::Timestamp,
            },
            "datetime" => Self::Timestamp {
                format: take_string(attributes, "format")?,
                tag: TimestampTag::DateTime,
            },
            "date" => Self::Date {
                format: take_string(attributes, "format")?,
            },
            "time" => Self::Time {
                format: take_string(attributes, "format")?,
            },
            "semver" => Self::Semver,
            other => Self::Unsupported {
                kind: other.to_string(),
            },
        };
        Ok(rule)
    }

    fn write_attributes(&self, map: &mut Map<String, Value>) {
        match self {
            Self::Type { min, max } => {
                if let Some(min) = min {
                    map.insert("min".to_string(), Value::from(*min));
                }
                if let Some(max) = max {
                    map.insert("max".to_string(), Value::from(*max));
                }
            }
            Self::Regex { regex } => {
                map.insert("regex".to_string(), Value::String(regex.clone()));
            }
            Self::Timestamp {
                format: Some(format),
                ..
            }
            | Self::Date { format: Some(format) }
            | Self::Time { format: Some(format) } => {
                map.insert("format".to_string(), Value::String(format.clone()));
            }
            _ => {}
        }
    }
}

/// Integration JSON tag of a [`MatchingRule::Timestamp`].
///
/// `timestamp` and `datetime` mean the same rule; the tag is kept so files
/// are written back as they were read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimestampTag {
    /// `timestamp`
    #[default]
    Timestamp,
    /// `datetime`
    DateTime,
}

impl TimestampTag {
    /// The tag as written in integration JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timestamp => "timestamp",
            Self::DateTime => "datetime",
        }
    }
}

/// Hint naming how a provider may generate the value at replay time.
///
/// Recorded verbatim; reification always prefers the example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generator {
    /// Raw `pact:generator:type` tag, e.g. `DateTime`
    pub kind: String,
}

/// A value annotated with exactly one matching rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matched {
    /// The rule the value must satisfy
    pub rule: MatchingRule,
    /// Example value demonstrating the rule
    pub example: Option<MatcherNode>,
    /// Optional generator hint
    pub generator: Option<Generator>,
    /// Attributes not interpreted by the rule, kept for round-tripping
    pub attributes: BTreeMap<String, Value>,
}

impl Matched {
    /// Create a matched value with an example.
    #[must_use]
    pub fn new(rule: MatchingRule, example: impl Into<MatcherNode>) -> Self {
        Self {
            rule,
            example: Some(example.into()),
            generator: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Attach a generator hint.
    #[must_use]
    pub fn with_generator(mut self, kind: impl Into<String>) -> Self {
        self.generator = Some(Generator { kind: kind.into() });
        self
    }

    fn from_json(kind: &str, mut map: Map<String, Value>) -> PactResult<Self> {
        map.remove(MATCHER_TYPE_KEY);
        let example = map.remove(VALUE_KEY).map(MatcherNode::from_json).transpose()?;
        let generator = match map.remove(GENERATOR_TYPE_KEY) {
            None => None,
            Some(Value::String(generator)) => Some(Generator { kind: generator }),
            Some(other) => {
                return Err(PactError::invalid_matcher(format!(
                    "{GENERATOR_TYPE_KEY} must be a string, found {other}"
                )));
            }
        };
        let rule = MatchingRule::from_attributes(kind, &mut map)?;
        Ok(Self {
            rule,
            example,
            generator,
            attributes: map.into_iter().collect(),
        })
    }

    fn to_json(&self) -> Value {
        let mut map: Map<String, Value> = self
            .attributes
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        self.rule.write_attributes(&mut map);
        map.insert(
            MATCHER_TYPE_KEY.to_string(),
            Value::String(self.rule.kind().to_string()),
        );
        if let Some(example) = &self.example {
            map.insert(VALUE_KEY.to_string(), example.to_json());
        }
        if let Some(generator) = &self.generator {
            map.insert(
                GENERATOR_TYPE_KEY.to_string(),
                Value::String(generator.kind.clone()),
            );
        }
        Value::Object(map)
    }
}

/// A node of a content tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatcherNode {
    /// JSON null
    Null,
    /// Boolean literal
    Bool(bool),
    /// Numeric literal
    Number(Number),
    /// String literal
    String(String),
    /// Ordered sequence
    Array(Vec<MatcherNode>),
    /// String-keyed mapping
    Object(BTreeMap<String, MatcherNode>),
    /// Value carrying a matching rule
    Matched(Box<Matched>),
}

impl MatcherNode {
    /// Parse a content tree from integration JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::InvalidMatcher`] when a matched node is malformed.
    pub fn from_json(value: Value) -> PactResult<Self> {
        let node = match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(
                items
                    .into_iter()
                    .map(Self::from_json)
                    .collect::<PactResult<_>>()?,
            ),
            Value::Object(map) => match map.get(MATCHER_TYPE_KEY) {
                Some(Value::String(kind)) => {
                    let kind = kind.clone();
                    Self::Matched(Box::new(Matched::from_json(&kind, map)?))
                }
                Some(other) => {
                    return Err(PactError::invalid_matcher(format!(
                        "{MATCHER_TYPE_KEY} must be a string, found {other}"
                    )));
                }
                None => Self::Object(
                    map.into_iter()
                        .map(|(key, value)| Ok((key, Self::from_json(value)?)))
                        .collect::<PactResult<_>>()?,
                ),
            },
        };
        Ok(node)
    }

    /// Render the tree as integration JSON, matchers included.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
            Self::Matched(matched) => matched.to_json(),
        }
    }

    /// True when no node of the tree carries a matching rule.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        match self {
            Self::Array(items) => items.iter().all(Self::is_literal),
            Self::Object(map) => map.values().all(Self::is_literal),
            Self::Matched(_) => false,
            _ => true,
        }
    }
}

impl TryFrom<Value> for MatcherNode {
    type Error = PactError;

    fn try_from(value: Value) -> PactResult<Self> {
        Self::from_json(value)
    }
}

impl From<&MatcherNode> for Value {
    fn from(node: &MatcherNode) -> Self {
        node.to_json()
    }
}

impl Serialize for MatcherNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MatcherNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(value).map_err(D::Error::custom)
    }
}

impl From<Matched> for MatcherNode {
    fn from(matched: Matched) -> Self {
        Self::Matched(Box::new(matched))
    }
}

impl From<&str> for MatcherNode {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for MatcherNode {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for MatcherNode {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for MatcherNode {
    fn from(n: i32) -> Self {
        Self::Number(n.into())
    }
}

impl From<i64> for MatcherNode {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<u32> for MatcherNode {
    fn from(n: u32) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for MatcherNode {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<f64> for MatcherNode {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Self::Null, Self::Number)
    }
}

impl From<Vec<Self>> for MatcherNode {
    fn from(items: Vec<Self>) -> Self {
        Self::Array(items)
    }
}

impl From<BTreeMap<String, Self>> for MatcherNode {
    fn from(map: BTreeMap<String, Self>) -> Self {
        Self::Object(map)
    }
}

fn take_string(attributes: &mut Map<String, Value>, key: &str) -> PactResult<Option<String>> {
    match attributes.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(PactError::invalid_matcher(format!(
            "`{key}` must be a string, found {other}"
        ))),
    }
}

fn take_count(attributes: &mut Map<String, Value>, key: &str) -> PactResult<Option<usize>> {
    match attributes.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                PactError::invalid_matcher(format!("`{key}` must be a non-negative integer"))
            }),
        Some(other) => Err(PactError::invalid_matcher(format!(
            "`{key}` must be a non-negative integer, found {other}"
        ))),
    }
}

fn matched(rule: MatchingRule, example: impl Into<MatcherNode>) -> MatcherNode {
    Matched::new(rule, example).into()
}

/// Value of the same type as the example.
pub fn like(example: impl Into<MatcherNode>) -> MatcherNode {
    matched(MatchingRule::Type { min: None, max: None }, example)
}

/// Array whose elements are each like `example`, with at least `min` items.
pub fn each_like(example: impl Into<MatcherNode>, min: usize) -> MatcherNode {
    matched(
        MatchingRule::Type {
            min: Some(min),
            max: None,
        },
        MatcherNode::Array(vec![example.into()]),
    )
}

/// Array whose elements are each like `example`, with `min..=max` items.
pub fn each_like_between(example: impl Into<MatcherNode>, min: usize, max: usize) -> MatcherNode {
    matched(
        MatchingRule::Type {
            min: Some(min),
            max: Some(max),
        },
        MatcherNode::Array(vec![example.into()]),
    )
}

/// String matching `pattern`; `example` must satisfy it.
pub fn regex(example: impl Into<String>, pattern: impl Into<String>) -> MatcherNode {
    matched(
        MatchingRule::Regex {
            regex: pattern.into(),
        },
        MatcherNode::String(example.into()),
    )
}

/// Any integer.
pub fn integer(example: i64) -> MatcherNode {
    matched(MatchingRule::Integer, example)
}

/// Any decimal number.
pub fn decimal(example: f64) -> MatcherNode {
    matched(MatchingRule::Decimal, example)
}

/// Any number.
pub fn number(example: impl Into<MatcherNode>) -> MatcherNode {
    matched(MatchingRule::Number, example)
}

/// Any boolean.
pub fn boolean(example: bool) -> MatcherNode {
    matched(MatchingRule::Boolean, example)
}

/// Null.
pub fn null_value() -> MatcherNode {
    matched(MatchingRule::Null, MatcherNode::Null)
}

/// Exactly the example.
pub fn equality(example: impl Into<MatcherNode>) -> MatcherNode {
    matched(MatchingRule::Equality, example)
}

/// String containing `substring`.
pub fn includes(substring: impl Into<String>) -> MatcherNode {
    matched(MatchingRule::Include, MatcherNode::String(substring.into()))
}

/// Timestamp in the given Java date pattern.
pub fn timestamp(format: impl Into<String>, example: impl Into<String>) -> MatcherNode {
    matched(
        MatchingRule::Timestamp {
            format: Some(format.into()),
            tag: TimestampTag::Timestamp,
        },
        MatcherNode::String(example.into()),
    )
}

/// Date in the given Java date pattern.
pub fn date(format: impl Into<String>, example: impl Into<String>) -> MatcherNode {
    matched(
        MatchingRule::Date {
            format: Some(format.into()),
        },
        MatcherNode::String(example.into()),
    )
}

/// Time in the given Java date pattern.
pub fn time(format: impl Into<String>, example: impl Into<String>) -> MatcherNode {
    matched(
        MatchingRule::Time {
            format: Some(format.into()),
        },
        MatcherNode::String(example.into()),
    )
}

/// Semantic version string.
pub fn semver(example: impl Into<String>) -> MatcherNode {
    matched(MatchingRule::Semver, MatcherNode::String(example.into()))
}
