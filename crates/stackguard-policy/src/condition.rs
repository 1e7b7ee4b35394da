//! Condition tree definitions and evaluation

use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::flatten::{scalar_to_string, FlatRecord, ResourceView};

/// Upper bound on compiled regex size for `field_matches`
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Distinct patterns kept compiled before the cache is reset
const REGEX_CACHE_CAPACITY: usize = 1024;

/// One node of a boolean condition tree over a flattened record
///
/// Field operands are dot-paths into the flattened input. Evaluation is pure
/// and total: unresolved paths are treated as absent, and malformed regex
/// patterns never match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Field equals a value
    FieldEquals { field: String, value: Value },

    /// Field does not equal a value (true when the field is absent)
    FieldNotEquals { field: String, value: Value },

    /// Substring match on strings, membership on arrays
    FieldContains { field: String, value: Value },

    /// Regex match against the field's text
    FieldMatches { field: String, pattern: String },

    /// Numeric comparisons
    FieldGt { field: String, value: f64 },
    FieldLt { field: String, value: f64 },
    FieldGte { field: String, value: f64 },
    FieldLte { field: String, value: f64 },

    /// Field resolves
    FieldExists { field: String },

    /// Field does not resolve
    FieldNotExists { field: String },

    /// Field equals one of the listed values
    FieldIn { field: String, values: Vec<Value> },

    /// Field equals none of the listed values (true when absent)
    FieldNotIn { field: String, values: Vec<Value> },

    /// Array length or object key count comparison
    FieldSize {
        field: String,
        op: SizeOp,
        value: usize,
    },

    /// Resource tag is absent or empty
    TagMissing { tag: String },

    /// Resource tag equals a value, or is present when no value is given
    TagEquals {
        tag: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },

    /// Resource type check
    ResourceType { value: String },

    /// Provider check
    Provider { value: String },

    /// Region check
    Region { value: String },

    /// All sub-conditions hold (true when empty)
    And { conditions: Vec<Condition> },

    /// Any sub-condition holds (false when empty)
    Or { conditions: Vec<Condition> },

    /// Negation
    Not { condition: Box<Condition> },

    /// Placeholder for checks evaluated elsewhere; always true
    Custom {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

/// Comparison operator for `field_size`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeOp {
    #[serde(alias = "==")]
    Eq,
    #[serde(alias = "!=")]
    Ne,
    #[serde(alias = ">")]
    Gt,
    #[serde(alias = ">=")]
    Gte,
    #[serde(alias = "<")]
    Lt,
    #[serde(alias = "<=")]
    Lte,
}

impl SizeOp {
    fn compare(self, actual: usize, expected: usize) -> bool {
        match self {
            Self::Eq => actual == expected,
            Self::Ne => actual != expected,
            Self::Gt => actual > expected,
            Self::Gte => actual >= expected,
            Self::Lt => actual < expected,
            Self::Lte => actual <= expected,
        }
    }
}

impl Condition {
    /// `field_equals` shorthand
    pub fn field_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::FieldEquals {
            field: field.into(),
            value: value.into(),
        }
    }

    /// `field_gt` shorthand
    pub fn field_gt(field: impl Into<String>, value: f64) -> Self {
        Self::FieldGt {
            field: field.into(),
            value,
        }
    }

    /// `field_exists` shorthand
    pub fn field_exists(field: impl Into<String>) -> Self {
        Self::FieldExists {
            field: field.into(),
        }
    }

    /// `tag_missing` shorthand
    pub fn tag_missing(tag: impl Into<String>) -> Self {
        Self::TagMissing { tag: tag.into() }
    }

    /// `and` shorthand
    pub fn and(conditions: Vec<Condition>) -> Self {
        Self::And { conditions }
    }

    /// `or` shorthand
    pub fn or(conditions: Vec<Condition>) -> Self {
        Self::Or { conditions }
    }

    /// `not` shorthand
    pub fn negate(condition: Condition) -> Self {
        Self::Not {
            condition: Box::new(condition),
        }
    }

    /// Evaluate against a flattened record and optional resource view
    pub fn evaluate(&self, data: &FlatRecord<'_>, resource: Option<&ResourceView>) -> bool {
        match self {
            Self::FieldEquals { field, value } => {
                data.get(field).is_some_and(|actual| loose_eq(actual, value))
            }
            Self::FieldNotEquals { field, value } => {
                !data.get(field).is_some_and(|actual| loose_eq(actual, value))
            }
            Self::FieldContains { field, value } => match data.get(field) {
                Some(Value::String(text)) => value.as_str().is_some_and(|needle| text.contains(needle)),
                Some(Value::Array(items)) => items.iter().any(|item| loose_eq(item, value)),
                _ => false,
            },
            Self::FieldMatches { field, pattern } => data
                .get(field)
                .and_then(scalar_to_string)
                .is_some_and(|text| regex_matches(pattern, &text)),
            Self::FieldGt { field, value } => numeric(data, field).is_some_and(|n| n > *value),
            Self::FieldLt { field, value } => numeric(data, field).is_some_and(|n| n < *value),
            Self::FieldGte { field, value } => numeric(data, field).is_some_and(|n| n >= *value),
            Self::FieldLte { field, value } => numeric(data, field).is_some_and(|n| n <= *value),
            Self::FieldExists { field } => data.get(field).is_some_and(|v| !v.is_null()),
            Self::FieldNotExists { field } => data.get(field).map_or(true, Value::is_null),
            Self::FieldIn { field, values } => data
                .get(field)
                .is_some_and(|actual| values.iter().any(|v| loose_eq(actual, v))),
            Self::FieldNotIn { field, values } => !data
                .get(field)
                .is_some_and(|actual| values.iter().any(|v| loose_eq(actual, v))),
            Self::FieldSize { field, op, value } => {
                let size = match data.get(field) {
                    Some(Value::Array(items)) => items.len(),
                    Some(Value::Object(map)) => map.len(),
                    _ => return false,
                };
                op.compare(size, *value)
            }
            Self::TagMissing { tag } => resource
                .and_then(|r| r.tags.get(tag))
                .map_or(true, |v| v.is_empty()),
            Self::TagEquals { tag, value } => {
                match (resource.and_then(|r| r.tags.get(tag)), value) {
                    (Some(actual), Some(expected)) => actual == expected,
                    (Some(_), None) => true,
                    (None, _) => false,
                }
            }
            Self::ResourceType { value } => {
                resource.and_then(|r| r.resource_type.as_ref()) == Some(value)
            }
            Self::Provider { value } => resource.and_then(|r| r.provider.as_ref()) == Some(value),
            Self::Region { value } => resource.and_then(|r| r.region.as_ref()) == Some(value),
            Self::And { conditions } => conditions.iter().all(|c| c.evaluate(data, resource)),
            Self::Or { conditions } => conditions.iter().any(|c| c.evaluate(data, resource)),
            Self::Not { condition } => !condition.evaluate(data, resource),
            Self::Custom { .. } => true,
        }
    }
}

/// Evaluate a condition; free-function form of [`Condition::evaluate`]
pub fn evaluate(condition: &Condition, data: &FlatRecord<'_>, resource: Option<&ResourceView>) -> bool {
    condition.evaluate(data, resource)
}

/// Equality that treats numerically equal numbers as equal (`1 == 1.0`)
pub(crate) fn loose_eq(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => actual == expected,
    }
}

fn numeric(data: &FlatRecord<'_>, field: &str) -> Option<f64> {
    match data.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn regex_matches(pattern: &str, text: &str) -> bool {
    compiled_pattern(pattern).is_some_and(|re| re.is_match(text))
}

/// Compile `pattern` once and reuse it; invalid patterns are cached as `None`
fn compiled_pattern(pattern: &str) -> Option<Regex> {
    static CACHE: OnceLock<Mutex<HashMap<String, Option<Regex>>>> = OnceLock::new();
    let cache = CACHE.get_or_init(Default::default);

    if let Some(hit) = cache.lock().get(pattern) {
        return hit.clone();
    }

    let built = match RegexBuilder::new(pattern).size_limit(REGEX_SIZE_LIMIT).build() {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::debug!(pattern = %pattern, error = %e, "Invalid regex in condition, treating as non-match");
            None
        }
    };

    let mut cache = cache.lock();
    if cache.len() >= REGEX_CACHE_CAPACITY {
        cache.clear();
    }
    cache.insert(pattern.to_string(), built.clone());
    built
}
