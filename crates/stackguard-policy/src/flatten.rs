//! Dot-path flattening of nested input records

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use stackguard_core::Resource;

/// Default recursion limit for [`flatten`]
pub const DEFAULT_MAX_DEPTH: usize = 20;

/// A nested record addressed by dot-paths
///
/// Every intermediate object and array is stored as a peer entry, so both
/// `resource.tags` and `resource.tags.env` resolve. Array elements are
/// addressed by index (`items.0`).
#[derive(Debug, Clone, Default)]
pub struct FlatRecord<'a> {
    entries: HashMap<String, &'a Value>,
}

impl<'a> FlatRecord<'a> {
    /// Look up a dot-path
    pub fn get(&self, path: &str) -> Option<&'a Value> {
        self.entries.get(path).copied()
    }

    /// Whether a dot-path resolves
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Number of addressable paths
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is addressable
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All addressable paths
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Flatten a record with the default depth guard
pub fn flatten(value: &Value) -> FlatRecord<'_> {
    flatten_with_depth(value, DEFAULT_MAX_DEPTH)
}

/// Flatten a record, leaving paths deeper than `max_depth` segments unresolved
pub fn flatten_with_depth(value: &Value, max_depth: usize) -> FlatRecord<'_> {
    let mut entries = HashMap::new();
    walk("", value, 1, max_depth, &mut entries);
    FlatRecord { entries }
}

fn walk<'a>(
    prefix: &str,
    value: &'a Value,
    depth: usize,
    max_depth: usize,
    out: &mut HashMap<String, &'a Value>,
) {
    if depth > max_depth {
        return;
    }

    let children: Box<dyn Iterator<Item = (String, &'a Value)> + 'a> = match value {
        Value::Object(map) => Box::new(map.iter().map(|(k, v)| (k.clone(), v))),
        Value::Array(items) => Box::new(items.iter().enumerate().map(|(i, v)| (i.to_string(), v))),
        _ => return,
    };

    for (key, child) in children {
        let path = if prefix.is_empty() {
            key
        } else {
            format!("{}.{}", prefix, key)
        };

        if matches!(child, Value::Object(_) | Value::Array(_)) {
            walk(&path, child, depth + 1, max_depth, out);
        }
        out.insert(path, child);
    }
}

/// The fixed resource attributes some conditions read directly
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceView {
    /// Resource type
    pub resource_type: Option<String>,

    /// Cloud provider
    pub provider: Option<String>,

    /// Region
    pub region: Option<String>,

    /// Tag map
    pub tags: BTreeMap<String, String>,
}

impl ResourceView {
    /// Extract the resource view from an input record
    ///
    /// Reads the nested `resource` object when present, otherwise the record
    /// itself. The type is taken from `type` or `resourceType`.
    pub fn from_record(record: &Value) -> Self {
        let source = match record.get("resource") {
            Some(resource @ Value::Object(_)) => resource,
            _ => record,
        };

        let text = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| source.get(*k).and_then(Value::as_str))
                .map(str::to_string)
        };

        let tags = source
            .get("tags")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| scalar_to_string(v).map(|s| (k.clone(), s)))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            resource_type: text(&["type", "resourceType", "resource_type"]),
            provider: text(&["provider"]),
            region: text(&["region"]),
            tags,
        }
    }
}

impl From<&Resource> for ResourceView {
    fn from(resource: &Resource) -> Self {
        Self {
            resource_type: Some(resource.resource_type.clone()),
            provider: Some(resource.provider.clone()),
            region: Some(resource.region.clone()),
            tags: resource.tags.clone(),
        }
    }
}

/// Render a scalar JSON value as plain text
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
