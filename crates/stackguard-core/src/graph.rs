//! Resource graph model and the graph source contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::Result;

/// A discovered cloud resource (a node in the resource graph)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Stable identifier (ARN, resource ID, ...)
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Normalized resource type (e.g. "storage", "database", "compute")
    #[serde(rename = "type")]
    pub resource_type: String,

    /// Cloud provider (aws, gcp, azure, ...)
    #[serde(default)]
    pub provider: String,

    /// Region the resource lives in
    #[serde(default)]
    pub region: String,

    /// Owning account or project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    /// Resource tags / labels
    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    /// Provider-specific attributes collected during discovery
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Resource {
    /// Create a resource with the given identity
    pub fn new(
        id: impl Into<String>,
        resource_type: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            resource_type: resource_type.into(),
            provider: provider.into(),
            region: String::new(),
            account: None,
            tags: BTreeMap::new(),
            metadata: Map::new(),
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the region
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Add a metadata attribute
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A typed relationship between two resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Source resource id
    pub source: String,

    /// Target resource id
    pub target: String,

    /// Relationship kind (e.g. "encrypted-by", "logs-to", "in-vpc")
    pub relationship_type: String,
}

impl Edge {
    /// Create a new edge
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relationship_type: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relationship_type: relationship_type.into(),
        }
    }

    /// The endpoint opposite to `id`, if `id` is one of the endpoints
    pub fn other_end(&self, id: &str) -> Option<&str> {
        if self.source == id {
            Some(&self.target)
        } else if self.target == id {
            Some(&self.source)
        } else {
            None
        }
    }
}

/// Which edges to return for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EdgeDirection {
    /// Edges pointing at the node
    Incoming,
    /// Edges leaving the node
    Outgoing,
    /// Both directions
    #[default]
    Both,
}

/// Filter used when querying resources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeFilter {
    /// Restrict to one provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Restrict to these resource types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_types: Option<Vec<String>>,

    /// Restrict to one region
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Restrict to one account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

impl NodeFilter {
    /// Filter matching every resource
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a provider
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Restrict to resource types
    pub fn resource_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Whether a resource passes this filter
    pub fn matches(&self, resource: &Resource) -> bool {
        if let Some(provider) = &self.provider {
            if &resource.provider != provider {
                return false;
            }
        }
        if let Some(types) = &self.resource_types {
            if !types.iter().any(|t| t == &resource.resource_type) {
                return false;
            }
        }
        if let Some(region) = &self.region {
            if &resource.region != region {
                return false;
            }
        }
        if let Some(account) = &self.account {
            if resource.account.as_ref() != Some(account) {
                return false;
            }
        }
        true
    }
}

/// Read access to a resource graph
///
/// Storage and traversal live outside this workspace; implementors adapt
/// their graph store to these three queries.
#[async_trait]
pub trait GraphSource: Send + Sync {
    /// Resources matching the filter
    async fn query_nodes(&self, filter: &NodeFilter) -> Result<Vec<Resource>>;

    /// Edges attached to a node
    async fn get_edges_for_node(&self, id: &str, direction: EdgeDirection) -> Result<Vec<Edge>>;

    /// Look up a single node
    async fn get_node(&self, id: &str) -> Result<Option<Resource>>;
}

/// Vector-backed graph source
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraph {
    nodes: Vec<Resource>,
    edges: Vec<Edge>,
}

impl InMemoryGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource
    pub fn add_node(&mut self, resource: Resource) {
        self.nodes.push(resource);
    }

    /// Add an edge
    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    /// Builder-style resource insertion
    pub fn with_node(mut self, resource: Resource) -> Self {
        self.add_node(resource);
        self
    }

    /// Builder-style edge insertion
    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.add_edge(edge);
        self
    }

    /// Number of resources
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[async_trait]
impl GraphSource for InMemoryGraph {
    async fn query_nodes(&self, filter: &NodeFilter) -> Result<Vec<Resource>> {
        Ok(self
            .nodes
            .iter()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect())
    }

    async fn get_edges_for_node(&self, id: &str, direction: EdgeDirection) -> Result<Vec<Edge>> {
        Ok(self
            .edges
            .iter()
            .filter(|e| match direction {
                EdgeDirection::Incoming => e.target == id,
                EdgeDirection::Outgoing => e.source == id,
                EdgeDirection::Both => e.source == id || e.target == id,
            })
            .cloned()
            .collect())
    }

    async fn get_node(&self, id: &str) -> Result<Option<Resource>> {
        Ok(self.nodes.iter().find(|n| n.id == id).cloned())
    }
}
