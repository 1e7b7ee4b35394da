//! Read-only snapshot of a resource and its direct relationships

use serde_json::{Map, Value};
use stackguard_core::{Edge, EdgeDirection, GraphSource, Resource, Result};
use std::collections::{BTreeMap, BTreeSet};

/// What a control sees when it evaluates one resource
#[derive(Debug, Clone)]
pub struct ControlEvaluationContext {
    pub node: Resource,
    pub tags: BTreeMap<String, String>,
    pub metadata: Map<String, Value>,

    /// Resources at the other end of this node's edges
    pub neighbors: Vec<Resource>,
    pub edges: Vec<Edge>,

    /// Normalised relationship types of `edges`
    pub edge_types: BTreeSet<String>,
}

impl ControlEvaluationContext {
    /// Snapshot a resource with no relationships
    pub fn new(node: Resource) -> Self {
        Self {
            tags: node.tags.clone(),
            metadata: node.metadata.clone(),
            node,
            neighbors: Vec::new(),
            edges: Vec::new(),
            edge_types: BTreeSet::new(),
        }
    }

    /// Attach edges and neighbours
    pub fn with_relationships(mut self, edges: Vec<Edge>, neighbors: Vec<Resource>) -> Self {
        self.edge_types = edges.iter().map(|e| normalize_edge_type(&e.relationship_type)).collect();
        self.edges = edges;
        self.neighbors = neighbors;
        self
    }

    /// Fetch the resource's edges and neighbours from the graph
    pub async fn build(graph: &dyn GraphSource, node: &Resource) -> Result<Self> {
        let edges = graph.get_edges_for_node(&node.id, EdgeDirection::Both).await?;

        let mut seen = BTreeSet::new();
        let mut neighbors = Vec::new();
        for edge in &edges {
            let Some(other) = edge.other_end(&node.id) else {
                continue;
            };
            if other == node.id || !seen.insert(other.to_string()) {
                continue;
            }
            if let Some(neighbor) = graph.get_node(other).await? {
                neighbors.push(neighbor);
            }
        }

        Ok(Self::new(node.clone()).with_relationships(edges, neighbors))
    }

    /// Whether the node has an edge of this relationship type
    ///
    /// Matching ignores case and treats `_` and `-` alike.
    pub fn has_edge(&self, relationship_type: &str) -> bool {
        self.edge_types.contains(&normalize_edge_type(relationship_type))
    }

    /// Tag value, if set
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Whether any neighbour's type contains `fragment`
    pub fn has_neighbor_type(&self, fragment: &str) -> bool {
        let fragment = fragment.to_ascii_lowercase();
        self.neighbors
            .iter()
            .any(|n| n.resource_type.to_ascii_lowercase().contains(&fragment))
    }
}

fn normalize_edge_type(relationship_type: &str) -> String {
    relationship_type.trim().to_ascii_lowercase().replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackguard_core::InMemoryGraph;

    #[tokio::test]
    async fn test_build_collects_neighbors_once() {
        let graph = InMemoryGraph::new()
            .with_node(Resource::new("db", "rds_instance", "aws"))
            .with_node(Resource::new("key", "kms_key", "aws"))
            .with_node(Resource::new("vpc", "vpc", "aws"))
            .with_edge(Edge::new("db", "key", "ENCRYPTED_BY"))
            .with_edge(Edge::new("db", "vpc", "in-vpc"))
            .with_edge(Edge::new("vpc", "db", "contains"))
            .with_edge(Edge::new("db", "ghost", "logs-to"));

        let node = graph.get_node("db").await.unwrap().unwrap();
        let ctx = ControlEvaluationContext::build(&graph, &node).await.unwrap();

        assert_eq!(ctx.edges.len(), 4);
        assert_eq!(ctx.neighbors.len(), 2);
        assert!(ctx.has_edge("encrypted-by"));
        assert!(ctx.has_edge("IN_VPC"));
        assert!(ctx.has_edge("logs-to"));
        assert!(!ctx.has_edge("backed-up-by"));
        assert!(ctx.has_neighbor_type("KMS"));
    }
}
