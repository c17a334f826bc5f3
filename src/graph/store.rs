//! In-memory graph map
//!
//! The map aggregates two collections:
//! - nodes: key -> node, with tag and unique alternate indexes
//! - edges: (from, to, type) -> edge, with from/to/type/tag indexes
//!
//! Mutations go through [`GraphMap`] so cross-collection rules hold: an edge needs
//! both endpoints present, and removing a node removes every edge touching it.
//! The map does no locking of its own; callers hold it behind the engine's
//! reader/writer lock.

use super::edge::GraphEdge;
use super::edge_index::EdgeIndex;
use super::node::GraphNode;
use super::node_index::NodeIndex;
use super::types::EdgeKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during graph operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Node {0} not found")]
    NodeNotFound(String),

    #[error("Node {0} already exists")]
    NodeAlreadyExists(String),

    #[error("Edge {0} not found")]
    EdgeNotFound(EdgeKey),

    #[error("Edge {0} already exists")]
    EdgeAlreadyExists(EdgeKey),

    #[error("Invalid edge: source node {0} does not exist")]
    InvalidEdgeSource(String),

    #[error("Invalid edge: target node {0} does not exist")]
    InvalidEdgeTarget(String),

    #[error("Index {index} already maps value {value} to node {owner}")]
    IndexConflict {
        index: String,
        value: String,
        owner: String,
    },
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Serialized form of the map: nodes and edges sorted by key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// In-memory graph storage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "GraphSnapshot", try_from = "GraphSnapshot")]
pub struct GraphMap {
    nodes: NodeIndex,
    edges: EdgeIndex,
}

impl GraphMap {
    /// Create a new empty graph map
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &NodeIndex {
        &self.nodes
    }

    pub fn edges(&self) -> &EdgeIndex {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Add a node; fails if the key exists or an indexed value is taken
    pub fn add_node(&mut self, node: GraphNode) -> GraphResult<()> {
        self.nodes.insert(node)
    }

    /// Replace an existing node, returning the previous version
    pub fn set_node(&mut self, node: GraphNode) -> GraphResult<GraphNode> {
        self.nodes.replace(node)
    }

    /// Remove a node and every edge touching it.
    ///
    /// Returns the node and the removed edges in the order they were removed.
    pub fn remove_node(&mut self, key: &str) -> GraphResult<(GraphNode, Vec<GraphEdge>)> {
        if !self.nodes.contains_key(key) {
            return Err(GraphError::NodeNotFound(key.to_string()));
        }

        let edges: Vec<GraphEdge> = self
            .edges
            .keys_touching(key)
            .iter()
            .filter_map(|edge_key| self.edges.remove(edge_key))
            .collect();

        let node = self
            .nodes
            .remove(key)
            .ok_or_else(|| GraphError::NodeNotFound(key.to_string()))?;
        Ok((node, edges))
    }

    /// Add an edge between two existing nodes
    pub fn add_edge(&mut self, edge: GraphEdge) -> GraphResult<()> {
        if !self.nodes.contains_key(&edge.from_key) {
            return Err(GraphError::InvalidEdgeSource(edge.from_key));
        }
        if !self.nodes.contains_key(&edge.to_key) {
            return Err(GraphError::InvalidEdgeTarget(edge.to_key));
        }
        self.edges.insert(edge)
    }

    /// Replace an existing edge, returning the previous version
    pub fn set_edge(&mut self, edge: GraphEdge) -> GraphResult<GraphEdge> {
        self.edges.replace(edge)
    }

    pub fn remove_edge(&mut self, key: &EdgeKey) -> GraphResult<GraphEdge> {
        self.edges
            .remove(key)
            .ok_or_else(|| GraphError::EdgeNotFound(key.clone()))
    }

    /// Put a node back exactly as given, bypassing validation (rollback)
    pub(crate) fn restore_node(&mut self, node: GraphNode) {
        self.nodes.restore(node);
    }

    /// Put an edge back exactly as given, bypassing validation (rollback)
    pub(crate) fn restore_edge(&mut self, edge: GraphEdge) {
        self.edges.restore(edge);
    }

    /// Drop a node without touching its edges (rollback)
    pub(crate) fn discard_node(&mut self, key: &str) -> Option<GraphNode> {
        self.nodes.remove(key)
    }

    /// Drop an edge (rollback)
    pub(crate) fn discard_edge(&mut self, key: &EdgeKey) -> Option<GraphEdge> {
        self.edges.remove(key)
    }

    /// Clear all nodes and edges
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }

    /// Sorted snapshot of every node and edge
    pub fn snapshot(&self) -> GraphSnapshot {
        let mut nodes: Vec<GraphNode> = self.nodes.iter().cloned().collect();
        nodes.sort_by(|a, b| a.key.cmp(&b.key));

        let mut edges: Vec<GraphEdge> = self.edges.iter().cloned().collect();
        edges.sort_by_key(|e| e.key());

        GraphSnapshot { nodes, edges }
    }

    /// Rebuild a map and all of its indexes from a snapshot
    pub fn from_snapshot(snapshot: GraphSnapshot) -> GraphResult<Self> {
        let mut map = GraphMap::new();
        for node in snapshot.nodes {
            map.add_node(node)?;
        }
        for edge in snapshot.edges {
            map.add_edge(edge)?;
        }
        Ok(map)
    }
}

impl From<GraphMap> for GraphSnapshot {
    fn from(map: GraphMap) -> Self {
        map.snapshot()
    }
}

impl TryFrom<GraphSnapshot> for GraphMap {
    type Error = GraphError;

    fn try_from(snapshot: GraphSnapshot) -> GraphResult<Self> {
        GraphMap::from_snapshot(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Tags;

    fn tags(items: &[(&str, Option<&str>)]) -> Tags {
        items.iter().copied().collect()
    }

    fn sample_map() -> GraphMap {
        let mut map = GraphMap::new();
        map.add_node(GraphNode::with_tags("alice", tags(&[("name", Some("Alice")), ("person", None)])))
            .unwrap();
        map.add_node(GraphNode::with_tags("bob", tags(&[("name", Some("Bob")), ("person", None)])))
            .unwrap();
        map.add_node(GraphNode::with_tags("acme", tags(&[("company", None)])))
            .unwrap();
        map.add_edge(GraphEdge::new("alice", "bob", "knows")).unwrap();
        map.add_edge(GraphEdge::new("alice", "acme", "works_at")).unwrap();
        map.add_edge(GraphEdge::new("bob", "acme", "works_at")).unwrap();
        map
    }

    #[test]
    fn test_add_and_get_node() {
        let map = sample_map();
        assert_eq!(map.node_count(), 3);
        assert_eq!(map.nodes().get("alice").unwrap().tags.value("name"), Some("Alice"));
        assert!(map.nodes().get("carol").is_none());
    }

    #[test]
    fn test_duplicate_node() {
        let mut map = sample_map();
        let result = map.add_node(GraphNode::new("alice"));
        assert_eq!(result, Err(GraphError::NodeAlreadyExists("alice".to_string())));
    }

    #[test]
    fn test_edge_validation() {
        let mut map = sample_map();
        assert_eq!(
            map.add_edge(GraphEdge::new("ghost", "bob", "knows")),
            Err(GraphError::InvalidEdgeSource("ghost".to_string()))
        );
        assert_eq!(
            map.add_edge(GraphEdge::new("bob", "ghost", "knows")),
            Err(GraphError::InvalidEdgeTarget("ghost".to_string()))
        );

        let duplicate = map.add_edge(GraphEdge::new("alice", "bob", "knows"));
        assert!(matches!(duplicate, Err(GraphError::EdgeAlreadyExists(_))));

        // Same endpoints, different type is a different edge
        assert!(map.add_edge(GraphEdge::new("alice", "bob", "follows")).is_ok());
    }

    #[test]
    fn test_adjacency_indexes() {
        let map = sample_map();
        assert_eq!(map.edges().edges_from("alice").len(), 2);
        assert_eq!(map.edges().edges_to("acme").len(), 2);
        assert_eq!(map.edges().edges_to("alice").len(), 0);
        assert_eq!(map.edges().edges_of_type("works_at").len(), 2);
        assert_eq!(map.edges().edges_of_type("work*").len(), 2);
        assert_eq!(map.edges().edges_of_type("*").len(), 3);
    }

    #[test]
    fn test_tag_index() {
        let map = sample_map();
        assert_eq!(map.nodes().lookup_tags(&tags(&[("person", None)])).len(), 2);
        assert_eq!(map.nodes().lookup_tags(&tags(&[("name", Some("B*"))])).len(), 1);
        assert_eq!(map.nodes().lookup_tags(&tags(&[("person", None), ("company", None)])).len(), 0);
    }

    #[test]
    fn test_lookup_key_pattern() {
        let map = sample_map();
        assert_eq!(map.nodes().lookup_key("alice").len(), 1);
        assert_eq!(map.nodes().lookup_key("a*").len(), 2);
        assert_eq!(map.nodes().lookup_key("zed").len(), 0);
    }

    #[test]
    fn test_remove_node_cascades_edges() {
        let mut map = sample_map();
        let (node, edges) = map.remove_node("alice").unwrap();
        assert_eq!(node.key, "alice");
        assert_eq!(edges.len(), 2);
        assert_eq!(map.node_count(), 2);
        assert_eq!(map.edge_count(), 1);
        assert!(map.edges().edges_to("bob").is_empty());
        assert!(map.nodes().lookup_tags(&tags(&[("name", Some("Alice"))])).is_empty());

        assert_eq!(
            map.remove_node("alice").unwrap_err(),
            GraphError::NodeNotFound("alice".to_string())
        );
    }

    #[test]
    fn test_set_node_reindexes_tags() {
        let mut map = sample_map();
        let updated = GraphNode::with_tags("bob", tags(&[("name", Some("Robert"))]));
        let previous = map.set_node(updated).unwrap();
        assert_eq!(previous.tags.value("name"), Some("Bob"));

        assert_eq!(map.nodes().lookup_tags(&tags(&[("person", None)])).len(), 1);
        assert_eq!(map.nodes().lookup_tags(&tags(&[("name", Some("Robert"))])).len(), 1);
        assert!(map.set_node(GraphNode::new("ghost")).is_err());
    }

    #[test]
    fn test_unique_index() {
        let mut map = GraphMap::new();
        let mut a = GraphNode::with_tags("a", tags(&[("email", Some("x@y.com"))]));
        a.indexes.insert("email".to_string());
        map.add_node(a).unwrap();

        let mut b = GraphNode::with_tags("b", tags(&[("email", Some("x@y.com"))]));
        b.indexes.insert("email".to_string());
        assert!(matches!(map.add_node(b.clone()), Err(GraphError::IndexConflict { .. })));

        assert_eq!(map.nodes().lookup_index("email", "x@y.com").unwrap().key, "a");
        map.remove_node("a").unwrap();
        assert!(map.nodes().lookup_index("email", "x@y.com").is_none());
        assert!(map.add_node(b).is_ok());
    }

    #[test]
    fn test_remove_edge() {
        let mut map = sample_map();
        let key = EdgeKey::new("alice", "bob", "knows");
        assert!(map.remove_edge(&key).is_ok());
        assert!(map.edges().edges_from("alice").iter().all(|e| e.to_key != "bob"));
        assert_eq!(map.remove_edge(&key), Err(GraphError::EdgeNotFound(key)));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let map = sample_map();
        let json = serde_json::to_string(&map).unwrap();
        let restored: GraphMap = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, map);
        assert_eq!(restored.snapshot(), map.snapshot());
    }

    #[test]
    fn test_clear() {
        let mut map = sample_map();
        map.clear();
        assert_eq!(map.node_count(), 0);
        assert_eq!(map.edge_count(), 0);
        assert!(map.nodes().lookup_tags(&tags(&[("person", None)])).is_empty());
    }
}
