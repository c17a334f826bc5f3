//! Edge implementation for the graph map
//!
//! Edges are directed and typed; (from key, to key, edge type) is the primary key,
//! so at most one edge of a given type links two nodes in the same direction.

use super::tags::Tags;
use super::types::EdgeKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A directed edge in the graph map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Edge goes FROM this node
    pub from_key: String,

    /// Edge goes TO this node
    pub to_key: String,

    pub edge_type: String,

    #[serde(default)]
    pub tags: Tags,

    pub created_date: DateTime<Utc>,
}

impl GraphEdge {
    pub fn new(
        from_key: impl Into<String>,
        to_key: impl Into<String>,
        edge_type: impl Into<String>,
    ) -> Self {
        GraphEdge {
            from_key: from_key.into(),
            to_key: to_key.into(),
            edge_type: edge_type.into(),
            tags: Tags::new(),
            created_date: Utc::now(),
        }
    }

    pub fn with_tags(
        from_key: impl Into<String>,
        to_key: impl Into<String>,
        edge_type: impl Into<String>,
        tags: Tags,
    ) -> Self {
        GraphEdge {
            tags,
            ..GraphEdge::new(from_key, to_key, edge_type)
        }
    }

    pub fn from_key_parts(key: &EdgeKey, tags: Tags) -> Self {
        GraphEdge::with_tags(&key.from_key, &key.to_key, &key.edge_type, tags)
    }

    /// Primary key of this edge
    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(&self.from_key, &self.to_key, &self.edge_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_edge() {
        let edge = GraphEdge::new("a", "b", "knows");
        assert_eq!(edge.from_key, "a");
        assert_eq!(edge.to_key, "b");
        assert_eq!(edge.edge_type, "knows");
        assert_eq!(edge.key(), EdgeKey::new("a", "b", "knows"));
    }

    #[test]
    fn test_edge_with_tags() {
        let tags: Tags = [("since", Some("2020"))].into_iter().collect();
        let edge = GraphEdge::with_tags("a", "b", "knows", tags);
        assert_eq!(edge.tags.value("since"), Some("2020"));
    }
}
