//! Node implementation for the graph map
//!
//! A node is identified by a unique key and carries:
//! - Tags (ordered key/optional-value pairs)
//! - Links to named data blobs stored outside the map
//! - Names of unique alternate indexes over its tags
//! - Foreign-key rules that derive edges from tag values

use super::pattern::glob_match;
use super::tags::Tags;
use super::types::EdgeKey;
use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Metadata for one named data blob attached to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphLink {
    pub node_key: String,
    pub name: String,
    /// Path of the blob in the file store
    pub file_id: String,
}

/// A node in the graph map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Unique key for this node
    pub key: String,

    #[serde(default)]
    pub tags: Tags,

    pub created_date: DateTime<Utc>,

    /// Data name -> blob link
    #[serde(default)]
    pub data_map: IndexMap<String, GraphLink>,

    /// Unique alternate indexes, each named after the tag it indexes
    #[serde(default)]
    pub indexes: IndexSet<String>,

    /// Foreign keys: tag name -> pattern the tag value must match to derive an edge
    #[serde(default)]
    pub foreign_keys: Tags,
}

impl GraphNode {
    /// Create a new node with no tags or data
    pub fn new(key: impl Into<String>) -> Self {
        GraphNode {
            key: key.into(),
            tags: Tags::new(),
            created_date: Utc::now(),
            data_map: IndexMap::new(),
            indexes: IndexSet::new(),
            foreign_keys: Tags::new(),
        }
    }

    /// Create a new node with tags
    pub fn with_tags(key: impl Into<String>, tags: Tags) -> Self {
        GraphNode {
            tags,
            ..GraphNode::new(key)
        }
    }

    /// Value of every indexed tag, as (index name, value)
    pub fn index_values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.indexes
            .iter()
            .filter_map(|name| self.tags.value(name).map(|value| (name.as_str(), value)))
    }

    /// Edges implied by the foreign keys and the current tag values.
    ///
    /// For each foreign-key field whose tag value matches the field's pattern, the
    /// node owns an edge `(self.key, value, field)`.
    pub fn foreign_key_edges(&self) -> Vec<EdgeKey> {
        self.foreign_keys
            .iter()
            .filter_map(|(field, pattern)| {
                let value = self.tags.value(field)?;
                let matched = pattern.map_or(true, |p| glob_match(p, value));
                matched.then(|| EdgeKey::new(self.key.clone(), value, field))
            })
            .collect()
    }

    pub fn has_data(&self, name: &str) -> bool {
        self.data_map.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_node() {
        let node = GraphNode::new("node1");
        assert_eq!(node.key, "node1");
        assert!(node.tags.is_empty());
        assert!(node.data_map.is_empty());
    }

    #[test]
    fn test_foreign_key_edges() {
        let mut node = GraphNode::new("user:alice");
        node.tags.insert("role", Some("role:admin".to_string()));
        node.tags.insert("manager", Some("user:bob".to_string()));
        node.tags.insert_flag("active");
        node.foreign_keys.insert("role", Some("role:*".to_string()));
        node.foreign_keys.insert("manager", Some("group:*".to_string()));
        node.foreign_keys.insert_flag("active");

        let edges = node.foreign_key_edges();
        assert_eq!(edges, vec![EdgeKey::new("user:alice", "role:admin", "role")]);
    }

    #[test]
    fn test_bare_foreign_key_matches_any_value() {
        let mut node = GraphNode::new("a");
        node.tags.insert("owner", Some("b".to_string()));
        node.foreign_keys.insert_flag("owner");

        assert_eq!(node.foreign_key_edges(), vec![EdgeKey::new("a", "b", "owner")]);
    }

    #[test]
    fn test_index_values() {
        let mut node = GraphNode::new("a");
        node.tags.insert("email", Some("a@x.com".to_string()));
        node.indexes.insert("email".to_string());
        node.indexes.insert("phone".to_string());

        let values: Vec<_> = node.index_values().collect();
        assert_eq!(values, vec![("email", "a@x.com")]);
    }
}
