//! Node collection: primary store keyed by node key plus tag and unique indexes
//!
//! Every mutator updates the primary store and the secondary indexes together, so
//! no caller can observe an index entry without its node or the other way round.

use super::node::GraphNode;
use super::pattern::{glob_match, is_wildcard};
use super::store::{GraphError, GraphResult};
use super::tag_index::TagIndex;
use super::tags::Tags;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeIndex {
    nodes: FxHashMap<String, GraphNode>,
    tag_index: TagIndex<String>,
    /// index name -> (tag value -> node key)
    unique_index: FxHashMap<String, FxHashMap<String, String>>,
}

impl NodeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&GraphNode> {
        self.nodes.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Full scan, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// Nodes whose key matches `pattern`; O(1) when the pattern has no wildcard
    pub fn lookup_key(&self, pattern: &str) -> Vec<&GraphNode> {
        if is_wildcard(pattern) {
            self.nodes
                .values()
                .filter(|n| glob_match(pattern, &n.key))
                .collect()
        } else {
            self.nodes.get(pattern).into_iter().collect()
        }
    }

    /// Nodes matching every tag in `filter`; candidates come from the tag index
    pub fn lookup_tags(&self, filter: &Tags) -> Vec<&GraphNode> {
        self.tag_index
            .lookup_any(filter)
            .into_iter()
            .filter_map(|key| self.nodes.get(key))
            .filter(|node| node.tags.matches(filter))
            .collect()
    }

    /// Resolve a node through a unique alternate index
    pub fn lookup_index(&self, index: &str, value: &str) -> Option<&GraphNode> {
        self.unique_index
            .get(index)
            .and_then(|values| values.get(value))
            .and_then(|key| self.nodes.get(key))
    }

    pub(super) fn insert(&mut self, node: GraphNode) -> GraphResult<()> {
        if self.nodes.contains_key(&node.key) {
            return Err(GraphError::NodeAlreadyExists(node.key));
        }
        self.check_unique(&node)?;

        self.index(&node);
        self.nodes.insert(node.key.clone(), node);
        Ok(())
    }

    /// Replace an existing node, returning the previous version
    pub(super) fn replace(&mut self, node: GraphNode) -> GraphResult<GraphNode> {
        if !self.nodes.contains_key(&node.key) {
            return Err(GraphError::NodeNotFound(node.key));
        }
        self.check_unique(&node)?;

        let previous = self.remove(&node.key).ok_or_else(|| GraphError::NodeNotFound(node.key.clone()))?;
        self.index(&node);
        self.nodes.insert(node.key.clone(), node);
        Ok(previous)
    }

    pub(super) fn remove(&mut self, key: &str) -> Option<GraphNode> {
        let node = self.nodes.remove(key)?;
        self.unindex(&node);
        Some(node)
    }

    /// Insert or replace without uniqueness checks (rollback)
    pub(super) fn restore(&mut self, node: GraphNode) {
        self.remove(&node.key);
        self.index(&node);
        self.nodes.insert(node.key.clone(), node);
    }

    pub(super) fn clear(&mut self) {
        self.nodes.clear();
        self.tag_index.clear();
        self.unique_index.clear();
    }

    fn check_unique(&self, node: &GraphNode) -> GraphResult<()> {
        for (index, value) in node.index_values() {
            let owner = self.unique_index.get(index).and_then(|values| values.get(value));
            if let Some(owner) = owner {
                if owner != &node.key {
                    return Err(GraphError::IndexConflict {
                        index: index.to_string(),
                        value: value.to_string(),
                        owner: owner.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn index(&mut self, node: &GraphNode) {
        self.tag_index.insert(&node.key, &node.tags);
        for (index, value) in node.index_values() {
            self.unique_index
                .entry(index.to_string())
                .or_default()
                .insert(value.to_string(), node.key.clone());
        }
    }

    fn unindex(&mut self, node: &GraphNode) {
        self.tag_index.remove(&node.key, &node.tags);
        for (index, value) in node.index_values() {
            if let Some(values) = self.unique_index.get_mut(index) {
                if values.get(value) == Some(&node.key) {
                    values.remove(value);
                }
                if values.is_empty() {
                    self.unique_index.remove(index);
                }
            }
        }
    }
}
