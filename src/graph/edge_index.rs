//! Edge collection: primary store keyed by (from, to, type) plus from/to/type/tag indexes

use super::edge::GraphEdge;
use super::pattern::{glob_match, is_wildcard};
use super::store::{GraphError, GraphResult};
use super::tag_index::TagIndex;
use super::tags::Tags;
use super::types::EdgeKey;
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeIndex {
    edges: FxHashMap<EdgeKey, GraphEdge>,
    from_index: FxHashMap<String, FxHashSet<EdgeKey>>,
    to_index: FxHashMap<String, FxHashSet<EdgeKey>>,
    type_index: FxHashMap<String, FxHashSet<EdgeKey>>,
    tag_index: TagIndex<EdgeKey>,
}

impl EdgeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &EdgeKey) -> Option<&GraphEdge> {
        self.edges.get(key)
    }

    pub fn contains_key(&self, key: &EdgeKey) -> bool {
        self.edges.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.values()
    }

    /// Outgoing edges of `node_key`
    pub fn edges_from(&self, node_key: &str) -> Vec<&GraphEdge> {
        Self::resolve(&self.edges, self.from_index.get(node_key))
    }

    /// Incoming edges of `node_key`
    pub fn edges_to(&self, node_key: &str) -> Vec<&GraphEdge> {
        Self::resolve(&self.edges, self.to_index.get(node_key))
    }

    /// Edges whose type matches `pattern`
    pub fn edges_of_type(&self, pattern: &str) -> Vec<&GraphEdge> {
        if is_wildcard(pattern) {
            self.type_index
                .iter()
                .filter(|(edge_type, _)| glob_match(pattern, edge_type))
                .flat_map(|(_, keys)| Self::resolve(&self.edges, Some(keys)))
                .collect()
        } else {
            Self::resolve(&self.edges, self.type_index.get(pattern))
        }
    }

    /// Edges matching every tag in `filter`; candidates come from the tag index
    pub fn lookup_tags(&self, filter: &Tags) -> Vec<&GraphEdge> {
        self.tag_index
            .lookup_any(filter)
            .into_iter()
            .filter_map(|key| self.edges.get(key))
            .filter(|edge| edge.tags.matches(filter))
            .collect()
    }

    /// Keys of every edge with `node_key` on either side
    pub fn keys_touching(&self, node_key: &str) -> Vec<EdgeKey> {
        let from = self.from_index.get(node_key).into_iter().flatten();
        let to = self.to_index.get(node_key).into_iter().flatten();
        let keys: FxHashSet<&EdgeKey> = from.chain(to).collect();
        let mut keys: Vec<EdgeKey> = keys.into_iter().cloned().collect();
        keys.sort();
        keys
    }

    pub(super) fn insert(&mut self, edge: GraphEdge) -> GraphResult<()> {
        let key = edge.key();
        if self.edges.contains_key(&key) {
            return Err(GraphError::EdgeAlreadyExists(key));
        }
        self.index(&key, &edge);
        self.edges.insert(key, edge);
        Ok(())
    }

    /// Replace an existing edge, returning the previous version
    pub(super) fn replace(&mut self, edge: GraphEdge) -> GraphResult<GraphEdge> {
        let key = edge.key();
        let previous = self.remove(&key).ok_or_else(|| GraphError::EdgeNotFound(key.clone()))?;
        self.index(&key, &edge);
        self.edges.insert(key, edge);
        Ok(previous)
    }

    pub(super) fn remove(&mut self, key: &EdgeKey) -> Option<GraphEdge> {
        let edge = self.edges.remove(key)?;
        Self::unindex_key(&mut self.from_index, &edge.from_key, key);
        Self::unindex_key(&mut self.to_index, &edge.to_key, key);
        Self::unindex_key(&mut self.type_index, &edge.edge_type, key);
        self.tag_index.remove(key, &edge.tags);
        Some(edge)
    }

    /// Insert or replace without checks (rollback)
    pub(super) fn restore(&mut self, edge: GraphEdge) {
        let key = edge.key();
        self.remove(&key);
        self.index(&key, &edge);
        self.edges.insert(key, edge);
    }

    pub(super) fn clear(&mut self) {
        self.edges.clear();
        self.from_index.clear();
        self.to_index.clear();
        self.type_index.clear();
        self.tag_index.clear();
    }

    fn index(&mut self, key: &EdgeKey, edge: &GraphEdge) {
        self.from_index
            .entry(edge.from_key.clone())
            .or_default()
            .insert(key.clone());
        self.to_index
            .entry(edge.to_key.clone())
            .or_default()
            .insert(key.clone());
        self.type_index
            .entry(edge.edge_type.clone())
            .or_default()
            .insert(key.clone());
        self.tag_index.insert(key, &edge.tags);
    }

    fn unindex_key(index: &mut FxHashMap<String, FxHashSet<EdgeKey>>, value: &str, key: &EdgeKey) {
        if let Some(keys) = index.get_mut(value) {
            keys.remove(key);
            if keys.is_empty() {
                index.remove(value);
            }
        }
    }

    fn resolve<'a>(
        edges: &'a FxHashMap<EdgeKey, GraphEdge>,
        keys: Option<&FxHashSet<EdgeKey>>,
    ) -> Vec<&'a GraphEdge> {
        keys.into_iter()
            .flatten()
            .filter_map(|key| edges.get(key))
            .collect()
    }
}
