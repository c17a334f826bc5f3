//! Secondary index: tag key -> owners carrying that tag

use super::tags::Tags;
use rustc_hash::{FxHashMap, FxHashSet};
use std::hash::Hash;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagIndex<K: Hash + Eq> {
    index: FxHashMap<String, FxHashSet<K>>,
}

impl<K: Hash + Eq + Clone> TagIndex<K> {
    pub fn new() -> Self {
        TagIndex {
            index: FxHashMap::default(),
        }
    }

    pub fn insert(&mut self, owner: &K, tags: &Tags) {
        for key in tags.keys() {
            self.index
                .entry(key.to_string())
                .or_default()
                .insert(owner.clone());
        }
    }

    pub fn remove(&mut self, owner: &K, tags: &Tags) {
        for key in tags.keys() {
            if let Some(owners) = self.index.get_mut(key) {
                owners.remove(owner);
                if owners.is_empty() {
                    self.index.remove(key);
                }
            }
        }
    }

    /// Owners carrying `tag_key`
    pub fn lookup(&self, tag_key: &str) -> impl Iterator<Item = &K> {
        self.index.get(tag_key).into_iter().flatten()
    }

    /// Union of the owners of every tag key in `filter`
    pub fn lookup_any(&self, filter: &Tags) -> FxHashSet<&K> {
        filter.keys().flat_map(|key| self.lookup(key)).collect()
    }

    pub fn clear(&mut self) {
        self.index.clear();
    }
}

impl<K: Hash + Eq + Clone> Default for TagIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_lookup_remove() {
        let mut index: TagIndex<String> = TagIndex::new();
        let t1: Tags = [("name", Some("a")), ("admin", None)].into_iter().collect();
        let t2: Tags = [("name", Some("b"))].into_iter().collect();

        index.insert(&"a".to_string(), &t1);
        index.insert(&"b".to_string(), &t2);

        assert_eq!(index.lookup("name").count(), 2);
        assert_eq!(index.lookup("admin").count(), 1);
        assert_eq!(index.lookup("missing").count(), 0);

        index.remove(&"a".to_string(), &t1);
        assert_eq!(index.lookup("name").count(), 1);
        assert_eq!(index.lookup("admin").count(), 0);
    }

    #[test]
    fn test_lookup_any_is_union() {
        let mut index: TagIndex<String> = TagIndex::new();
        index.insert(&"a".to_string(), &[("x", None)].into_iter().collect());
        index.insert(&"b".to_string(), &[("y", None)].into_iter().collect());
        index.insert(&"c".to_string(), &[("x", None), ("y", None)].into_iter().collect());

        let filter: Tags = [("x", None), ("y", None)].into_iter().collect();
        assert_eq!(index.lookup_any(&filter).len(), 3);
    }
}
