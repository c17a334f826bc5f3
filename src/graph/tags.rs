//! Tag collections for nodes and edges
//!
//! A tag is a string key with an optional string value. Tags keep insertion order
//! so a node reads back the way it was written. A key prefixed with
//! [`DELETE_MARKER`] inside a statement means "remove this tag"; markers are kept
//! verbatim by the builders and only resolved by [`Tags::merge`].

use super::pattern::glob_match;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix marking a tag, data entry, index or foreign key for removal
pub const DELETE_MARKER: char = '-';

/// Returns the target name when `key` carries a delete marker
pub fn strip_delete_marker(key: &str) -> Option<&str> {
    key.strip_prefix(DELETE_MARKER).filter(|k| !k.is_empty())
}

/// Ordered tag map: key -> optional value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(IndexMap<String, Option<String>>);

impl Tags {
    pub fn new() -> Self {
        Tags(IndexMap::new())
    }

    /// Insert a tag, returning the previous value if the key was present
    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) -> Option<Option<String>> {
        self.0.insert(key.into(), value)
    }

    /// Insert a flag tag (no value)
    pub fn insert_flag(&mut self, key: impl Into<String>) {
        self.0.insert(key.into(), None);
    }

    pub fn remove(&mut self, key: &str) -> Option<Option<String>> {
        self.0.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Get the value of a tag; `Some(None)` for a flag tag
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.0.get(key).map(|v| v.as_deref())
    }

    /// Get the value of a tag only when it carries one
    pub fn value(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_deref())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys named by delete markers (`-key`)
    pub fn delete_markers(&self) -> impl Iterator<Item = &str> {
        self.0.keys().filter_map(|k| strip_delete_marker(k))
    }

    /// Copy of these tags with every delete marker dropped
    pub fn without_delete_markers(&self) -> Tags {
        Tags(
            self.0
                .iter()
                .filter(|(k, _)| strip_delete_marker(k).is_none())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Merge an update into these tags.
    ///
    /// - `-key` removes `key`
    /// - `key=value` inserts or overwrites
    /// - a bare `key` is inserted as a flag, but never erases an existing value
    /// - keys not mentioned in `update` are preserved
    pub fn merge(&self, update: &Tags) -> Tags {
        let mut merged = self.clone();

        for (key, value) in &update.0 {
            if let Some(target) = strip_delete_marker(key) {
                merged.0.shift_remove(target);
                continue;
            }

            match value {
                Some(v) => {
                    merged.0.insert(key.clone(), Some(v.clone()));
                }
                None => {
                    merged.0.entry(key.clone()).or_insert(None);
                }
            }
        }

        merged
    }

    /// Every filter tag must be present; a filter value is a glob over the tag value
    pub fn matches(&self, filter: &Tags) -> bool {
        filter.0.iter().all(|(key, pattern)| match (self.0.get(key), pattern) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(Some(value)), Some(pattern)) => glob_match(pattern, value),
            (Some(None), Some(_)) => false,
        })
    }
}

impl FromIterator<(String, Option<String>)> for Tags {
    fn from_iter<I: IntoIterator<Item = (String, Option<String>)>>(iter: I) -> Self {
        Tags(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<(&'a str, Option<&'a str>)> for Tags {
    fn from_iter<I: IntoIterator<Item = (&'a str, Option<&'a str>)>>(iter: I) -> Self {
        Tags(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
                .collect(),
        )
    }
}

impl Extend<(String, Option<String>)> for Tags {
    fn extend<I: IntoIterator<Item = (String, Option<String>)>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            match value {
                Some(v) => write!(f, "{}={}", key, v)?,
                None => write!(f, "{}", key)?,
            }
        }
        Ok(())
    }
}
