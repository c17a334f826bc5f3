//! Node data manager: named data blobs attached to nodes
//!
//! A (node key, data name) pair maps to exactly one blob path through
//! [`node_data_file_id`], a pure function of its inputs. Every write and delete is
//! recorded in the batch's [`ChangeLog`] together with the previous payload, so a
//! rollback can put the blob store back the way it was.

use super::file_store::{DataETag, FileStore, Precondition, StoreResult};
use crate::graph::{GraphLink, GraphNode};
use crate::transaction::{ChangeLog, ChangeRecord};
use bytes::Bytes;
use indexmap::IndexMap;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::sync::Arc;
use tracing::debug;

/// Everything except ASCII alphanumerics, '-' and '_' is escaped, so '/' and '.'
/// never survive inside a path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

/// Blob path for a node's named data
pub fn node_data_file_id(prefix: &str, node_key: &str, name: &str) -> String {
    format!(
        "{}/{}/{}.dat",
        prefix,
        utf8_percent_encode(node_key, SEGMENT),
        utf8_percent_encode(name, SEGMENT)
    )
}

#[derive(Clone)]
pub struct NodeDataManager {
    store: Arc<dyn FileStore>,
    prefix: String,
}

impl NodeDataManager {
    pub fn new(store: Arc<dyn FileStore>, prefix: impl Into<String>) -> Self {
        NodeDataManager {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn file_id(&self, node_key: &str, name: &str) -> String {
        node_data_file_id(&self.prefix, node_key, name)
    }

    /// Write one blob and return its link
    pub async fn add(
        &self,
        node_key: &str,
        name: &str,
        data: Bytes,
        log: &mut ChangeLog,
    ) -> StoreResult<GraphLink> {
        let file_id = self.file_id(node_key, name);
        let previous = self.store.try_get(&file_id).await?;

        self.store.set(&file_id, data, Precondition::None).await?;
        log.push(ChangeRecord::DataWritten {
            file_id: file_id.clone(),
            previous: previous.map(|p| p.data.to_vec()),
        });
        debug!("Wrote data {} for node {}", name, node_key);

        Ok(GraphLink {
            node_key: node_key.to_string(),
            name: name.to_string(),
            file_id,
        })
    }

    /// Write every entry of `data`, returning the resulting data map
    pub async fn add_all(
        &self,
        node_key: &str,
        data: &IndexMap<String, Bytes>,
        log: &mut ChangeLog,
    ) -> StoreResult<IndexMap<String, GraphLink>> {
        let mut data_map = IndexMap::new();
        for (name, payload) in data {
            let link = self.add(node_key, name, payload.clone(), log).await?;
            data_map.insert(name.clone(), link);
        }
        Ok(data_map)
    }

    /// Reconcile a node's data map against an upsert.
    ///
    /// Entries not mentioned are kept, entries in `deletes` are removed along with
    /// their blobs, and entries in `data` are written (new or replaced).
    pub async fn merge(
        &self,
        node_key: &str,
        current: &IndexMap<String, GraphLink>,
        data: &IndexMap<String, Bytes>,
        deletes: &[String],
        log: &mut ChangeLog,
    ) -> StoreResult<IndexMap<String, GraphLink>> {
        let mut merged = current.clone();

        for name in deletes {
            if let Some(link) = merged.shift_remove(name) {
                self.remove_blob(&link.file_id, log).await?;
            }
        }

        for (name, payload) in data {
            let link = self.add(node_key, name, payload.clone(), log).await?;
            merged.insert(name.clone(), link);
        }

        Ok(merged)
    }

    /// Delete every blob referenced by the node's data map; returns how many
    pub async fn delete_node_data(&self, node: &GraphNode, log: &mut ChangeLog) -> StoreResult<usize> {
        let mut deleted = 0;
        for link in node.data_map.values() {
            if self.remove_blob(&link.file_id, log).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Read a blob back
    pub async fn get(&self, link: &GraphLink) -> StoreResult<DataETag> {
        self.store.get(&link.file_id).await
    }

    /// Delete a blob if present, logging its payload; false when already absent
    async fn remove_blob(&self, file_id: &str, log: &mut ChangeLog) -> StoreResult<bool> {
        let Some(previous) = self.store.try_get(file_id).await? else {
            debug!("Data blob {} already absent", file_id);
            return Ok(false);
        };

        self.store.delete(file_id, None).await?;
        log.push(ChangeRecord::DataDeleted {
            file_id: file_id.to_string(),
            previous: previous.data.to_vec(),
        });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryFileStore;

    fn manager() -> (Arc<MemoryFileStore>, NodeDataManager) {
        let store = Arc::new(MemoryFileStore::new());
        let manager = NodeDataManager::new(store.clone(), "nodes");
        (store, manager)
    }

    #[test]
    fn test_file_id_is_deterministic_and_escaped() {
        assert_eq!(node_data_file_id("nodes", "node1", "contract"), "nodes/node1/contract.dat");
        assert_eq!(
            node_data_file_id("nodes", "user:a/b", "x.y"),
            "nodes/user%3Aa%2Fb/x%2Ey.dat"
        );
        assert_eq!(
            node_data_file_id("nodes", "a", "b"),
            node_data_file_id("nodes", "a", "b")
        );
    }

    #[test]
    fn test_file_id_collision_free() {
        // Separators inside keys or names cannot forge another pair's path
        let pairs = [("a/b", "c"), ("a", "b/c"), ("a.b", "c"), ("a", "b.c"), ("a", "bc")];
        let ids: std::collections::HashSet<String> = pairs
            .iter()
            .map(|(k, n)| node_data_file_id("nodes", k, n))
            .collect();
        assert_eq!(ids.len(), pairs.len());
    }

    #[tokio::test]
    async fn test_add_get_delete() {
        let (store, manager) = manager();
        let mut log = ChangeLog::new();

        let link = manager
            .add("node1", "contract", Bytes::from_static(b"{\"a\":1}"), &mut log)
            .await
            .unwrap();
        assert_eq!(link.file_id, "nodes/node1/contract.dat");
        assert_eq!(manager.get(&link).await.unwrap().data, Bytes::from_static(b"{\"a\":1}"));

        let mut node = GraphNode::new("node1");
        node.data_map.insert("contract".to_string(), link);
        assert_eq!(manager.delete_node_data(&node, &mut log).await.unwrap(), 1);
        assert!(store.is_empty().await);
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn test_merge() {
        let (store, manager) = manager();
        let mut log = ChangeLog::new();

        let mut initial = IndexMap::new();
        initial.insert("keep".to_string(), Bytes::from_static(b"k"));
        initial.insert("drop".to_string(), Bytes::from_static(b"d"));
        initial.insert("change".to_string(), Bytes::from_static(b"c1"));
        let current = manager.add_all("n", &initial, &mut log).await.unwrap();

        let mut update = IndexMap::new();
        update.insert("change".to_string(), Bytes::from_static(b"c2"));
        update.insert("new".to_string(), Bytes::from_static(b"n"));
        let merged = manager
            .merge("n", &current, &update, &["drop".to_string()], &mut log)
            .await
            .unwrap();

        let names: Vec<&str> = merged.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["keep", "change", "new"]);
        assert_eq!(store.len().await, 3);
        assert_eq!(manager.get(&merged["change"]).await.unwrap().data, Bytes::from_static(b"c2"));
        assert!(store.try_get(&manager.file_id("n", "drop")).await.unwrap().is_none());
    }
}
