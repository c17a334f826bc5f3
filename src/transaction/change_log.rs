//! Reversible change log
//!
//! Each mutation applied during a batch appends the record needed to undo it.
//! Rollback replays the records newest-first; commit persists them as a journal
//! entry next to the checkpoint.

use crate::graph::{EdgeKey, GraphEdge, GraphMap, GraphNode};
use crate::persistence::{FileStore, Precondition, StoreError, StoreResult};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

/// Inverse of one mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChangeRecord {
    /// Node was added; undo removes it
    NodeAdded { key: String },
    /// Node was replaced; undo restores the previous version
    NodeChanged { previous: GraphNode },
    /// Node was removed; undo puts it back
    NodeRemoved { previous: GraphNode },
    EdgeAdded { key: EdgeKey },
    EdgeChanged { previous: GraphEdge },
    EdgeRemoved { previous: GraphEdge },
    /// Blob was written; undo restores `previous` or deletes the blob
    DataWritten {
        file_id: String,
        previous: Option<Vec<u8>>,
    },
    /// Blob was deleted; undo writes it back
    DataDeleted { file_id: String, previous: Vec<u8> },
}

/// Journal entry persisted on commit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub transaction_id: Uuid,
    pub committed: DateTime<Utc>,
    pub records: Vec<ChangeRecord>,
}

#[derive(Debug)]
pub struct ChangeLog {
    transaction_id: Uuid,
    records: Vec<ChangeRecord>,
}

impl ChangeLog {
    pub fn new() -> Self {
        ChangeLog {
            transaction_id: Uuid::new_v4(),
            records: Vec::new(),
        }
    }

    pub fn transaction_id(&self) -> Uuid {
        self.transaction_id
    }

    pub fn push(&mut self, record: ChangeRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the log as a bincode journal entry under `dir`; returns its path
    pub async fn persist(&self, store: &dyn FileStore, dir: &str) -> StoreResult<String> {
        let committed = Utc::now();
        let entry = JournalEntry {
            transaction_id: self.transaction_id,
            committed,
            records: self.records.clone(),
        };
        let data = bincode::serialize(&entry).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let path = format!(
            "{}/{:016x}-{}.journal",
            dir,
            committed.timestamp_millis(),
            self.transaction_id.simple()
        );
        store.set(&path, Bytes::from(data), Precondition::None).await?;
        debug!("Journal {} written ({} records)", path, self.records.len());
        Ok(path)
    }

    /// Decode a persisted journal entry
    pub fn decode(data: &[u8]) -> StoreResult<JournalEntry> {
        bincode::deserialize(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Undo every record, newest first. Returns the number of records undone.
    ///
    /// Blob restore failures are logged and skipped so the map is still rolled back.
    pub async fn rollback(&mut self, map: &mut GraphMap, store: &dyn FileStore) -> usize {
        let mut undone = 0;

        while let Some(record) = self.records.pop() {
            let result = match record {
                ChangeRecord::NodeAdded { key } => {
                    map.discard_node(&key);
                    Ok(())
                }
                ChangeRecord::NodeChanged { previous } | ChangeRecord::NodeRemoved { previous } => {
                    map.restore_node(previous);
                    Ok(())
                }
                ChangeRecord::EdgeAdded { key } => {
                    map.discard_edge(&key);
                    Ok(())
                }
                ChangeRecord::EdgeChanged { previous } | ChangeRecord::EdgeRemoved { previous } => {
                    map.restore_edge(previous);
                    Ok(())
                }
                ChangeRecord::DataWritten {
                    file_id,
                    previous: Some(previous),
                }
                | ChangeRecord::DataDeleted { file_id, previous } => store
                    .set(&file_id, Bytes::from(previous), Precondition::None)
                    .await
                    .map(|_| ())
                    .map_err(|e| (file_id, e)),
                ChangeRecord::DataWritten {
                    file_id,
                    previous: None,
                } => match store.delete(&file_id, None).await {
                    Ok(()) | Err(StoreError::NotFound(_)) => Ok(()),
                    Err(e) => Err((file_id, e)),
                },
            };

            match result {
                Ok(()) => undone += 1,
                Err((file_id, e)) => error!("Rollback could not restore data {}: {}", file_id, e),
            }
        }

        undone
    }
}

impl Default for ChangeLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryFileStore;

    #[tokio::test]
    async fn test_rollback_restores_map() {
        let store = MemoryFileStore::new();
        let mut map = GraphMap::new();
        map.add_node(GraphNode::new("a")).unwrap();
        map.add_node(GraphNode::new("b")).unwrap();
        map.add_edge(GraphEdge::new("a", "b", "knows")).unwrap();
        let before = map.clone();

        let mut log = ChangeLog::new();

        map.add_node(GraphNode::new("c")).unwrap();
        log.push(ChangeRecord::NodeAdded { key: "c".to_string() });

        map.add_edge(GraphEdge::new("c", "a", "knows")).unwrap();
        log.push(ChangeRecord::EdgeAdded {
            key: EdgeKey::new("c", "a", "knows"),
        });

        let (node, edges) = map.remove_node("b").unwrap();
        for edge in edges {
            log.push(ChangeRecord::EdgeRemoved { previous: edge });
        }
        log.push(ChangeRecord::NodeRemoved { previous: node });

        assert_ne!(map, before);
        assert_eq!(log.rollback(&mut map, &store).await, 4);
        assert_eq!(map, before);
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_rollback_restores_blobs() {
        let store = MemoryFileStore::new();
        store.set("nodes/a/old.dat", Bytes::from_static(b"old"), Precondition::None).await.unwrap();

        let mut log = ChangeLog::new();
        store.set("nodes/a/old.dat", Bytes::from_static(b"new"), Precondition::None).await.unwrap();
        log.push(ChangeRecord::DataWritten {
            file_id: "nodes/a/old.dat".to_string(),
            previous: Some(b"old".to_vec()),
        });
        store.set("nodes/a/fresh.dat", Bytes::from_static(b"x"), Precondition::None).await.unwrap();
        log.push(ChangeRecord::DataWritten {
            file_id: "nodes/a/fresh.dat".to_string(),
            previous: None,
        });

        let mut map = GraphMap::new();
        log.rollback(&mut map, &store).await;

        assert_eq!(store.get("nodes/a/old.dat").await.unwrap().data, Bytes::from_static(b"old"));
        assert!(store.try_get("nodes/a/fresh.dat").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persist_journal() {
        let store = MemoryFileStore::new();
        let mut log = ChangeLog::new();
        log.push(ChangeRecord::NodeAdded { key: "a".to_string() });
        log.push(ChangeRecord::NodeChanged {
            previous: GraphNode::new("b"),
        });

        let path = log.persist(&store, "graph/journal").await.unwrap();
        assert!(path.starts_with("graph/journal/"));

        let entry = ChangeLog::decode(&store.get(&path).await.unwrap().data).unwrap();
        assert_eq!(entry.transaction_id, log.transaction_id());
        assert_eq!(entry.records, log.records());
    }
}
