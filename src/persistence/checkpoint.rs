//! Durable checkpoint of the whole graph map
//!
//! The map is written as one JSON resource. The checkpoint remembers the etag of
//! the version it last loaded or wrote; in shared mode that etag is the
//! precondition for the next write, so two engines over one store cannot silently
//! overwrite each other. A shared engine that has seen no checkpoint yet may only
//! create one.

use super::file_store::{ETag, FileStore, Precondition, StoreError, StoreResult};
use crate::graph::GraphMap;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct MapCheckpoint {
    store: Arc<dyn FileStore>,
    path: String,
    shared_mode: bool,
    etag: Mutex<Option<ETag>>,
}

impl MapCheckpoint {
    pub fn new(store: Arc<dyn FileStore>, path: impl Into<String>, shared_mode: bool) -> Self {
        MapCheckpoint {
            store,
            path: path.into(),
            shared_mode,
            etag: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Etag of the last loaded or written checkpoint
    pub async fn etag(&self) -> Option<ETag> {
        self.etag.lock().await.clone()
    }

    /// Load the checkpoint; `None` when none was ever written
    pub async fn load(&self) -> StoreResult<Option<GraphMap>> {
        let Some(file) = self.store.try_get(&self.path).await? else {
            debug!("No checkpoint at {}", self.path);
            return Ok(None);
        };

        let map: GraphMap = serde_json::from_slice(&file.data)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        info!(
            "Loaded checkpoint {} ({} nodes, {} edges)",
            self.path,
            map.node_count(),
            map.edge_count()
        );

        *self.etag.lock().await = Some(file.etag);
        Ok(Some(map))
    }

    /// Reload when another writer has replaced the checkpoint since we last saw it.
    ///
    /// Returns the new map only when it changed.
    pub async fn reload_if_changed(&self) -> StoreResult<Option<GraphMap>> {
        let Some(file) = self.store.try_get(&self.path).await? else {
            return Ok(None);
        };

        if self.etag.lock().await.as_ref() == Some(&file.etag) {
            return Ok(None);
        }

        let map: GraphMap = serde_json::from_slice(&file.data)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        info!("Checkpoint {} changed, reloaded {} nodes", self.path, map.node_count());

        *self.etag.lock().await = Some(file.etag);
        Ok(Some(map))
    }

    /// Write the map. In shared mode the last seen etag must still be current.
    pub async fn save(&self, map: &GraphMap) -> StoreResult<ETag> {
        let data = serde_json::to_vec(map).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut etag = self.etag.lock().await;
        let precondition = if self.shared_mode {
            Precondition::from_seen(etag.as_ref())
        } else {
            Precondition::None
        };

        let written = self.store.set(&self.path, Bytes::from(data), precondition).await?;
        debug!("Checkpoint {} written, etag {}", self.path, written);

        *etag = Some(written.clone());
        Ok(written)
    }
}
