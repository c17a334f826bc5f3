//! Graph engine: public entry points
//!
//! A [`GraphEngine`] owns one [`EngineContext`]: the map behind its reader/writer
//! lock, the file store, the node data manager and the checkpoint. Batches are
//! parsed and validated up front, then run instruction by instruction inside a
//! [`Transaction`] that either commits (journal + checkpoint) or rolls back.

use crate::config::EngineConfig;
use crate::graph::GraphMap;
use crate::persistence::{FileStore, MapCheckpoint, NodeDataManager};
use crate::query::executor::{self, ExecutionError, ExecutionResult, QueryBatchResult, QueryResult};
use crate::query::parser::parse_batch;
use crate::query::Instruction;
use crate::transaction::{LockMode, Transaction};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-engine state shared by every batch
pub struct EngineContext {
    pub(crate) id: Uuid,
    pub(crate) config: EngineConfig,
    pub(crate) map: RwLock<GraphMap>,
    pub(crate) store: Arc<dyn FileStore>,
    pub(crate) data: NodeDataManager,
    pub(crate) checkpoint: MapCheckpoint,
}

impl EngineContext {
    fn new(config: EngineConfig, store: Arc<dyn FileStore>, map: GraphMap) -> Self {
        EngineContext {
            id: Uuid::new_v4(),
            data: NodeDataManager::new(store.clone(), config.data_path.clone()),
            checkpoint: MapCheckpoint::new(store.clone(), config.map_path.clone(), config.shared_mode),
            map: RwLock::new(map),
            store,
            config,
        }
    }
}

/// Embedded graph engine; cheap to clone, clones share one map
#[derive(Clone)]
pub struct GraphEngine {
    ctx: Arc<EngineContext>,
}

impl GraphEngine {
    /// Create an engine over an empty map, ignoring any existing checkpoint
    pub fn new(config: EngineConfig, store: Arc<dyn FileStore>) -> Self {
        GraphEngine {
            ctx: Arc::new(EngineContext::new(config, store, GraphMap::new())),
        }
    }

    /// Create an engine and load the checkpoint when one exists
    pub async fn open(config: EngineConfig, store: Arc<dyn FileStore>) -> ExecutionResult<Self> {
        let ctx = EngineContext::new(config, store, GraphMap::new());
        if let Some(map) = ctx.checkpoint.load().await? {
            *ctx.map.write().await = map;
        }
        info!("Engine {} opened", ctx.id);
        Ok(GraphEngine { ctx: Arc::new(ctx) })
    }

    pub fn id(&self) -> Uuid {
        self.ctx.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    /// Run a batch and return its last statement's result
    pub async fn execute(&self, text: &str) -> QueryResult {
        self.execute_batch(text).await.into_last()
    }

    /// Run a batch atomically and return every statement result
    pub async fn execute_batch(&self, text: &str) -> QueryBatchResult {
        let instructions = match parse_batch(text) {
            Ok(instructions) => instructions,
            Err(e) => {
                let error = ExecutionError::from(e);
                warn!("Batch rejected: {}", error);
                return QueryBatchResult::failed(Vec::new(), &error);
            }
        };

        let mode = if instructions.iter().any(Instruction::is_mutation) {
            LockMode::Write
        } else {
            LockMode::Read
        };
        info!(
            "Engine {} running batch of {} statements ({:?})",
            self.ctx.id,
            instructions.len(),
            mode
        );

        let mut trx = match Transaction::begin(&self.ctx, mode).await {
            Ok(trx) => trx,
            Err(e) => return QueryBatchResult::failed(Vec::new(), &e),
        };

        let mut items = Vec::new();
        for (index, instruction) in instructions.iter().enumerate() {
            match executor::execute(&mut trx, instruction).await {
                Ok(results) => items.extend(results),
                Err(e) => {
                    let undone = trx.rollback().await;
                    warn!(
                        "Statement {} failed, batch rolled back ({} changes undone): {}",
                        index + 1,
                        undone,
                        e
                    );
                    return QueryBatchResult::failed(items, &e);
                }
            }
        }

        match trx.commit().await {
            Ok(etag) => {
                debug!("Batch done, checkpoint {:?}", etag);
                QueryBatchResult::ok(items)
            }
            Err(e) => QueryBatchResult::failed(items, &e),
        }
    }

    /// Copy of the current map
    pub async fn map_snapshot(&self) -> GraphMap {
        self.ctx.map.read().await.clone()
    }
}
