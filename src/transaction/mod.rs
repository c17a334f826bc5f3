//! Transaction coordinator
//!
//! A [`Transaction`] wraps one batch: it holds the engine's reader or writer lock
//! for its whole lifetime, owns the batch's [`ChangeLog`], and ends in exactly one
//! of [`Transaction::commit`] or [`Transaction::rollback`]. The lock guard lives
//! inside the transaction, so it is released on every exit path, including early
//! returns on error.

pub mod change_log;

pub use change_log::{ChangeLog, ChangeRecord, JournalEntry};

use crate::engine::EngineContext;
use crate::graph::GraphMap;
use crate::persistence::{ETag, NodeDataManager};
use crate::query::executor::{ExecutionError, ExecutionResult};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Lock a batch needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Pure-select batch; runs alongside other readers
    Read,
    /// Batch with at least one mutation; runs alone
    Write,
}

enum MapGuard<'a> {
    Read(RwLockReadGuard<'a, GraphMap>),
    Write(RwLockWriteGuard<'a, GraphMap>),
}

/// One batch's view of the engine, holding its lock
pub struct Transaction<'a> {
    ctx: &'a EngineContext,
    guard: MapGuard<'a>,
    log: ChangeLog,
}

async fn acquire<G>(lock: impl Future<Output = G>, timeout: Option<Duration>) -> ExecutionResult<G> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, lock).await.map_err(|_| {
            warn!("Timed out after {:?} waiting for the graph lock", limit);
            ExecutionError::LockTimeout(limit)
        }),
        None => Ok(lock.await),
    }
}

impl<'a> Transaction<'a> {
    /// Acquire the lock for `mode` and start a change log.
    ///
    /// In shared mode every batch takes the writer lock and reloads the map when
    /// another engine has checkpointed since we last looked.
    pub async fn begin(ctx: &'a EngineContext, mode: LockMode) -> ExecutionResult<Self> {
        let mode = if ctx.config.shared_mode { LockMode::Write } else { mode };
        let timeout = ctx.config.lock_timeout();

        let guard = match mode {
            LockMode::Read => MapGuard::Read(acquire(ctx.map.read(), timeout).await?),
            LockMode::Write => MapGuard::Write(acquire(ctx.map.write(), timeout).await?),
        };

        let mut trx = Transaction {
            ctx,
            guard,
            log: ChangeLog::new(),
        };

        if ctx.config.shared_mode {
            if let MapGuard::Write(map) = &mut trx.guard {
                if let Some(latest) = ctx.checkpoint.reload_if_changed().await? {
                    **map = latest;
                }
            }
        }

        debug!("Transaction {} started ({:?})", trx.log.transaction_id(), mode);
        Ok(trx)
    }

    pub fn map(&self) -> &GraphMap {
        match &self.guard {
            MapGuard::Read(map) => &**map,
            MapGuard::Write(map) => &**map,
        }
    }

    pub fn data(&self) -> &'a NodeDataManager {
        let ctx = self.ctx;
        &ctx.data
    }

    /// Mutable access for mutating instructions; only under the writer lock
    pub fn write_parts(&mut self) -> ExecutionResult<(&mut GraphMap, &mut ChangeLog, &'a NodeDataManager)> {
        let ctx = self.ctx;
        match &mut self.guard {
            MapGuard::Write(map) => Ok((&mut **map, &mut self.log, &ctx.data)),
            MapGuard::Read(_) => Err(ExecutionError::Internal(
                "mutation attempted under the reader lock".to_string(),
            )),
        }
    }

    /// Persist the change log and checkpoint the map.
    ///
    /// Nothing is written when the batch changed nothing. If either write fails the
    /// batch is rolled back before the error is returned.
    pub async fn commit(mut self) -> ExecutionResult<Option<ETag>> {
        if self.log.is_empty() {
            return Ok(None);
        }

        let changes = self.log.len();
        let config = &self.ctx.config;

        let journal = if config.persist_journal {
            match self.log.persist(self.ctx.store.as_ref(), &config.journal_path).await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Journal write failed, rolling back: {}", e);
                    self.undo().await;
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        let saved = self.ctx.checkpoint.save(self.map()).await;
        match saved {
            Ok(etag) => {
                info!(
                    "Transaction {} committed {} changes, checkpoint {}",
                    self.log.transaction_id(),
                    changes,
                    etag
                );
                Ok(Some(etag))
            }
            Err(e) => {
                warn!("Checkpoint failed, rolling back: {}", e);
                self.undo().await;
                if let Some(path) = journal {
                    if let Err(e) = self.ctx.store.delete(&path, None).await {
                        warn!("Could not remove journal {}: {}", path, e);
                    }
                }
                Err(e.into())
            }
        }
    }

    /// Undo every change made under this transaction; returns records undone
    pub async fn rollback(mut self) -> usize {
        self.undo().await
    }

    async fn undo(&mut self) -> usize {
        if self.log.is_empty() {
            return 0;
        }

        let MapGuard::Write(map) = &mut self.guard else {
            return 0;
        };

        let undone = self.log.rollback(&mut **map, self.ctx.store.as_ref()).await;
        info!(
            "Transaction {} rolled back {} changes",
            self.log.transaction_id(),
            undone
        );
        undone
    }
}
