//! Tagraph: an embedded tagged graph database
//!
//! Statements such as `add node key=a set role=admin;` or
//! `select (key=a) -> [type=knows] -> (*) return profile;` are parsed into
//! instructions and run against an in-memory graph map of nodes, typed edges and
//! named data blobs. Every batch is atomic: it either commits (change-log journal
//! plus map checkpoint) or leaves the map and the blob store as they were.
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use tagraph::{EngineConfig, GraphEngine, MemoryFileStore};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let engine = GraphEngine::new(EngineConfig::default(), Arc::new(MemoryFileStore::new()));
//!
//! engine.execute("add node key=alice; add node key=bob;").await;
//! engine.execute("add edge from=alice, to=bob, type=knows;").await;
//!
//! let result = engine.execute("select (key=alice) -> (*);").await;
//! assert_eq!(result.nodes[0].key, "bob");
//! # }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod graph;
pub mod persistence;
pub mod query;
pub mod transaction;

// Re-export main types for convenience
pub use config::{ConfigError, ConfigResult, EngineConfig};
pub use engine::GraphEngine;
pub use graph::{EdgeKey, GraphEdge, GraphError, GraphMap, GraphNode, GraphResult, Tags};
pub use persistence::{
    DirectoryFileStore, ETag, FileStore, MemoryFileStore, Precondition, StoreError, StoreResult,
};
pub use query::{
    parse_batch, DataLink, ExecutionError, ExecutionResult, Instruction, ParseError,
    QueryBatchResult, QueryResult, QueryStatus, StatusCode,
};
pub use transaction::{ChangeLog, ChangeRecord, LockMode};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, "0.1.0");
    }
}
