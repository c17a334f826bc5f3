//! Persistence layer
//!
//! - A byte-blob file store with optimistic-concurrency etags
//! - Node data blobs at deterministic paths derived from (node key, data name)
//! - Checkpointing of the full graph map

pub mod checkpoint;
pub mod file_store;
pub mod node_data;

pub use checkpoint::MapCheckpoint;
pub use file_store::{
    validate_path, DataETag, DirectoryFileStore, ETag, FileStore, MemoryFileStore, Precondition,
    StoreError, StoreResult,
};
pub use node_data::{node_data_file_id, NodeDataManager};
