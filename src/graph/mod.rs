//! Core graph map implementation
//!
//! This module implements the tagged graph data model:
//! - Nodes with a unique key, tags, named data links, unique indexes and foreign keys
//! - Directed typed edges keyed by (from, to, type), with tags
//! - A map holding both, with tag / from / to / type secondary indexes

pub mod edge;
pub mod edge_index;
pub mod node;
pub mod node_index;
pub mod pattern;
pub mod store;
pub mod tag_index;
pub mod tags;
pub mod types;

// Re-export main types
pub use edge::GraphEdge;
pub use edge_index::EdgeIndex;
pub use node::{GraphLink, GraphNode};
pub use node_index::NodeIndex;
pub use pattern::{glob_match, is_wildcard};
pub use store::{GraphError, GraphMap, GraphResult, GraphSnapshot};
pub use tags::{strip_delete_marker, Tags, DELETE_MARKER};
pub use types::{Direction, EdgeKey};
