//! Statement and batch results
//!
//! Results are built by the executor and handed to the caller unchanged.

use super::ExecutionError;
use crate::graph::{GraphEdge, GraphNode};
use crate::persistence::ETag;
use bytes::Bytes;
use std::fmt;

/// Outcome class of a statement or batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    /// Malformed statement or invalid select chain; nothing ran
    BadRequest,
    NotFound,
    /// Key or index already taken, or the checkpoint changed underneath us
    Conflict,
    /// Gave up waiting for the graph lock
    Timeout,
    InternalError,
}

impl StatusCode {
    pub fn is_ok(self) -> bool {
        self == StatusCode::Ok
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCode::Ok => "Ok",
            StatusCode::BadRequest => "BadRequest",
            StatusCode::NotFound => "NotFound",
            StatusCode::Conflict => "Conflict",
            StatusCode::Timeout => "Timeout",
            StatusCode::InternalError => "InternalError",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryStatus {
    pub code: StatusCode,
    pub error: Option<String>,
}

impl QueryStatus {
    pub fn ok() -> Self {
        QueryStatus {
            code: StatusCode::Ok,
            error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code.is_ok()
    }
}

impl From<&ExecutionError> for QueryStatus {
    fn from(error: &ExecutionError) -> Self {
        QueryStatus {
            code: error.status_code(),
            error: Some(error.to_string()),
        }
    }
}

/// One named blob resolved by a `return` clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLink {
    pub node_key: String,
    pub name: String,
    pub file_id: String,
    pub data: Bytes,
    pub etag: ETag,
}

/// Result of one statement, or of one aliased select step
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub status: QueryStatus,
    pub alias: Option<String>,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub data: Vec<DataLink>,
}

impl QueryResult {
    pub fn ok() -> Self {
        QueryResult {
            status: QueryStatus::ok(),
            alias: None,
            nodes: Vec::new(),
            edges: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn with_nodes(nodes: Vec<GraphNode>) -> Self {
        QueryResult {
            nodes,
            ..QueryResult::ok()
        }
    }

    pub fn with_edges(edges: Vec<GraphEdge>) -> Self {
        QueryResult {
            edges,
            ..QueryResult::ok()
        }
    }

    pub fn failed(error: &ExecutionError) -> Self {
        QueryResult {
            status: error.into(),
            ..QueryResult::ok()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    pub fn node(&self, key: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.key == key)
    }

    /// Data resolved for `node_key` under `name`
    pub fn data_for(&self, node_key: &str, name: &str) -> Option<&DataLink> {
        self.data
            .iter()
            .find(|d| d.node_key == node_key && d.name == name)
    }
}

/// Result of a whole batch
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBatchResult {
    pub status: QueryStatus,
    /// Every statement result in order, aliased select steps included. On failure
    /// the last item carries the error.
    pub items: Vec<QueryResult>,
}

impl QueryBatchResult {
    pub fn ok(items: Vec<QueryResult>) -> Self {
        QueryBatchResult {
            status: QueryStatus::ok(),
            items,
        }
    }

    /// Partial results followed by the failing status
    pub fn failed(mut items: Vec<QueryResult>, error: &ExecutionError) -> Self {
        items.push(QueryResult::failed(error));
        QueryBatchResult {
            status: error.into(),
            items,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Result carrying `alias`; the last one wins when an alias repeats
    pub fn get(&self, alias: &str) -> Option<&QueryResult> {
        self.items
            .iter()
            .rev()
            .find(|item| item.alias.as_deref() == Some(alias))
    }

    pub fn last(&self) -> Option<&QueryResult> {
        self.items.last()
    }

    /// The last result, or a status-only result when there is none
    pub fn into_last(mut self) -> QueryResult {
        self.items.pop().unwrap_or_else(|| QueryResult {
            status: self.status,
            ..QueryResult::ok()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_lookup_by_alias() {
        let mut first = QueryResult::with_nodes(vec![GraphNode::new("a")]);
        first.alias = Some("users".to_string());
        let second = QueryResult::with_nodes(vec![GraphNode::new("b")]);

        let batch = QueryBatchResult::ok(vec![first, second]);
        assert!(batch.is_ok());
        assert_eq!(batch.get("users").unwrap().nodes[0].key, "a");
        assert!(batch.get("missing").is_none());
        assert_eq!(batch.into_last().nodes[0].key, "b");
    }

    #[test]
    fn test_failed_batch_carries_error() {
        let error = ExecutionError::NotFound("Node x not found".to_string());
        let batch = QueryBatchResult::failed(vec![QueryResult::ok()], &error);

        assert_eq!(batch.status.code, StatusCode::NotFound);
        assert_eq!(batch.items.len(), 2);
        let last = batch.into_last();
        assert!(!last.is_ok());
        assert!(last.status.error.unwrap().contains("Node x"));
    }

    #[test]
    fn test_empty_batch_into_last() {
        let batch = QueryBatchResult::ok(Vec::new());
        assert!(batch.into_last().is_ok());
    }
}
