//! Instruction execution
//!
//! Each instruction variant has one processor. Processors run inside a
//! [`Transaction`], so every change they make is logged and can be undone when a
//! later instruction of the same batch fails.

pub mod mutation;
pub mod operator;
pub mod record;

pub use record::{DataLink, QueryBatchResult, QueryResult, QueryStatus, StatusCode};

use crate::graph::GraphError;
use crate::persistence::StoreError;
use crate::query::ast::Instruction;
use crate::query::parser::ParseError;
use crate::transaction::Transaction;
use std::time::Duration;
use thiserror::Error;

/// Execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Timed out after {0:?} waiting for the graph lock")]
    LockTimeout(Duration),

    /// A delete chain's select produced no result
    #[error("Select produced no result")]
    MissingResult,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;

impl ExecutionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ExecutionError::Parse(_) | ExecutionError::BadRequest(_) => StatusCode::BadRequest,
            ExecutionError::Graph(e) => match e {
                GraphError::NodeNotFound(_)
                | GraphError::EdgeNotFound(_)
                | GraphError::InvalidEdgeSource(_)
                | GraphError::InvalidEdgeTarget(_) => StatusCode::NotFound,
                GraphError::NodeAlreadyExists(_)
                | GraphError::EdgeAlreadyExists(_)
                | GraphError::IndexConflict { .. } => StatusCode::Conflict,
            },
            ExecutionError::Store(StoreError::Conflict { .. }) => StatusCode::Conflict,
            ExecutionError::Store(_) => StatusCode::InternalError,
            ExecutionError::NotFound(_) => StatusCode::NotFound,
            ExecutionError::Conflict(_) => StatusCode::Conflict,
            ExecutionError::LockTimeout(_) => StatusCode::Timeout,
            ExecutionError::MissingResult | ExecutionError::Internal(_) => StatusCode::InternalError,
        }
    }
}

/// Run one instruction; a select may yield several results (one per aliased step)
pub async fn execute(
    trx: &mut Transaction<'_>,
    instruction: &Instruction,
) -> ExecutionResult<Vec<QueryResult>> {
    match instruction {
        Instruction::Node(cmd) => Ok(vec![mutation::process_node(trx, cmd).await?]),
        Instruction::Edge(cmd) => Ok(vec![mutation::process_edge(trx, cmd)?]),
        Instruction::Select(cmd) => operator::select(trx, cmd).await,
        Instruction::Delete(cmd) => Ok(vec![operator::delete(trx, cmd).await?]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeKey;

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                ExecutionError::Graph(GraphError::NodeNotFound("a".to_string())),
                StatusCode::NotFound,
            ),
            (
                ExecutionError::Graph(GraphError::EdgeAlreadyExists(EdgeKey::new("a", "b", "t"))),
                StatusCode::Conflict,
            ),
            (
                ExecutionError::Store(StoreError::Conflict {
                    path: "graph/map.json".to_string(),
                }),
                StatusCode::Conflict,
            ),
            (
                ExecutionError::Store(StoreError::Serialization("bad".to_string())),
                StatusCode::InternalError,
            ),
            (ExecutionError::LockTimeout(Duration::from_millis(5)), StatusCode::Timeout),
            (ExecutionError::BadRequest("x".to_string()), StatusCode::BadRequest),
            (ExecutionError::MissingResult, StatusCode::InternalError),
        ];

        for (error, code) in cases {
            assert_eq!(error.status_code(), code, "{error}");
        }
    }
}
