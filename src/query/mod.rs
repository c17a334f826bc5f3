//! Query processing module
//!
//! Statement text flows through:
//! - `lexer`: pest tokenizer producing a flat token stream
//! - `parser`: backtracking builders folding tokens into instructions
//! - `validator`: chain shape and inline data checks, before anything runs
//! - `executor`: per-instruction processors run inside a transaction

pub mod ast;
pub mod cursor;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod validator;

// Re-export main types
pub use ast::{
    ChangeType, DeleteInstruction, EdgeInstruction, EdgeSelect, Instruction, JoinKind,
    NodeInstruction, NodeSelect, SelectInstruction, SelectStep,
};
pub use executor::{
    DataLink, ExecutionError, ExecutionResult, QueryBatchResult, QueryResult, QueryStatus,
    StatusCode,
};
pub use lexer::{tokenize, Token, TokenKind};
pub use parser::{parse_batch, ParseError, ParseResult};
