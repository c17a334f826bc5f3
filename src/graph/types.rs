//! Core type definitions for the graph map

use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary key of an edge: (from key, to key, edge type)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct EdgeKey {
    pub from_key: String,
    pub to_key: String,
    pub edge_type: String,
}

impl EdgeKey {
    pub fn new(
        from_key: impl Into<String>,
        to_key: impl Into<String>,
        edge_type: impl Into<String>,
    ) -> Self {
        EdgeKey {
            from_key: from_key.into(),
            to_key: to_key.into(),
            edge_type: edge_type.into(),
        }
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}:{}", self.from_key, self.to_key, self.edge_type)
    }
}

/// Which side of an edge a join pivots to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Follow edges from their `from` side to their `to` side
    Outgoing,
    /// Follow edges from their `to` side back to their `from` side
    Incoming,
    /// Both of the above
    Both,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_key() {
        let key = EdgeKey::new("a", "b", "knows");
        assert_eq!(format!("{}", key), "a->b:knows");
    }

    #[test]
    fn test_edge_key_ordering() {
        let k1 = EdgeKey::new("a", "b", "knows");
        let k2 = EdgeKey::new("a", "c", "knows");
        assert!(k1 < k2);
    }
}
