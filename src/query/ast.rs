//! Instruction model
//!
//! One [`Instruction`] is built per statement. The set of variants is closed and
//! every processor matches on it exhaustively.

use crate::graph::{Tags, DELETE_MARKER};
use indexmap::IndexMap;

/// What a node or edge statement does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// `add`: create, fail if present
    Add,
    /// `upsert` / `update`: merge into existing, or create
    Set,
    /// `delete node` / `delete edge`
    Delete,
}

/// `add|upsert|delete node key=... [ifexist] [set ...] [index ...] [foreignkey ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInstruction {
    pub change_type: ChangeType,
    pub key: String,
    pub if_exist: bool,
    /// Tags as written; `-name` entries are delete markers for tags and data
    pub tags: Tags,
    /// Inline data: name -> base64 payload
    pub data: IndexMap<String, String>,
    /// Unique index names; `-name` removes one on upsert
    pub indexes: Vec<String>,
    /// Foreign keys: field -> target pattern; `-field` removes one on upsert
    pub foreign_keys: Tags,
}

impl NodeInstruction {
    pub fn new(change_type: ChangeType, key: impl Into<String>) -> Self {
        NodeInstruction {
            change_type,
            key: key.into(),
            if_exist: false,
            tags: Tags::new(),
            data: IndexMap::new(),
            indexes: Vec::new(),
            foreign_keys: Tags::new(),
        }
    }

    /// Data names carrying a delete marker in the set clause
    pub fn data_deletes(&self) -> Vec<String> {
        self.tags.delete_markers().map(str::to_string).collect()
    }

    /// Index names without delete markers
    pub fn added_indexes(&self) -> impl Iterator<Item = &str> {
        self.indexes
            .iter()
            .filter(|name| !name.starts_with(DELETE_MARKER))
            .map(String::as_str)
    }

    /// Index names carrying a delete marker
    pub fn removed_indexes(&self) -> impl Iterator<Item = &str> {
        self.indexes
            .iter()
            .filter_map(|name| name.strip_prefix(DELETE_MARKER))
    }
}

/// `add|upsert|delete edge from=...,to=...,type=... [ifexist] [set ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeInstruction {
    pub change_type: ChangeType,
    pub from_key: String,
    pub to_key: String,
    pub edge_type: String,
    pub if_exist: bool,
    pub tags: Tags,
}

/// `(key=...|*|tag filters) [alias]`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSelect {
    /// Key pattern; `None` matches every key
    pub key: Option<String>,
    pub tags: Tags,
    pub alias: Option<String>,
}

/// `[from=...,to=...,type=...|*|tag filters] [alias]`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeSelect {
    pub from_key: Option<String>,
    pub to_key: Option<String>,
    pub edge_type: Option<String>,
    pub tags: Tags,
    pub alias: Option<String>,
}

/// How a select step pivots off the previous step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// `->`
    Left,
    /// `<-`
    Right,
    /// `<->`
    Full,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectStep {
    Node(NodeSelect),
    Edge(EdgeSelect),
    Join(JoinKind),
}

impl SelectStep {
    pub fn alias(&self) -> Option<&str> {
        match self {
            SelectStep::Node(s) => s.alias.as_deref(),
            SelectStep::Edge(s) => s.alias.as_deref(),
            SelectStep::Join(_) => None,
        }
    }
}

/// `select <chain> [return name[,name...]]`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectInstruction {
    pub steps: Vec<SelectStep>,
    /// Data names to resolve for the nodes of the last step
    pub return_names: Vec<String>,
}

/// `delete <chain>`: delete whatever the chain selects
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteInstruction {
    pub select: SelectInstruction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Node(NodeInstruction),
    Edge(EdgeInstruction),
    Select(SelectInstruction),
    Delete(DeleteInstruction),
}

impl Instruction {
    /// True for every instruction that can change the map
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Instruction::Select(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_mutation() {
        let select = Instruction::Select(SelectInstruction::default());
        let node = Instruction::Node(NodeInstruction::new(ChangeType::Add, "a"));
        assert!(!select.is_mutation());
        assert!(node.is_mutation());
    }

    #[test]
    fn test_index_markers() {
        let mut cmd = NodeInstruction::new(ChangeType::Set, "a");
        cmd.indexes = vec!["email".to_string(), "-phone".to_string()];
        assert_eq!(cmd.added_indexes().collect::<Vec<_>>(), vec!["email"]);
        assert_eq!(cmd.removed_indexes().collect::<Vec<_>>(), vec!["phone"]);
    }
}
