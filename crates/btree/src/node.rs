//! B+Tree node definitions.

use common::{PageId, RecordId};
use serde::{Deserialize, Serialize};
use types::Value;

/// The type of a B+Tree node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    Internal,
    Leaf,
}

/// A B+Tree node, either internal or leaf. Keys are scalar `Value`s; one
/// index covers one attribute.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum BTreeNode {
    /// Internal node with keys and child pointers (n keys, n+1 children).
    Internal { keys: Vec<Value>, children: Vec<PageId> },
    /// Leaf node with key-value entries, kept in ascending key order.
    Leaf {
        entries: Vec<(Value, RecordId)>,
        /// Pointer to the next leaf, chaining leaves for ordered scans.
        next_leaf: Option<PageId>,
    },
}

impl BTreeNode {
    pub fn new_leaf() -> Self {
        Self::Leaf {
            entries: Vec::new(),
            next_leaf: None,
        }
    }

    pub fn new_internal(keys: Vec<Value>, children: Vec<PageId>) -> Self {
        Self::Internal { keys, children }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Internal { .. } => NodeType::Internal,
            Self::Leaf { .. } => NodeType::Leaf,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Internal { keys, .. } => keys.len(),
            Self::Leaf { entries, .. } => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_leaf_is_empty() {
        let leaf = BTreeNode::new_leaf();
        assert!(leaf.is_leaf());
        assert!(leaf.is_empty());
        assert_eq!(leaf.len(), 0);
    }

    #[test]
    fn new_internal_has_correct_type() {
        let internal = BTreeNode::new_internal(vec![Value::Int(5)], vec![PageId(0), PageId(1)]);
        assert!(!internal.is_leaf());
        assert_eq!(internal.node_type(), NodeType::Internal);
        assert_eq!(internal.len(), 1);
    }

    #[test]
    fn leaf_with_entries() {
        let leaf = BTreeNode::Leaf {
            entries: vec![
                (Value::Int(1), RecordId { page_id: PageId(0), slot: 0 }),
                (Value::Int(2), RecordId { page_id: PageId(0), slot: 1 }),
            ],
            next_leaf: None,
        };
        assert!(leaf.is_leaf());
        assert_eq!(leaf.len(), 2);
        assert!(!leaf.is_empty());
    }
}
