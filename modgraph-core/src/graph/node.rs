//! Graph Nodes
//!
//! This module defines the node type that lives in the dependency graph.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::jobs::FileId;
use crate::key::DependencyKey;

/// Stable identifier for a node in the dependency graph.
///
/// Ids are handed out by the node store and never reused, so an id that
/// outlives its node can only ever miss, never alias another node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Which file, if any, a node belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeOwner {
    /// Referenced as a definition before any file was seen to define it.
    Expat,

    /// Defined by (or used from) the given file.
    File(FileId),
}

impl NodeOwner {
    pub fn file(&self) -> Option<&FileId> {
        match self {
            NodeOwner::Expat => None,
            NodeOwner::File(file) => Some(file),
        }
    }

    pub fn is_expat(&self) -> bool {
        matches!(self, NodeOwner::Expat)
    }
}

impl From<FileId> for NodeOwner {
    fn from(file: FileId) -> Self {
        NodeOwner::File(file)
    }
}

impl From<Option<FileId>> for NodeOwner {
    fn from(file: Option<FileId>) -> Self {
        file.map_or(NodeOwner::Expat, NodeOwner::File)
    }
}

impl fmt::Display for NodeOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeOwner::Expat => f.write_str("<expat>"),
            NodeOwner::File(file) => write!(f, "{file}"),
        }
    }
}

/// One declaration-level fact.
#[derive(Debug)]
pub struct GraphNode {
    /// Unique identifier for this node.
    id: NodeId,

    /// The fact this node stands for. Fixed at creation.
    key: DependencyKey,

    /// Owning file. Only the store may change it, and only Expat -> File.
    owner: NodeOwner,

    /// Set once propagation has visited this node. Never cleared.
    traced: bool,
}

impl GraphNode {
    pub(crate) fn new(id: NodeId, key: DependencyKey, owner: NodeOwner) -> Self {
        Self {
            id,
            key,
            owner,
            traced: false,
        }
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn key(&self) -> &DependencyKey {
        &self.key
    }

    pub fn owner(&self) -> &NodeOwner {
        &self.owner
    }

    /// The owning file, or `None` for an expat node.
    pub fn file(&self) -> Option<&FileId> {
        self.owner.file()
    }

    pub fn is_expat(&self) -> bool {
        self.owner.is_expat()
    }

    pub fn is_traced(&self) -> bool {
        self.traced
    }

    /// Mark the node traced. Returns true if it was not traced before.
    pub(crate) fn mark_traced(&mut self) -> bool {
        !std::mem::replace(&mut self.traced, true)
    }

    pub(crate) fn set_owner(&mut self, owner: NodeOwner) {
        self.owner = owner;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{DeclAspect, Designator};

    fn key(name: &str) -> DependencyKey {
        DependencyKey::new(DeclAspect::Interface, Designator::top_level(name))
    }

    #[test]
    fn new_node_starts_untraced() {
        let node = GraphNode::new(NodeId::from(1), key("x"), FileId::from("a.deps").into());
        assert!(!node.is_traced());
        assert!(!node.is_expat());
        assert_eq!(node.file().map(FileId::as_str), Some("a.deps"));
    }

    #[test]
    fn tracing_is_one_way() {
        let mut node = GraphNode::new(NodeId::from(1), key("x"), NodeOwner::Expat);

        assert!(node.mark_traced());
        assert!(node.is_traced());

        // Already traced: reports no transition
        assert!(!node.mark_traced());
        assert!(node.is_traced());
    }

    #[test]
    fn owner_from_optional_file() {
        assert_eq!(NodeOwner::from(None), NodeOwner::Expat);
        assert_eq!(
            NodeOwner::from(Some(FileId::from("b.deps"))),
            NodeOwner::File(FileId::from("b.deps"))
        );
        assert_eq!(NodeOwner::Expat.to_string(), "<expat>");
    }
}
