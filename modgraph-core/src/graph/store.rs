//! Node Store
//!
//! The store owns every node in a single arena and keeps the two indices that
//! point into it: the dual-indexed node map (coordinates) and the def-use
//! index (edges). Both indices hold ids, never copies, so a node's state can
//! only be read from one place.
//!
//! # Invariants
//!
//! 1. Every use target in the def-use index is in the node map under its own
//!    (owner, key).
//! 2. Expat nodes are never use targets.
//! 3. The node map's by-owner and by-key sub-indices agree.
//! 4. A coordinate holds at most one node and a node sits at exactly one
//!    coordinate.
//!
//! All mutating operations check what they need up front and only then touch
//! the indices, so a rejected operation leaves the store unchanged.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::debug;

use super::def_use::DefUseIndex;
use super::node::{GraphNode, NodeId, NodeOwner};
use super::node_map::DualIndexedNodeMap;
use crate::error::{GraphError, Result};
use crate::jobs::FileId;
use crate::key::DependencyKey;

/// Arena of graph nodes plus the indices over them.
#[derive(Debug, Default)]
pub struct NodeStore {
    /// All live nodes, indexed by ID.
    nodes: IndexMap<NodeId, GraphNode>,

    /// Next id to hand out. Ids are never reused.
    next_id: u64,

    node_map: DualIndexedNodeMap,
    def_use: DefUseIndex,
}

impl NodeStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node at (owner, key).
    ///
    /// The coordinate must be free; replacing a node that might still be a
    /// use target would leave its edges dangling.
    pub fn insert(&mut self, key: DependencyKey, owner: NodeOwner) -> Result<NodeId> {
        if let Some(existing) = self.node_map.lookup(&owner, &key) {
            return Err(GraphError::DuplicateCoordinate {
                owner,
                key,
                existing,
            });
        }

        Ok(self.allocate(key, owner))
    }

    /// Return the node at (owner, key), creating it if the coordinate is free.
    pub fn find_or_create(&mut self, key: DependencyKey, owner: NodeOwner) -> NodeId {
        match self.node_map.lookup(&owner, &key) {
            Some(id) => id,
            None => self.allocate(key, owner),
        }
    }

    /// Place a fresh node at a coordinate the caller has checked is free.
    fn allocate(&mut self, key: DependencyKey, owner: NodeOwner) -> NodeId {
        let id = NodeId::from(self.next_id);
        self.next_id += 1;

        debug!(node = id.raw(), %owner, %key, "inserting node");
        let previous = self.node_map.insert(owner.clone(), key.clone(), id);
        debug_assert!(previous.is_none());
        self.nodes.insert(id, GraphNode::new(id, key, owner));
        id
    }

    /// Record that `use_node` uses the definition `def`.
    ///
    /// Returns true iff the edge is new. The use node must be live and owned
    /// by a file.
    pub fn record_edge(&mut self, def: DependencyKey, use_node: NodeId) -> Result<bool> {
        let node = self.nodes.get(&use_node).ok_or(GraphError::UnknownNode(use_node))?;
        if node.is_expat() {
            return Err(GraphError::ExpatUse {
                node: use_node,
                key: node.key().clone(),
            });
        }
        if self.node_map.lookup(node.owner(), node.key()) != Some(use_node) {
            return Err(GraphError::DanglingUse {
                def,
                node: use_node,
            });
        }
        Ok(self.def_use.record_use(def, use_node))
    }

    /// Remove a node: its edges first, then its coordinate.
    ///
    /// Removing a node that is already gone is a no-op and returns `None`.
    pub fn remove(&mut self, id: NodeId) -> Result<Option<GraphNode>> {
        let Some(node) = self.nodes.get(&id) else {
            return Ok(None);
        };
        let owner = node.owner().clone();
        let key = node.key().clone();

        // Check the coordinate before touching anything so a failure leaves
        // the store as it was.
        let mapped = self.node_map.lookup(&owner, &key);
        if mapped != Some(id) {
            return Err(GraphError::IndexMismatch(format!(
                "expected {id:?} at ({owner}, {key}), found {mapped:?}"
            )));
        }

        self.def_use.remove_all_edges_for(id);
        if self.def_use.has_uses(id) {
            return Err(GraphError::IndexMismatch(format!(
                "{id:?} still has uses after its edges were stripped"
            )));
        }
        self.node_map.remove(&owner, &key);

        debug!(node = id.raw(), %owner, %key, "removed node");
        Ok(self.nodes.shift_remove(&id))
    }

    /// Remove every node owned by `file`.
    ///
    /// The integrator calls this before re-integrating a recompiled file.
    pub fn remove_file(&mut self, file: &FileId) -> Result<Vec<NodeId>> {
        let owner = NodeOwner::File(file.clone());
        let ids: Vec<NodeId> = self
            .node_map
            .submap_by_owner(&owner)
            .map(|keys| keys.values().copied().collect())
            .unwrap_or_default();

        for &id in &ids {
            self.remove(id)?;
        }
        debug!(%file, removed = ids.len(), "removed file from graph");
        Ok(ids)
    }

    /// Give an expat node the file that turned out to define it.
    ///
    /// This is the only way a node's owner changes, and it happens at most
    /// once: nodes that already belong to a file are rejected.
    pub fn move_node(&mut self, id: NodeId, file: FileId) -> Result<()> {
        let node = self.nodes.get(&id).ok_or(GraphError::UnknownNode(id))?;
        let old_owner = node.owner().clone();
        let key = node.key().clone();

        if let NodeOwner::File(current) = &old_owner {
            return Err(GraphError::AlreadyOwned {
                node: id,
                key,
                current: current.clone(),
                requested: file,
            });
        }
        let new_owner = NodeOwner::File(file);
        if let Some(existing) = self.node_map.lookup(&new_owner, &key) {
            return Err(GraphError::DuplicateCoordinate {
                owner: new_owner,
                key,
                existing,
            });
        }

        match self.node_map.remove(&old_owner, &key) {
            Some(removed) if removed == id => {}
            other => {
                return Err(GraphError::IndexMismatch(format!(
                    "expected {id:?} at ({old_owner}, {key}), found {other:?}"
                )));
            }
        }
        debug!(node = id.raw(), from = %old_owner, to = %new_owner, %key, "moving node");
        self.node_map.insert(new_owner.clone(), key, id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.set_owner(new_owner);
        }
        Ok(())
    }

    /// Get a reference to a node.
    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    pub fn lookup(&self, owner: &NodeOwner, key: &DependencyKey) -> Option<NodeId> {
        self.node_map.lookup(owner, key)
    }

    pub fn is_traced(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(GraphNode::is_traced)
    }

    /// Mark a node traced. Returns true if this call traced it.
    pub(crate) fn mark_traced(&mut self, id: NodeId) -> bool {
        self.nodes
            .get_mut(&id)
            .is_some_and(GraphNode::mark_traced)
    }

    /// Nodes owned by `owner`. Empty if it owns nothing.
    pub fn nodes_owned_by<'a>(&'a self, owner: &NodeOwner) -> impl Iterator<Item = &'a GraphNode> + 'a {
        self.node_map
            .submap_by_owner(owner)
            .into_iter()
            .flat_map(|keys| keys.values())
            .filter_map(|id| self.nodes.get(id))
    }

    /// Nodes owned by `file`.
    pub fn nodes_in_file<'a>(&'a self, file: &FileId) -> impl Iterator<Item = &'a GraphNode> + 'a {
        self.nodes_owned_by(&NodeOwner::File(file.clone()))
    }

    /// Every node carrying `key`, across all owners.
    pub fn nodes_with_key<'a>(&'a self, key: &DependencyKey) -> impl Iterator<Item = &'a GraphNode> + 'a {
        self.node_map
            .submap_by_key(key)
            .into_iter()
            .flat_map(|owners| owners.values())
            .filter_map(|id| self.nodes.get(id))
    }

    /// Nodes that use `def`.
    pub fn uses_of<'a>(&'a self, def: &DependencyKey) -> impl Iterator<Item = NodeId> + 'a {
        self.def_use.uses_of(def)
    }

    /// Definitions that `use_node` uses.
    pub fn definitions_using(&self, use_node: NodeId) -> impl Iterator<Item = &DependencyKey> + '_ {
        self.def_use.definitions_using(use_node)
    }

    /// All live nodes, in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// All def-use edges.
    pub fn edges(&self) -> impl Iterator<Item = (&DependencyKey, NodeId)> {
        self.def_use.edges()
    }

    /// Files that currently own at least one node.
    pub fn files(&self) -> impl Iterator<Item = &FileId> {
        self.node_map.owners().filter_map(NodeOwner::file)
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.def_use.edge_count()
    }

    pub fn traced_count(&self) -> usize {
        self.nodes.values().filter(|node| node.is_traced()).count()
    }

    /// Walk both indices and check every store invariant.
    pub fn verify(&self) -> Result<()> {
        self.node_map.check_consistency()?;

        let mut placed = HashSet::with_capacity(self.nodes.len());
        for (owner, key, id) in self.node_map.iter() {
            let node = self.nodes.get(&id).ok_or(GraphError::UnknownNode(id))?;
            if node.owner() != owner || node.key() != key {
                return Err(GraphError::IndexMismatch(format!(
                    "{id:?} is mapped at ({owner}, {key}) but is ({}, {})",
                    node.owner(),
                    node.key()
                )));
            }
            if !placed.insert(id) {
                return Err(GraphError::IndexMismatch(format!(
                    "{id:?} is mapped at more than one coordinate"
                )));
            }
        }
        if placed.len() != self.nodes.len() {
            return Err(GraphError::IndexMismatch(format!(
                "{} nodes in the arena but {} in the node map",
                self.nodes.len(),
                placed.len()
            )));
        }

        for (def, use_node) in self.def_use.edges() {
            let node = self.nodes.get(&use_node).ok_or_else(|| GraphError::DanglingUse {
                def: def.clone(),
                node: use_node,
            })?;
            if node.is_expat() {
                return Err(GraphError::ExpatUse {
                    node: use_node,
                    key: node.key().clone(),
                });
            }
            if self.node_map.lookup(node.owner(), node.key()) != Some(use_node) {
                return Err(GraphError::DanglingUse {
                    def: def.clone(),
                    node: use_node,
                });
            }
        }

        if !self.def_use.is_symmetric() {
            return Err(GraphError::IndexMismatch(
                "def-use forward and reverse indices disagree".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
impl NodeStore {
    /// Record an edge straight into the def-use index, skipping every check.
    pub(crate) fn record_edge_unchecked(&mut self, def: DependencyKey, use_node: NodeId) {
        self.def_use.record_use(def, use_node);
    }
}
