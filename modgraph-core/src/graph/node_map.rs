//! Dual-Indexed Node Map
//!
//! Nodes are addressed by a coordinate: (owner, key). The map keeps two
//! sub-indices over the same coordinates so it can answer both "what does
//! this file contain" and "which files carry this key" without scanning.
//!
//! Every mutation updates both sub-indices before returning, so a caller can
//! never observe one without the other. Expat nodes live in their own
//! `NodeOwner::Expat` partition and coexist with file-owned nodes of the
//! same key.

use indexmap::IndexMap;

use super::node::{NodeId, NodeOwner};
use crate::error::{GraphError, Result};
use crate::key::DependencyKey;

/// Node ids indexed by owner and by key at the same time.
#[derive(Debug, Default)]
pub struct DualIndexedNodeMap {
    by_owner: IndexMap<NodeOwner, IndexMap<DependencyKey, NodeId>>,
    by_key: IndexMap<DependencyKey, IndexMap<NodeOwner, NodeId>>,
}

impl DualIndexedNodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `id` at (owner, key), returning the previous occupant.
    pub fn insert(&mut self, owner: NodeOwner, key: DependencyKey, id: NodeId) -> Option<NodeId> {
        let previous = self
            .by_owner
            .entry(owner.clone())
            .or_default()
            .insert(key.clone(), id);
        self.by_key.entry(key).or_default().insert(owner, id);
        previous
    }

    /// Clear the coordinate, returning its occupant.
    ///
    /// Empty sub-maps are dropped so `owners()` and `keys()` only report
    /// coordinates that still hold a node.
    pub fn remove(&mut self, owner: &NodeOwner, key: &DependencyKey) -> Option<NodeId> {
        let removed = remove_nested(&mut self.by_owner, owner, key);
        let mirrored = remove_nested(&mut self.by_key, key, owner);
        debug_assert_eq!(
            removed, mirrored,
            "node map sub-indices disagree at ({owner}, {key})"
        );
        removed
    }

    pub fn lookup(&self, owner: &NodeOwner, key: &DependencyKey) -> Option<NodeId> {
        self.by_owner
            .get(owner)
            .and_then(|keys| keys.get(key))
            .copied()
    }

    /// Everything held by one owner, keyed by dependency key.
    pub fn submap_by_owner(&self, owner: &NodeOwner) -> Option<&IndexMap<DependencyKey, NodeId>> {
        self.by_owner.get(owner)
    }

    /// Every owner that has a node for `key`.
    pub fn submap_by_key(&self, key: &DependencyKey) -> Option<&IndexMap<NodeOwner, NodeId>> {
        self.by_key.get(key)
    }

    pub fn owners(&self) -> impl Iterator<Item = &NodeOwner> {
        self.by_owner.keys()
    }

    pub fn keys(&self) -> impl Iterator<Item = &DependencyKey> {
        self.by_key.keys()
    }

    /// All coordinates with their nodes, grouped by owner.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeOwner, &DependencyKey, NodeId)> {
        self.by_owner
            .iter()
            .flat_map(|(owner, keys)| keys.iter().map(move |(key, id)| (owner, key, *id)))
    }

    pub fn len(&self) -> usize {
        self.by_owner.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_owner.is_empty()
    }

    /// Check that the two sub-indices describe exactly the same coordinates.
    pub fn check_consistency(&self) -> Result<()> {
        let mut mirrored = 0;
        for (key, owners) in &self.by_key {
            if owners.is_empty() {
                return Err(GraphError::IndexMismatch(format!(
                    "empty by-key submap left behind for {key}"
                )));
            }
            for (owner, id) in owners {
                if self.lookup(owner, key) != Some(*id) {
                    return Err(GraphError::IndexMismatch(format!(
                        "{id:?} is under key {key} for {owner} but not under that owner"
                    )));
                }
                mirrored += 1;
            }
        }

        for (owner, keys) in &self.by_owner {
            if keys.is_empty() {
                return Err(GraphError::IndexMismatch(format!(
                    "empty by-owner submap left behind for {owner}"
                )));
            }
        }

        // Every by-key entry was found by owner; equal sizes rule out extras.
        let by_owner = self.len();
        if mirrored != by_owner {
            return Err(GraphError::IndexMismatch(format!(
                "by-owner index holds {by_owner} coordinates, by-key holds {mirrored}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
impl DualIndexedNodeMap {
    /// Write one side of the map only.
    pub(crate) fn insert_by_owner_only(&mut self, owner: NodeOwner, key: DependencyKey, id: NodeId) {
        self.by_owner.entry(owner).or_default().insert(key, id);
    }
}

fn remove_nested<A, B>(map: &mut IndexMap<A, IndexMap<B, NodeId>>, outer: &A, inner: &B) -> Option<NodeId>
where
    A: std::hash::Hash + Eq,
    B: std::hash::Hash + Eq,
{
    let submap = map.get_mut(outer)?;
    let removed = submap.shift_remove(inner);
    if submap.is_empty() {
        map.shift_remove(outer);
    }
    removed
}
