//! Def-Use Index
//!
//! Records which nodes use which definitions. The forward direction
//! (definition key -> using nodes) drives change propagation; the reverse
//! direction (node -> keys it uses) exists so that removing a node can strip
//! its edges without scanning every definition.

use std::collections::HashMap;

use indexmap::IndexSet;

use super::node::NodeId;
use crate::key::DependencyKey;

/// One-to-many map from definitions to the nodes that use them.
#[derive(Debug, Default)]
pub struct DefUseIndex {
    uses_by_def: HashMap<DependencyKey, IndexSet<NodeId>>,
    defs_by_use: HashMap<NodeId, IndexSet<DependencyKey>>,
    edge_count: usize,
}

impl DefUseIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `use_node` uses `def`.
    ///
    /// Returns true iff the edge is new.
    pub fn record_use(&mut self, def: DependencyKey, use_node: NodeId) -> bool {
        let inserted = self
            .uses_by_def
            .entry(def.clone())
            .or_default()
            .insert(use_node);
        if inserted {
            self.defs_by_use.entry(use_node).or_default().insert(def);
            self.edge_count += 1;
        }
        inserted
    }

    /// Nodes using `def`, in the order the edges were recorded.
    pub fn uses_of(&self, def: &DependencyKey) -> impl Iterator<Item = NodeId> + '_ {
        self.uses_by_def.get(def).into_iter().flatten().copied()
    }

    /// Definitions `use_node` depends on.
    pub fn definitions_using(&self, use_node: NodeId) -> impl Iterator<Item = &DependencyKey> + '_ {
        self.defs_by_use.get(&use_node).into_iter().flatten()
    }

    pub fn has_uses(&self, use_node: NodeId) -> bool {
        self.defs_by_use.contains_key(&use_node)
    }

    pub fn contains(&self, def: &DependencyKey, use_node: NodeId) -> bool {
        self.uses_by_def
            .get(def)
            .is_some_and(|uses| uses.contains(&use_node))
    }

    /// Drop every edge whose use side is `use_node`.
    ///
    /// Returns the definitions it was detached from.
    pub fn remove_all_edges_for(&mut self, use_node: NodeId) -> Vec<DependencyKey> {
        let Some(defs) = self.defs_by_use.remove(&use_node) else {
            return Vec::new();
        };
        for def in &defs {
            if let Some(uses) = self.uses_by_def.get_mut(def) {
                uses.shift_remove(&use_node);
                if uses.is_empty() {
                    self.uses_by_def.remove(def);
                }
            }
        }
        self.edge_count -= defs.len();
        defs.into_iter().collect()
    }

    /// Every (definition, use) edge.
    pub fn edges(&self) -> impl Iterator<Item = (&DependencyKey, NodeId)> {
        self.uses_by_def
            .iter()
            .flat_map(|(def, uses)| uses.iter().map(move |use_node| (def, *use_node)))
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Whether both directions hold the same edges.
    pub(crate) fn is_symmetric(&self) -> bool {
        let reverse_count: usize = self.defs_by_use.values().map(IndexSet::len).sum();
        reverse_count == self.edge_count
            && self.edges().all(|(def, use_node)| {
                self.defs_by_use
                    .get(&use_node)
                    .is_some_and(|defs| defs.contains(def))
            })
    }
}
