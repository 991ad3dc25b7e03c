//! Change Propagation
//!
//! Turns "these definitions changed" into "these nodes are affected".
//!
//! # Algorithm
//!
//! A breadth-first fixpoint over def-use edges:
//!
//! 1. Seed the worklist. Each changed node that is not traced yet is marked
//!    traced, reported, and has its key pushed. Already traced seeds
//!    contribute nothing.
//! 2. Pop a key and look up every node that uses it.
//! 3. Each untraced user is marked traced, reported, and its own key is
//!    pushed, since a declaration that uses something may itself be used.
//! 4. Stop when the worklist is empty.
//!
//! Traced nodes are never expanded again, for the lifetime of the graph. That
//! bounds the total work over many incremental builds by the number of edges,
//! instead of re-walking settled parts of the graph on every build. The order
//! in which nodes are reported is not meaningful; only the set is.

use std::collections::{HashSet, VecDeque};

use tracing::trace;

use super::node::NodeId;
use super::store::NodeStore;
use crate::key::DependencyKey;

/// Walks def-use edges from a set of changed nodes, marking as it goes.
pub struct ChangePropagator<'a> {
    store: &'a mut NodeStore,
}

impl<'a> ChangePropagator<'a> {
    pub fn new(store: &'a mut NodeStore) -> Self {
        Self { store }
    }

    /// Trace everything reachable from `changed`.
    ///
    /// Returns the nodes this call marked traced. Ids that are not in the
    /// store are ignored.
    pub fn propagate<I>(&mut self, changed: I) -> Vec<NodeId>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let mut newly_traced = Vec::new();
        let mut queue = VecDeque::new();
        let mut expanded: HashSet<DependencyKey> = HashSet::new();

        for id in changed {
            let Some(key) = self.store.node(id).map(|node| node.key().clone()) else {
                continue;
            };
            if !self.store.mark_traced(id) {
                continue;
            }
            trace!(node = id.raw(), %key, "traced changed node");
            newly_traced.push(id);
            queue.push_back(key);
        }

        // BFS over definitions
        while let Some(def) = queue.pop_front() {
            if !expanded.insert(def.clone()) {
                continue;
            }

            let uses: Vec<NodeId> = self.store.uses_of(&def).collect();
            for use_node in uses {
                if !self.store.mark_traced(use_node) {
                    continue;
                }
                newly_traced.push(use_node);

                if let Some(node) = self.store.node(use_node) {
                    trace!(node = use_node.raw(), key = %node.key(), via = %def, "traced use");
                    if !expanded.contains(node.key()) {
                        queue.push_back(node.key().clone());
                    }
                }
            }
        }

        newly_traced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeOwner;
    use crate::jobs::FileId;
    use crate::key::{DeclAspect, Designator};

    fn key(name: &str) -> DependencyKey {
        DependencyKey::new(DeclAspect::Interface, Designator::top_level(name))
    }

    fn owner(name: &str) -> NodeOwner {
        NodeOwner::File(FileId::from(name))
    }

    /// a.x <- b.y <- c.z, each node using the previous key.
    fn chain(store: &mut NodeStore) -> (NodeId, NodeId, NodeId) {
        let x = store.insert(key("x"), owner("a.deps")).unwrap();
        let y = store.insert(key("y"), owner("b.deps")).unwrap();
        let z = store.insert(key("z"), owner("c.deps")).unwrap();
        store.record_edge(key("x"), y).unwrap();
        store.record_edge(key("y"), z).unwrap();
        (x, y, z)
    }

    #[test]
    fn propagation_follows_transitive_uses() {
        let mut store = NodeStore::new();
        let (x, y, z) = chain(&mut store);

        let traced: HashSet<_> = ChangePropagator::new(&mut store).propagate([x]).into_iter().collect();

        assert_eq!(traced, HashSet::from([x, y, z]));
        assert!(store.is_traced(x) && store.is_traced(y) && store.is_traced(z));
    }

    #[test]
    fn exhausted_frontier_yields_nothing_new() {
        let mut store = NodeStore::new();
        let (x, _, _) = chain(&mut store);

        ChangePropagator::new(&mut store).propagate([x]);
        let again = ChangePropagator::new(&mut store).propagate([x]);

        assert!(again.is_empty());
        assert_eq!(store.traced_count(), 3);
    }

    #[test]
    fn traced_nodes_are_not_re_expanded() {
        let mut store = NodeStore::new();
        let (x, y, z) = chain(&mut store);

        let first = ChangePropagator::new(&mut store).propagate([x]);
        assert_eq!(first.len(), 3);

        // A user of `x` that shows up later is not reached through `x` again.
        let late = store.insert(key("w"), owner("d.deps")).unwrap();
        store.record_edge(key("x"), late).unwrap();
        let second = ChangePropagator::new(&mut store).propagate([x]);

        assert!(second.is_empty());
        assert!(!store.is_traced(late));

        // Nor through a traced node further down the chain.
        store.record_edge(key("z"), late).unwrap();
        assert!(ChangePropagator::new(&mut store).propagate([y, z]).is_empty());
        assert!(!store.is_traced(late));
    }

    #[test]
    fn untraced_seed_next_to_traced_ones_still_expands() {
        let mut store = NodeStore::new();
        let (x, _, _) = chain(&mut store);
        ChangePropagator::new(&mut store).propagate([x]);

        let fresh = store.insert(key("v"), owner("e.deps")).unwrap();
        let user = store.insert(key("u"), owner("f.deps")).unwrap();
        store.record_edge(key("v"), user).unwrap();

        let traced: HashSet<_> = ChangePropagator::new(&mut store).propagate([x, fresh]).into_iter().collect();

        assert_eq!(traced, HashSet::from([fresh, user]));
    }

    #[test]
    fn cycles_terminate() {
        let mut store = NodeStore::new();
        let p = store.insert(key("p"), owner("a.deps")).unwrap();
        let q = store.insert(key("q"), owner("b.deps")).unwrap();
        store.record_edge(key("p"), q).unwrap();
        store.record_edge(key("q"), p).unwrap();

        let traced = ChangePropagator::new(&mut store).propagate([p]);

        assert_eq!(traced.len(), 2);
    }

    #[test]
    fn users_of_a_key_in_any_file_are_found() {
        let mut store = NodeStore::new();
        // Same key provided from two files; a user of that key in a third.
        let a = store.insert(key("x"), owner("a.deps")).unwrap();
        store.insert(key("x"), owner("b.deps")).unwrap();
        let user = store.insert(key("u"), owner("c.deps")).unwrap();
        store.record_edge(key("x"), user).unwrap();

        let traced = ChangePropagator::new(&mut store).propagate([a]);

        assert!(traced.contains(&user));
    }

    #[test]
    fn unknown_seeds_are_ignored() {
        let mut store = NodeStore::new();
        let traced = ChangePropagator::new(&mut store).propagate([NodeId::from(99)]);
        assert!(traced.is_empty());
    }
}
