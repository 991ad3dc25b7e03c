//! Declaration Graph
//!
//! This module implements the bookkeeping core of the dependency graph: the
//! nodes, the indices over them, and the change propagation that walks them.
//!
//! # Overview
//!
//! - Nodes stand for declaration-level facts, keyed by a `DependencyKey` and
//!   owned by a file (or by no file yet: "expat").
//! - Edges run from a definition key to the nodes that use it. A key, not a
//!   node, is the definition side, so one edge reaches every file that
//!   provides that key.
//!
//! When definitions change, we walk from their keys to their users, then to
//! the users' users, and so on. Every visited node stays traced for the rest
//! of the graph's life.
//!
//! # Design Decisions
//!
//! 1. All nodes live in one arena inside `NodeStore`, addressed by `NodeId`.
//!    Both indices store ids, so there is never a second copy of a node to
//!    drift out of sync.
//!
//! 2. The node map is indexed by (owner, key) and can be queried by either
//!    half in O(1).
//!
//! 3. The def-use index keeps a reverse direction (node -> keys it uses) so
//!    removing a node does not scan every definition.

mod def_use;
mod node;
mod node_map;
mod propagate;
mod store;

pub use def_use::DefUseIndex;
pub use node::{GraphNode, NodeId, NodeOwner};
pub use node_map::DualIndexedNodeMap;
pub use propagate::ChangePropagator;
pub use store::NodeStore;
