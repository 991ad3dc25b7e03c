//! Debug Export
//!
//! The graph owns no visualization. It can produce a read-only snapshot of its
//! nodes, edges and files, and hand that to whatever exporter the driver
//! installs (a dot writer, a JSON dump, a test recorder).

use serde::Serialize;

use crate::error::Result;
use crate::graph::{NodeId, NodeOwner, NodeStore};
use crate::jobs::FileId;
use crate::key::DependencyKey;

/// One node as it appears in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub key: DependencyKey,
    pub owner: NodeOwner,
    pub traced: bool,
}

/// One def-use edge: `user` uses `definition`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeRecord {
    pub definition: DependencyKey,
    pub user: NodeId,
}

/// A point-in-time copy of the graph for external tools.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
    pub files: Vec<FileId>,
    pub external_dependencies: Vec<String>,
}

impl GraphSnapshot {
    pub(crate) fn capture<'a>(
        store: &NodeStore,
        external_dependencies: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        let nodes = store
            .nodes()
            .map(|node| NodeRecord {
                id: node.id(),
                key: node.key().clone(),
                owner: node.owner().clone(),
                traced: node.is_traced(),
            })
            .collect();

        let mut edges: Vec<EdgeRecord> = store
            .edges()
            .map(|(definition, user)| EdgeRecord {
                definition: definition.clone(),
                user,
            })
            .collect();
        // The edge index is hashed; sort so snapshots of equal graphs match.
        edges.sort_by(|a, b| (&a.definition, a.user).cmp(&(&b.definition, b.user)));

        Self {
            nodes,
            edges,
            files: store.files().cloned().collect(),
            external_dependencies: external_dependencies.into_iter().cloned().collect(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Receives a snapshot after each integration when export is enabled.
pub trait GraphExporter {
    fn export(&mut self, snapshot: &GraphSnapshot);
}

impl<F> GraphExporter for F
where
    F: FnMut(&GraphSnapshot),
{
    fn export(&mut self, snapshot: &GraphSnapshot) {
        self(snapshot)
    }
}
