//! Graph Errors
//!
//! The core only knows two kinds of trouble. Internal inconsistencies mean the
//! integrator fed the graph malformed facts; they are fatal because carrying on
//! would silently under-approximate the recompilation set. Expected absence
//! (no uses, no nodes for a file) is not an error at all and shows up as an
//! empty result.

use thiserror::Error;

use crate::graph::{NodeId, NodeOwner};
use crate::jobs::FileId;
use crate::key::DependencyKey;

/// Errors produced by the dependency graph.
#[derive(Error, Debug)]
pub enum GraphError {
    /// A def-use edge was requested whose use node has no owning file.
    #[error("expat node {node:?} ({key}) cannot be the target of a use")]
    ExpatUse { node: NodeId, key: DependencyKey },

    /// A def-use edge points at a node that is not in the node map.
    #[error("use of {def} points at {node:?}, which is not in the node map")]
    DanglingUse { def: DependencyKey, node: NodeId },

    /// Two nodes claim the same (file, key) coordinate.
    #[error("coordinate ({owner}, {key}) is already occupied by {existing:?}")]
    DuplicateCoordinate {
        owner: NodeOwner,
        key: DependencyKey,
        existing: NodeId,
    },

    /// Only expat nodes may be moved, and only once.
    #[error("{node:?} ({key}) already belongs to {current}, cannot move it to {requested}")]
    AlreadyOwned {
        node: NodeId,
        key: DependencyKey,
        current: FileId,
        requested: FileId,
    },

    /// The node id is stale or was never allocated by this store.
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    /// The by-file and by-key sub-indices disagree.
    #[error("node index mismatch: {0}")]
    IndexMismatch(String),

    /// No job was registered for a file that owns graph nodes.
    #[error("no job registered for output file {0}")]
    UnregisteredFile(FileId),

    /// A job without any output file cannot be tracked.
    #[error("job has no output files")]
    JobWithoutOutputs,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GraphError {
    /// Whether this error means the graph's bookkeeping is broken.
    pub fn is_internal_inconsistency(&self) -> bool {
        !matches!(self, GraphError::Serialization(_))
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

/// Terminate on an internal inconsistency.
///
/// Recovery would risk an incorrect (too small) incremental build, so the
/// error is logged with its full context and the process goes down.
#[cold]
#[track_caller]
pub(crate) fn fatal(err: GraphError) -> ! {
    tracing::error!(error = %err, "dependency graph invariant violated");
    panic!("dependency graph invariant violated: {err}");
}

/// Extension for escalating internal inconsistencies at the driver boundary.
pub(crate) trait OrFatal<T> {
    fn or_fatal(self) -> T;
}

impl<T> OrFatal<T> for Result<T> {
    #[track_caller]
    fn or_fatal(self) -> T {
        match self {
            Ok(value) => value,
            Err(err) => fatal(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{DeclAspect, Designator};

    #[test]
    fn serialization_is_not_an_inconsistency() {
        let err: GraphError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(!err.is_internal_inconsistency());
    }

    #[test]
    fn expat_use_names_the_key() {
        let key = DependencyKey::new(DeclAspect::Interface, Designator::top_level("K2"));
        let err = GraphError::ExpatUse {
            node: NodeId::from(7),
            key,
        };
        assert!(err.is_internal_inconsistency());
        assert!(err.to_string().contains("K2"));
    }

    #[test]
    #[should_panic(expected = "invariant violated")]
    fn or_fatal_panics_on_error() {
        let result: Result<()> = Err(GraphError::JobWithoutOutputs);
        result.or_fatal();
    }
}
