//! Modgraph Core
//!
//! This crate provides the incremental-build dependency graph for a
//! module-level compiler driver. It implements:
//!
//! - Declaration-level dependency keys
//! - A node store indexed by (file, key), with def-use edges between nodes
//! - Change propagation that marks affected nodes exactly once
//! - Job tracking, so affected nodes turn into jobs to recompile
//!
//! Parsing source into per-file facts, running jobs, and rendering the graph
//! all live outside this crate.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `key`: Dependency keys (aspect + designator)
//! - `graph`: Node store, indices and change propagation
//! - `jobs`: Output files, the `Job` trait and the job index
//! - `module_graph`: The driver-facing `DependencyGraph`
//! - `config`: Diagnostic toggles
//! - `export`: Read-only snapshots for external visualizers
//!
//! # Example
//!
//! ```rust,ignore
//! use modgraph_core::{DependencyGraph, DependencyKey, DeclAspect, Designator, NodeOwner};
//!
//! let mut graph = DependencyGraph::new();
//! graph.register_job(job_a.clone());
//! graph.register_job(job_b.clone());
//!
//! // `a` defines `K1`, something in `b` uses it
//! let k1 = DependencyKey::new(DeclAspect::Interface, Designator::top_level("K1"));
//! let def = graph.insert(k1.clone(), NodeOwner::File("a.deps".into()));
//! let user = graph.insert(some_key_in_b, NodeOwner::File("b.deps".into()));
//! graph.record_edge(k1, user);
//!
//! // Both jobs must rerun when `K1` changes
//! let jobs = graph.jobs_to_recompile_for_changed_nodes([def]);
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod graph;
pub mod jobs;
pub mod key;
pub mod module_graph;

pub use config::GraphOptions;
pub use error::{GraphError, Result};
pub use export::{EdgeRecord, GraphExporter, GraphSnapshot, NodeRecord};
pub use graph::{ChangePropagator, GraphNode, NodeId, NodeOwner, NodeStore};
pub use jobs::{FileId, Job, JobIndex, JobSet};
pub use key::{DeclAspect, DependencyKey, Designator};
pub use module_graph::DependencyGraph;
