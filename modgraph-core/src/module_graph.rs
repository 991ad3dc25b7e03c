//! Module Dependency Graph
//!
//! The driver-facing object. It owns the node store, tracks jobs, remembers
//! which external dependencies have been observed, and answers the one
//! question the driver cares about: which jobs must run again.
//!
//! # Lifecycle
//!
//! One graph per driver invocation, constructed explicitly and passed by
//! reference. The graph assumes a single writer: the driver integrates one
//! job's facts (and runs `integration_finished`) before any other
//! integration or query. Job execution may be concurrent; graph access may
//! not.
//!
//! # Failure policy
//!
//! Malformed facts from the integrator are internal-consistency bugs. The
//! graph logs them and panics instead of handing back a recompilation set
//! that could be too small. Asking about things the graph has never seen
//! (no uses, no nodes) is not a failure and yields empty results.

use std::sync::Arc;

use indexmap::IndexSet;
use tracing::debug;

use crate::config::GraphOptions;
use crate::error::OrFatal;
use crate::export::{GraphExporter, GraphSnapshot};
use crate::graph::{ChangePropagator, NodeId, NodeOwner, NodeStore};
use crate::jobs::{FileId, Job, JobIndex, JobSet};
use crate::key::DependencyKey;

/// Declaration-level dependency graph over a module's compilation jobs.
pub struct DependencyGraph<J> {
    store: NodeStore,
    jobs: JobIndex<J>,
    external_dependencies: IndexSet<String>,
    options: GraphOptions,
    exporter: Option<Box<dyn GraphExporter>>,
}

impl<J: Job> DependencyGraph<J> {
    /// Create an empty graph with default options.
    pub fn new() -> Self {
        Self::with_options(GraphOptions::default())
    }

    pub fn with_options(options: GraphOptions) -> Self {
        Self {
            store: NodeStore::new(),
            jobs: JobIndex::new(),
            external_dependencies: IndexSet::new(),
            options,
            exporter: None,
        }
    }

    pub fn options(&self) -> GraphOptions {
        self.options
    }

    /// Install the exporter used when `export_after_integration` is on.
    pub fn set_exporter(&mut self, exporter: impl GraphExporter + 'static) {
        self.exporter = Some(Box::new(exporter));
    }

    // ------------------------------------------------------------------
    // Integration surface
    // ------------------------------------------------------------------

    /// Start tracking a job.
    pub fn register_job(&mut self, job: Arc<J>) {
        self.jobs.register(job).or_fatal();
    }

    /// Create a node at a coordinate that must be free.
    pub fn insert(&mut self, key: DependencyKey, owner: NodeOwner) -> NodeId {
        self.store.insert(key, owner).or_fatal()
    }

    /// Find the node at (owner, key), creating it if absent.
    pub fn find_or_create(&mut self, key: DependencyKey, owner: NodeOwner) -> NodeId {
        self.store.find_or_create(key, owner)
    }

    /// Record that `use_node` uses `def`. Returns true iff the edge is new.
    ///
    /// # Panics
    ///
    /// If `use_node` is expat or not in the graph.
    pub fn record_edge(&mut self, def: DependencyKey, use_node: NodeId) -> bool {
        self.store.record_edge(def, use_node).or_fatal()
    }

    /// Give an expat node its defining file.
    pub fn move_node(&mut self, id: NodeId, file: FileId) {
        self.store.move_node(id, file).or_fatal();
    }

    /// Remove a node and its edges. Removing a node twice is harmless.
    pub fn remove(&mut self, id: NodeId) -> bool {
        self.store.remove(id).or_fatal().is_some()
    }

    /// Drop everything a file previously contributed.
    pub fn remove_file(&mut self, file: &FileId) -> Vec<NodeId> {
        self.store.remove_file(file).or_fatal()
    }

    /// Note that some file depends on the external dependency `name`.
    ///
    /// Returns true if the name was not seen before.
    pub fn add_external_dependency(&mut self, name: impl Into<String>) -> bool {
        self.external_dependencies.insert(name.into())
    }

    /// Called by the integrator once a file's facts are fully in.
    pub fn integration_finished(&mut self) {
        if self.options.verify_after_integration {
            self.verify();
        }
        if self.options.export_after_integration {
            if let Some(exporter) = self.exporter.as_mut() {
                let snapshot = GraphSnapshot::capture(&self.store, &self.external_dependencies);
                exporter.export(&snapshot);
            }
        }
    }

    /// Check every store invariant; panics on violation.
    pub fn verify(&self) -> bool {
        self.store.verify().or_fatal();
        true
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Jobs to rerun when everything `job` produced is treated as changed.
    ///
    /// The job itself is included whenever it owns at least one node.
    pub fn jobs_to_recompile_for_changed_job(&mut self, job: &J) -> JobSet<J> {
        let seeds: Vec<NodeId> = job
            .outputs()
            .iter()
            .flat_map(|file| self.store.nodes_in_file(file).map(|node| node.id()))
            .collect();
        self.jobs_to_recompile_for_changed_nodes(seeds)
    }

    /// Jobs to rerun when only the given nodes changed.
    pub fn jobs_to_recompile_for_changed_nodes<I>(&mut self, nodes: I) -> JobSet<J>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let seeds: Vec<NodeId> = nodes.into_iter().collect();
        let traced = ChangePropagator::new(&mut self.store).propagate(seeds.iter().copied());

        let jobs = self.jobs_containing(seeds.iter().chain(traced.iter()).copied());
        debug!(
            seeds = seeds.len(),
            newly_traced = traced.len(),
            jobs = jobs.len(),
            "computed jobs to recompile"
        );
        jobs
    }

    /// Jobs that use the external dependency `name` through a node that has
    /// not been traced yet, plus everything those jobs ripple into.
    ///
    /// The result may contain duplicates; callers wanting a set should
    /// collect it into a `JobSet`.
    pub fn untraced_jobs_dependent_on_external(&mut self, name: &str) -> Vec<Arc<J>> {
        let key = DependencyKey::external(name);
        let users: Vec<NodeId> = self.store.uses_of(&key).collect();

        let mut result = Vec::new();
        for user in users {
            // Earlier iterations may have traced this user along with its job.
            if self.store.is_traced(user) {
                continue;
            }
            let Some(file) = self.store.node(user).and_then(|node| node.file()).cloned() else {
                continue;
            };
            let job = self.jobs.job_for(&file).or_fatal().clone();

            let rippled = self.jobs_to_recompile_for_changed_job(&job);
            result.push(job.clone());
            result.extend(rippled.into_iter().filter(|other| !same_job(&**other, &*job)));
        }

        debug!(external = name, jobs = result.len(), "collected jobs dependent on external");
        result
    }

    /// Jobs owning any of `nodes`. Expat nodes belong to no job.
    pub fn jobs_containing<I>(&self, nodes: I) -> JobSet<J>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let mut jobs = JobSet::new();
        for id in nodes {
            if let Some(file) = self.store.node(id).and_then(|node| node.file()) {
                jobs.insert(self.jobs.job_for(file).or_fatal().clone());
            }
        }
        jobs
    }

    // ------------------------------------------------------------------
    // Read-only access
    // ------------------------------------------------------------------

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    pub fn job_for(&self, file: &FileId) -> Option<&Arc<J>> {
        self.jobs.job_for(file).ok()
    }

    pub fn all_jobs(&self) -> impl Iterator<Item = &Arc<J>> {
        self.jobs.all_jobs()
    }

    pub fn external_dependencies(&self) -> impl Iterator<Item = &str> {
        self.external_dependencies.iter().map(String::as_str)
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::capture(&self.store, &self.external_dependencies)
    }
}

impl<J: Job> Default for DependencyGraph<J> {
    fn default() -> Self {
        Self::new()
    }
}

fn same_job<J: Job>(a: &J, b: &J) -> bool {
    a.primary_output() == b.primary_output()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::tests::TestJob;
    use crate::key::{DeclAspect, Designator};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn key(name: &str) -> DependencyKey {
        DependencyKey::new(DeclAspect::Interface, Designator::top_level(name))
    }

    fn owner(name: &str) -> NodeOwner {
        NodeOwner::File(FileId::from(name))
    }

    fn graph_with_jobs(names: &[&str]) -> (DependencyGraph<TestJob>, Vec<Arc<TestJob>>) {
        let mut graph = DependencyGraph::new();
        let jobs: Vec<_> = names.iter().map(|name| TestJob::new(&[*name])).collect();
        for job in &jobs {
            graph.register_job(job.clone());
        }
        (graph, jobs)
    }

    #[test]
    fn changed_job_includes_itself() {
        let (mut graph, jobs) = graph_with_jobs(&["a.deps"]);
        graph.insert(key("x"), owner("a.deps"));

        let result = graph.jobs_to_recompile_for_changed_job(&jobs[0]);

        assert!(result.contains(&jobs[0]));
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn job_without_nodes_recompiles_nothing() {
        let (mut graph, jobs) = graph_with_jobs(&["a.deps"]);
        assert!(graph.jobs_to_recompile_for_changed_job(&jobs[0]).is_empty());
    }

    #[test]
    fn expat_definitions_contribute_no_job() {
        let (mut graph, jobs) = graph_with_jobs(&["b.deps"]);
        let def = graph.insert(key("x"), NodeOwner::Expat);
        let user = graph.insert(key("u"), owner("b.deps"));
        graph.record_edge(key("x"), user);

        let result = graph.jobs_to_recompile_for_changed_nodes([def]);

        assert_eq!(result.len(), 1);
        assert!(result.contains(&jobs[0]));
    }

    #[test]
    #[should_panic(expected = "cannot be the target of a use")]
    fn expat_use_is_fatal() {
        let mut graph: DependencyGraph<TestJob> = DependencyGraph::new();
        let expat = graph.insert(key("k2"), NodeOwner::Expat);
        graph.record_edge(key("k2"), expat);
    }

    #[test]
    #[should_panic(expected = "no job registered")]
    fn node_in_unregistered_file_is_fatal() {
        let mut graph: DependencyGraph<TestJob> = DependencyGraph::new();
        let node = graph.insert(key("x"), owner("ghost.deps"));
        graph.jobs_to_recompile_for_changed_nodes([node]);
    }

    #[test]
    fn external_dependencies_are_deduplicated() {
        let mut graph: DependencyGraph<TestJob> = DependencyGraph::new();
        assert!(graph.add_external_dependency("Foo"));
        assert!(graph.add_external_dependency("Bar"));
        assert!(!graph.add_external_dependency("Foo"));

        assert_eq!(graph.external_dependencies().collect::<Vec<_>>(), vec!["Foo", "Bar"]);
    }

    #[test]
    fn integration_hook_runs_exporter_when_enabled() {
        let options = GraphOptions::new().with_verification(true).with_export(true);
        let mut graph: DependencyGraph<TestJob> = DependencyGraph::with_options(options);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        graph.set_exporter(move |snapshot: &GraphSnapshot| {
            sink.borrow_mut().push(snapshot.nodes.len());
        });

        graph.insert(key("x"), owner("a.deps"));
        graph.integration_finished();
        graph.insert(key("y"), owner("a.deps"));
        graph.integration_finished();

        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn integration_hook_is_a_no_op_by_default() {
        let mut graph: DependencyGraph<TestJob> = DependencyGraph::new();
        let calls = Rc::new(RefCell::new(0));
        let sink = calls.clone();
        graph.set_exporter(move |_: &GraphSnapshot| *sink.borrow_mut() += 1);

        graph.integration_finished();

        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    #[should_panic(expected = "already belongs")]
    fn moving_an_owned_node_is_fatal() {
        let (mut graph, _) = graph_with_jobs(&["a.deps", "b.deps"]);
        let node = graph.insert(key("x"), owner("a.deps"));
        graph.record_edge(key("y"), node);

        graph.move_node(node, FileId::from("b.deps"));
    }

    #[test]
    #[should_panic(expected = "cannot be the target of a use")]
    fn verify_panics_on_corrupted_store() {
        let (mut graph, _) = graph_with_jobs(&["a.deps"]);
        let expat = graph.insert(key("x"), NodeOwner::Expat);
        graph.store.record_edge_unchecked(key("y"), expat);

        graph.verify();
    }

    #[test]
    #[should_panic(expected = "invariant violated")]
    fn integration_check_catches_corruption() {
        let options = GraphOptions::new().with_verification(true);
        let (_, jobs) = graph_with_jobs(&["a.deps"]);
        let mut graph = DependencyGraph::with_options(options);
        graph.register_job(jobs[0].clone());
        graph.insert(key("x"), owner("a.deps"));
        graph.store.record_edge_unchecked(key("y"), NodeId::from(99));

        graph.integration_finished();
    }

    #[test]
    fn options_are_kept() {
        let options = GraphOptions::new().with_export(true);
        let graph: DependencyGraph<TestJob> = DependencyGraph::with_options(options);

        assert!(graph.options().export_after_integration);
        assert!(!graph.options().verify_after_integration);
        assert!(!DependencyGraph::<TestJob>::new().options().export_after_integration);
    }
}
