//! Job Tracking
//!
//! Graph nodes are owned by files, and files are produced by compilation jobs.
//! The job index closes that loop: it maps every output file back to the job
//! that writes it, so a set of affected nodes can be turned into a set of jobs
//! to rerun.
//!
//! Jobs belong to the driver. The index only keeps shared handles to them and
//! never mutates a job.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GraphError, Result};

/// Identifier of an output file produced by a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for FileId {
    fn from(path: String) -> Self {
        Self(path)
    }
}

/// A compilation job as seen by the graph.
///
/// The first output is the job's identity; jobs with the same first output
/// are the same job.
pub trait Job {
    /// Output files this job produces, in a stable order.
    fn outputs(&self) -> &[FileId];

    /// The output that identifies this job.
    fn primary_output(&self) -> Option<&FileId> {
        self.outputs().first()
    }
}

/// An insertion-ordered set of jobs, keyed by primary output.
pub struct JobSet<J> {
    jobs: IndexMap<FileId, Arc<J>>,
}

impl<J: Job> JobSet<J> {
    pub fn new() -> Self {
        Self {
            jobs: IndexMap::new(),
        }
    }

    /// Add a job. Returns true if it was not already present.
    pub fn insert(&mut self, job: Arc<J>) -> bool {
        let Some(primary) = job.primary_output().cloned() else {
            return false;
        };
        if self.jobs.contains_key(&primary) {
            return false;
        }
        self.jobs.insert(primary, job);
        true
    }

    /// Check membership by job identity.
    pub fn contains(&self, job: &J) -> bool {
        job.primary_output()
            .is_some_and(|primary| self.jobs.contains_key(primary))
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<J>> {
        self.jobs.values()
    }

    /// Primary outputs of the jobs in the set.
    pub fn primary_outputs(&self) -> impl Iterator<Item = &FileId> {
        self.jobs.keys()
    }
}

impl<J: Job> Default for JobSet<J> {
    fn default() -> Self {
        Self::new()
    }
}

impl<J> Clone for JobSet<J> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
        }
    }
}

impl<J> fmt::Debug for JobSet<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.jobs.keys()).finish()
    }
}

impl<J: Job> FromIterator<Arc<J>> for JobSet<J> {
    fn from_iter<I: IntoIterator<Item = Arc<J>>>(iter: I) -> Self {
        let mut set = Self::new();
        for job in iter {
            set.insert(job);
        }
        set
    }
}

impl<J> IntoIterator for JobSet<J> {
    type Item = Arc<J>;
    type IntoIter = indexmap::map::IntoValues<FileId, Arc<J>>;

    fn into_iter(self) -> Self::IntoIter {
        self.jobs.into_values()
    }
}

/// Maps output files to the jobs producing them.
pub struct JobIndex<J> {
    /// Every output file, pointing at the primary output of its job.
    by_output: HashMap<FileId, FileId>,

    /// Tracked jobs by primary output, in registration order.
    jobs: IndexMap<FileId, Arc<J>>,
}

impl<J: Job> JobIndex<J> {
    pub fn new() -> Self {
        Self {
            by_output: HashMap::new(),
            jobs: IndexMap::new(),
        }
    }

    /// Track a job under every output file it produces.
    ///
    /// Registering a job again (same primary output) replaces the handle.
    pub fn register(&mut self, job: Arc<J>) -> Result<()> {
        let primary = job
            .primary_output()
            .cloned()
            .ok_or(GraphError::JobWithoutOutputs)?;

        for output in job.outputs() {
            if let Some(previous) = self.by_output.insert(output.clone(), primary.clone()) {
                if previous != primary {
                    debug!(%output, %previous, now = %primary, "output file reassigned to another job");
                }
            }
        }
        debug!(job = %primary, outputs = job.outputs().len(), "registered job");
        self.jobs.insert(primary, job);
        Ok(())
    }

    /// The job producing `file`.
    ///
    /// Every node's owning file must belong to a known job, so a miss here is
    /// an internal inconsistency.
    pub fn job_for(&self, file: &FileId) -> Result<&Arc<J>> {
        self.by_output
            .get(file)
            .and_then(|primary| self.jobs.get(primary))
            .ok_or_else(|| GraphError::UnregisteredFile(file.clone()))
    }

    /// All tracked jobs, in registration order.
    pub fn all_jobs(&self) -> impl Iterator<Item = &Arc<J>> {
        self.jobs.values()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }
}

impl<J: Job> Default for JobIndex<J> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal job used across the crate's tests.
    #[derive(Debug)]
    pub(crate) struct TestJob {
        outputs: Vec<FileId>,
    }

    impl TestJob {
        pub(crate) fn new(outputs: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                outputs: outputs.iter().map(|o| FileId::from(*o)).collect(),
            })
        }
    }

    impl Job for TestJob {
        fn outputs(&self) -> &[FileId] {
            &self.outputs
        }
    }

    #[test]
    fn job_is_found_by_every_output() {
        let mut index = JobIndex::new();
        let job = TestJob::new(&["a.deps", "a.o"]);
        index.register(job.clone()).unwrap();

        let by_deps = index.job_for(&FileId::from("a.deps")).unwrap();
        let by_object = index.job_for(&FileId::from("a.o")).unwrap();
        assert!(Arc::ptr_eq(by_deps, &job));
        assert!(Arc::ptr_eq(by_object, &job));
        assert_eq!(index.job_count(), 1);
    }

    #[test]
    fn unregistered_file_is_an_error() {
        let index: JobIndex<TestJob> = JobIndex::new();
        let err = index.job_for(&FileId::from("ghost.deps")).unwrap_err();
        assert!(matches!(err, GraphError::UnregisteredFile(_)));
    }

    #[test]
    fn job_without_outputs_is_rejected() {
        let mut index = JobIndex::new();
        let err = index.register(TestJob::new(&[])).unwrap_err();
        assert!(matches!(err, GraphError::JobWithoutOutputs));
    }

    #[test]
    fn all_jobs_in_registration_order() {
        let mut index = JobIndex::new();
        index.register(TestJob::new(&["b.deps"])).unwrap();
        index.register(TestJob::new(&["a.deps"])).unwrap();
        // Re-registering keeps the original position.
        index.register(TestJob::new(&["b.deps"])).unwrap();

        let primaries: Vec<_> = index
            .all_jobs()
            .filter_map(|job| job.primary_output())
            .map(FileId::as_str)
            .collect();
        assert_eq!(primaries, vec!["b.deps", "a.deps"]);
    }

    #[test]
    fn job_set_deduplicates_by_primary_output() {
        let first = TestJob::new(&["a.deps"]);
        let again = TestJob::new(&["a.deps", "a.o"]);
        let other = TestJob::new(&["b.deps"]);

        let set: JobSet<_> = [first, again.clone(), other].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&again));
    }
}
