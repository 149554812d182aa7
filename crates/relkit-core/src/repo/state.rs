use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::job::{ErrorList, JobError};

/// One mutation a build performs, or would perform in dry-run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BuildStep {
    /// Link a package into an `RPMS` directory.
    Link { package: PathBuf, dest: PathBuf },
    /// Run the indexer in a working directory.
    Index(PathBuf),
    /// Write a detached signature for a metadata file.
    Sign(PathBuf),
    /// Write `index.html` pages under a directory.
    Pages(PathBuf),
    /// Push a local tree to a remote path.
    Push { local: PathBuf, remote: String },
}

#[derive(Debug, Default)]
struct BuildState {
    output: BTreeMap<PathBuf, String>,
    steps: Vec<BuildStep>,
    errors: ErrorList,
}

/// Indexer output per working directory, the steps taken and the build's
/// errors, behind one lock.
///
/// Every method takes the lock for the duration of a single map or list
/// operation and releases it before returning, so no caller can hold it
/// across an `.await`.
#[derive(Debug, Default)]
pub struct BuildLog(Mutex<BuildState>);

impl BuildLog {
    fn lock(&self) -> MutexGuard<'_, BuildState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_output(&self, dir: &Path, output: impl Into<String>) {
        self.lock().output.insert(dir.to_path_buf(), output.into());
    }

    pub fn record_step(&self, step: BuildStep) {
        self.lock().steps.push(step);
    }

    pub fn record_error(&self, err: &anyhow::Error) {
        self.lock().errors.push(err);
    }

    /// Snapshot of the output map.
    pub fn output(&self) -> BTreeMap<PathBuf, String> {
        self.lock().output.clone()
    }

    /// Steps recorded so far, sorted. Working directories rebuild
    /// concurrently, so recording order is not meaningful.
    pub fn steps(&self) -> Vec<BuildStep> {
        let mut steps = self.lock().steps.clone();
        steps.sort();
        steps
    }

    pub fn error_count(&self) -> usize {
        self.lock().errors.len()
    }

    pub fn to_error(&self) -> Option<JobError> {
        self.lock().errors.to_error()
    }
}
