//! The contract every schedulable unit of work satisfies.
//!
//! A job has a stable identity, a declared type, a dependency descriptor, a
//! completion flag and an error accumulator. `run` executes to the end and
//! never reports failure by returning or panicking: failures are recorded and
//! surfaced afterwards through [`Job::error`]. Completion means "finished",
//! not "succeeded", so a scheduler can always move on.

pub mod registry;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

pub use registry::{JobContext, JobFactory, JobRegistry, RegistryError};

/// Kind of a job, used by schedulers for registration and dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct JobType {
    /// Registry name, e.g. `build-rpm-repo`.
    pub name: String,
    /// Format version of the job's payload.
    pub version: u32,
}

impl JobType {
    /// Create a job type.
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Ordering constraint between jobs of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dependency {
    /// Always ready to run.
    #[default]
    Always,
}

impl Dependency {
    /// Whether the job may be dispatched now.
    pub fn is_ready(&self) -> bool {
        match self {
            Self::Always => true,
        }
    }
}

/// A self-contained, independently runnable unit of work.
#[async_trait]
pub trait Job: Send + Sync {
    /// Identifier, unique within the process.
    fn id(&self) -> &str;

    /// Kind of job, for schedulers. Not consulted by the job itself.
    fn job_type(&self) -> JobType;

    /// Dependency descriptor; sync and build jobs are always ready.
    fn dependency(&self) -> Dependency {
        Dependency::Always
    }

    /// True once `run` has returned.
    fn completed(&self) -> bool;

    /// All recorded errors joined in order of occurrence, or `None`.
    fn error(&self) -> Option<JobError>;

    /// Execute to completion, recording failures instead of returning them.
    async fn run(&self);
}

/// Monotonic counter used to make job identifiers unique.
#[derive(Debug, Default)]
pub struct JobCounter(AtomicU64);

impl JobCounter {
    /// A counter starting at zero.
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Next number; the first call returns 1.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

static JOB_COUNTER: JobCounter = JobCounter::new();

/// Next number from the process-wide job counter.
pub fn next_job_number() -> u64 {
    JOB_COUNTER.next()
}

/// Completion flag for a job.
#[derive(Debug, Default)]
pub struct Completion(AtomicBool);

impl Completion {
    /// Whether the job has finished.
    pub fn is_complete(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Marks the job complete when dropped, on every exit path out of `run`.
    pub fn guard(&self) -> CompletionGuard<'_> {
        CompletionGuard(&self.0)
    }
}

/// Drop guard returned by [`Completion::guard`].
#[derive(Debug)]
pub struct CompletionGuard<'a>(&'a AtomicBool);

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Aggregate error of one job: every recorded message, in order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .messages.join("\n"))]
pub struct JobError {
    messages: Vec<String>,
}

impl JobError {
    /// Wrap a list of messages.
    pub fn new(messages: Vec<String>) -> Self {
        Self { messages }
    }

    /// The individual messages.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Number of recorded failures.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false for errors produced by [`ErrorList::to_error`].
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Ordered list of failure messages.
#[derive(Debug, Default, Clone)]
pub struct ErrorList(Vec<String>);

impl ErrorList {
    /// Record an error with its full context chain.
    pub fn push(&mut self, err: &anyhow::Error) {
        self.0.push(format!("{err:#}"));
    }

    /// Record a plain message.
    pub fn push_message(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    /// Whether anything was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of recorded messages.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `None` when empty, otherwise one combined error.
    pub fn to_error(&self) -> Option<JobError> {
        if self.0.is_empty() {
            None
        } else {
            Some(JobError::new(self.0.clone()))
        }
    }
}

/// An [`ErrorList`] behind a lock, for jobs whose `run` takes `&self`.
#[derive(Debug, Default)]
pub struct JobErrors(Mutex<ErrorList>);

impl JobErrors {
    /// Record an error.
    pub fn record(&self, err: &anyhow::Error) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(err);
    }

    /// Combined error, or `None` when nothing was recorded.
    pub fn to_error(&self) -> Option<JobError> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).to_error()
    }
}
