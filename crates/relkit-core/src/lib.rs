//! Core library for relkit.
//!
//! Two families of jobs live here: content-hash synchronisation between a
//! local tree and an object-storage bucket ([`sync`], orchestrated by
//! [`Bucket`]), and per-architecture RPM repository rebuilds
//! ([`repo::BuildRepoJob`]). Both implement the [`Job`] contract so an
//! external scheduler can run them without knowing what they do.

pub mod bucket;
pub mod error;
pub mod index_page;
pub mod job;
pub mod paths;
pub mod repo;
pub mod signing;
pub mod store;
pub mod sync;
pub mod tools;

pub use bucket::{Bucket, SyncError, SyncReport};
pub use error::{BuildError, ConfigError};
pub use job::{Dependency, Job, JobContext, JobError, JobRegistry, JobType, RegistryError};
pub use paths::*;
pub use repo::{BuildRepoJob, BuildRepoRequest, RepositoryConfig};
pub use signing::Signer;
pub use store::{ObjectStore, StoreProvider};
pub use sync::SyncAction;
pub use tools::{ToolError, ToolRunner};
