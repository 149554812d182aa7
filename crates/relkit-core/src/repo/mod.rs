//! RPM repository builds.
//!
//! [`RepositoryConfig`] describes where each distro's repositories live;
//! [`BuildRepoJob`] rebuilds one architecture of them from a set of new
//! packages, running the indexer for every working directory concurrently
//! and collecting output and errors in a [`BuildLog`].

pub mod build;
pub mod config;
pub mod state;

pub use build::{BUILD_RPM_REPO, BuildRepoJob, BuildRepoRequest, DRY_RUN_OUTPUT};
pub use config::{
    IndexerConfig, RepoKind, RepositoryConfig, RepositoryDefinition, SigningConfig, SigningMethod,
    TemplateConfig,
};
pub use state::{BuildLog, BuildStep};
