//! Construction of jobs by type name.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use super::Job;
use crate::bucket::DEFAULT_PARALLEL;
use crate::error::BuildError;
use crate::repo::{BUILD_RPM_REPO, BuildRepoJob, BuildRepoRequest, RepositoryConfig};
use crate::signing::Signer;
use crate::store::StoreProvider;
use crate::tools::ToolRunner;

/// Collaborators shared by every job a registry builds.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub config: Arc<RepositoryConfig>,
    pub stores: Arc<dyn StoreProvider>,
    pub runner: Arc<dyn ToolRunner>,
    pub signer: Arc<dyn Signer>,
    /// Workspace override; see [`workspace_root`](crate::paths::workspace_root).
    pub workspace: Option<PathBuf>,
    pub dry_run: bool,
    /// Concurrency of bucket syncs.
    pub parallel: usize,
}

impl JobContext {
    pub fn new(
        config: Arc<RepositoryConfig>,
        stores: Arc<dyn StoreProvider>,
        runner: Arc<dyn ToolRunner>,
        signer: Arc<dyn Signer>,
    ) -> Self {
        Self {
            config,
            stores,
            runner,
            signer,
            workspace: None,
            dry_run: false,
            parallel: DEFAULT_PARALLEL,
        }
    }

    #[must_use]
    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn with_parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel.max(1);
        self
    }
}

/// Builds a job from its JSON payload.
pub type JobFactory = fn(&JobContext, serde_json::Value) -> Result<Box<dyn Job>, RegistryError>;

/// A job could not be created from a type name and payload.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("no job type named '{0}' is registered")]
    UnknownType(String),

    #[error("invalid payload for {job_type}: {source}")]
    Payload {
        job_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Mapping from job type name to factory.
#[derive(Debug, Default, Clone)]
pub struct JobRegistry {
    factories: BTreeMap<String, JobFactory>,
}

impl JobRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in job type.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(BUILD_RPM_REPO, build_rpm_repo);
        registry
    }

    /// Register `factory` under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, factory: JobFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Registered type names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build a job of type `name`.
    pub fn create(
        &self,
        name: &str,
        ctx: &JobContext,
        payload: serde_json::Value,
    ) -> Result<Box<dyn Job>, RegistryError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| RegistryError::UnknownType(name.to_string()))?;
        factory(ctx, payload)
    }
}

fn build_rpm_repo(ctx: &JobContext, payload: serde_json::Value) -> Result<Box<dyn Job>, RegistryError> {
    let request: BuildRepoRequest =
        serde_json::from_value(payload).map_err(|source| RegistryError::Payload {
            job_type: BUILD_RPM_REPO.to_string(),
            source,
        })?;
    Ok(Box::new(BuildRepoJob::new(ctx, request)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::{Ed25519Signer, generate_keypair};
    use crate::store::{MemoryStore, SharedStore};
    use crate::tools::ProcessRunner;

    fn context() -> JobContext {
        let config = RepositoryConfig::parse(
            r#"
[[repos]]
name = "rhel8"
bucket = "downloads"
repos = ["yum/redhat/8/{series}"]
architectures = ["x86_64"]
"#,
        )
        .unwrap();
        let signer = Ed25519Signer::from_base64(&generate_keypair().secret).unwrap();
        JobContext::new(
            Arc::new(config),
            Arc::new(SharedStore(Arc::new(MemoryStore::new()))),
            Arc::new(ProcessRunner),
            Arc::new(signer),
        )
        .with_workspace("/tmp/relkit-registry-test")
    }

    #[test]
    fn defaults_register_the_build_job() {
        let registry = JobRegistry::with_defaults();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec![BUILD_RPM_REPO]);

        let job = registry
            .create(
                BUILD_RPM_REPO,
                &context(),
                serde_json::json!({ "distro": "rhel8", "version": "4.4.2", "arch": "amd64" }),
            )
            .unwrap();
        assert!(job.id().starts_with("build-rpm-repo."));
        assert_eq!(job.job_type().name, BUILD_RPM_REPO);
        assert!(!job.completed());
        assert!(job.error().is_none());
    }

    #[test]
    fn construction_errors_surface_before_scheduling() {
        let registry = JobRegistry::with_defaults();
        let ctx = context();

        let unknown = registry.create("nope", &ctx, serde_json::json!({}));
        assert!(matches!(unknown, Err(RegistryError::UnknownType(_))));

        let payload = registry.create(BUILD_RPM_REPO, &ctx, serde_json::json!({ "distro": 1 }));
        assert!(matches!(payload, Err(RegistryError::Payload { .. })));

        let version = registry.create(
            BUILD_RPM_REPO,
            &ctx,
            serde_json::json!({ "distro": "rhel8", "version": "four", "arch": "x86_64" }),
        );
        assert!(matches!(
            version,
            Err(RegistryError::Build(BuildError::Version(_)))
        ));

        let arch = registry.create(
            BUILD_RPM_REPO,
            &ctx,
            serde_json::json!({ "distro": "rhel8", "version": "4.4.2", "arch": "s390x" }),
        );
        assert!(matches!(
            arch,
            Err(RegistryError::Build(BuildError::UnsupportedArch { .. }))
        ));
    }
}
