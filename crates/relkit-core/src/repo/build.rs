use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use relkit_schema::{Arch, Checksum, ReleaseVersion};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::config::{RepositoryConfig, RepositoryDefinition};
use super::state::{BuildLog, BuildStep};
use crate::bucket::Bucket;
use crate::error::BuildError;
use crate::job::{Completion, Job, JobContext, JobError, JobType, next_job_number};
use crate::paths::{local_repo_path, repo_root, workspace_root};
use crate::signing::{SignOutcome, Signer, sign_file, signature_path};
use crate::sync::path_exists;
use crate::tools::ToolRunner;

/// Registry name of [`BuildRepoJob`].
pub const BUILD_RPM_REPO: &str = "build-rpm-repo";

/// Output recorded for a working directory when the indexer was not run.
pub const DRY_RUN_OUTPUT: &str = "no output: dry run";

/// Payload of a `build-rpm-repo` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRepoRequest {
    /// Name of a [`RepositoryDefinition`].
    pub distro: String,
    pub version: String,
    pub arch: String,
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Packages to add to the repository.
    #[serde(default)]
    pub packages: Vec<PathBuf>,
}

fn default_profile() -> String {
    "default".to_string()
}

/// Rebuilds one architecture of every repository of a distro.
///
/// For each repository path: pull the tree from the bucket, link the new
/// packages into `<repo>/<arch>/RPMS`, regenerate metadata, sign
/// `repodata/repomd.xml`, write `index.html` pages and push the tree back.
/// A failing stage stops the remaining stages for that repository only.
#[derive(Debug)]
pub struct BuildRepoJob {
    id: String,
    workspace: PathBuf,
    release: ReleaseVersion,
    arch: Arch,
    profile: String,
    packages: Vec<PathBuf>,
    distro: RepositoryDefinition,
    conf: Arc<RepositoryConfig>,
    bucket: Arc<Bucket>,
    runner: Arc<dyn ToolRunner>,
    signer: Arc<dyn Signer>,
    dry_run: bool,
    log: BuildLog,
    completion: Completion,
}

impl BuildRepoJob {
    /// Validate `request` and resolve everything the build needs.
    ///
    /// Nothing is touched on disk or in the bucket.
    pub fn new(ctx: &JobContext, request: BuildRepoRequest) -> Result<Self, BuildError> {
        let release = ReleaseVersion::parse(&request.version)?;
        let arch: Arch = request
            .arch
            .parse()
            .map_err(|_| BuildError::Arch(request.arch.clone()))?;

        let distro = ctx
            .config
            .find(&request.distro)
            .cloned()
            .ok_or_else(|| BuildError::UnknownDistro(request.distro.clone()))?;
        if !distro.supports(arch) {
            return Err(BuildError::UnsupportedArch {
                distro: distro.name,
                arch: arch.to_string(),
            });
        }

        let explicit = ctx.workspace.as_deref().or(ctx.config.workspace.as_deref());
        let workspace = workspace_root(explicit).map_err(BuildError::Workspace)?;

        let store = ctx
            .stores
            .open(&distro.bucket)
            .map_err(|err| BuildError::Store {
                bucket: distro.bucket.clone(),
                message: format!("{err:#}"),
            })?;
        let bucket = Bucket::new(distro.bucket.clone(), store)
            .with_dry_run(ctx.dry_run)
            .with_parallel(ctx.parallel);

        Ok(Self {
            id: format!("{BUILD_RPM_REPO}.{}", next_job_number()),
            workspace,
            release,
            arch,
            profile: request.profile,
            packages: request.packages,
            distro,
            conf: Arc::clone(&ctx.config),
            bucket: Arc::new(bucket),
            runner: Arc::clone(&ctx.runner),
            signer: Arc::clone(&ctx.signer),
            dry_run: ctx.dry_run,
            log: BuildLog::default(),
            completion: Completion::default(),
        })
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    pub fn release(&self) -> &ReleaseVersion {
        &self.release
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn bucket(&self) -> &Arc<Bucket> {
        &self.bucket
    }

    /// Remote repository paths this job rebuilds.
    pub fn repo_paths(&self) -> Vec<String> {
        self.distro.repo_paths(&self.release, &self.profile)
    }

    /// Indexer output per working directory recorded so far.
    pub fn output(&self) -> BTreeMap<PathBuf, String> {
        self.log.output()
    }

    /// Mutations performed so far, or planned ones in dry-run, sorted.
    pub fn steps(&self) -> Vec<BuildStep> {
        self.log.steps()
    }

    /// Link the job's packages into `<local>/<arch>/RPMS`.
    ///
    /// Returns the architecture subtree, which is the indexer's working
    /// directory.
    pub async fn inject_packages(&self, local: &Path) -> Result<PathBuf> {
        let repo_path = local.join(self.arch.as_str());
        self.link_packages(&repo_path.join("RPMS"))
            .await
            .with_context(|| format!("linking packages for {}", repo_path.display()))?;
        Ok(repo_path)
    }

    async fn link_packages(&self, rpms: &Path) -> Result<()> {
        for pkg in &self.packages {
            let name = pkg
                .file_name()
                .with_context(|| format!("package path {} has no file name", pkg.display()))?;
            if !path_exists(pkg).await? {
                anyhow::bail!("package {} does not exist", pkg.display());
            }

            let dest = rpms.join(name);
            if path_exists(&dest).await? {
                info!("{} is already in {}", name.to_string_lossy(), rpms.display());
                continue;
            }
            self.log.record_step(BuildStep::Link {
                package: pkg.clone(),
                dest: dest.clone(),
            });
            if self.dry_run {
                info!("dry-run: would link {} to {}", pkg.display(), dest.display());
                continue;
            }

            tokio::fs::create_dir_all(rpms)
                .await
                .with_context(|| format!("creating {}", rpms.display()))?;
            if let Err(err) = tokio::fs::hard_link(pkg, &dest).await {
                debug!("hard link of {} failed ({err}); copying", pkg.display());
                tokio::fs::copy(pkg, &dest).await.with_context(|| {
                    format!("copying {} to {}", pkg.display(), dest.display())
                })?;
            }
            debug!("linked {} to {}", pkg.display(), dest.display());
        }
        Ok(())
    }

    /// Rebuild every working directory concurrently and wait for all of
    /// them. Returns per-directory success, in input order.
    pub async fn rebuild_all(&self, dirs: &[PathBuf]) -> Vec<bool> {
        join_all(dirs.iter().map(|dir| self.rebuild_repo(dir))).await
    }

    async fn rebuild_repo(&self, dir: &Path) -> bool {
        match self.rebuild_stages(dir).await {
            Ok(()) => true,
            Err(err) => {
                error!("{err:#}");
                self.log.record_error(&err);
                false
            }
        }
    }

    async fn rebuild_stages(&self, dir: &Path) -> Result<()> {
        let command = self.conf.indexer.command(dir);
        let metadata = dir.join("repodata").join("repomd.xml");
        self.log.record_step(BuildStep::Index(dir.to_path_buf()));

        let (output, rewritten) = if self.dry_run {
            info!("dry-run: would run {command}");
            (DRY_RUN_OUTPUT.to_string(), false)
        } else {
            info!("building repo with operation: {command}");
            let before = file_checksum(&metadata).await?;
            let output = self.runner.run(&command).await.with_context(|| {
                format!("running {} for {}", self.conf.indexer.program, dir.display())
            })?;
            debug!("{output}");
            let rewritten = file_checksum(&metadata).await? != before;
            (output, rewritten)
        };

        info!("rebuilt repo for {}", dir.display());
        self.log.record_output(dir, output);

        self.sign_metadata(&metadata, rewritten)
            .await
            .with_context(|| format!("signing release metadata for {}", dir.display()))?;

        self.build_index_pages(dir)
            .await
            .with_context(|| format!("building index.html pages for {}", dir.display()))
    }

    /// Sign `metadata` unless an existing signature still covers it.
    ///
    /// A signature pulled from the bucket belongs to the metadata as it was
    /// before the indexer ran, so it is replaced whenever the indexer
    /// rewrote the file.
    async fn sign_metadata(&self, metadata: &Path, rewritten: bool) -> Result<()> {
        let extension = &self.conf.signing.extension;
        if self.dry_run {
            if !path_exists(&signature_path(metadata, extension)).await? {
                self.log.record_step(BuildStep::Sign(metadata.to_path_buf()));
            }
            info!("dry-run: would sign {}", metadata.display());
            return Ok(());
        }

        if rewritten {
            debug!("{} changed; replacing its signature", metadata.display());
        }
        let (signature, outcome) =
            sign_file(&*self.signer, metadata, extension, rewritten).await?;
        if outcome == SignOutcome::Signed {
            self.log.record_step(BuildStep::Sign(metadata.to_path_buf()));
            info!("signed {}", signature.display());
        }
        Ok(())
    }

    async fn build_index_pages(&self, dir: &Path) -> Result<()> {
        self.log.record_step(BuildStep::Pages(dir.to_path_buf()));
        if self.dry_run {
            info!("dry-run: would write index.html pages under {}", dir.display());
            return Ok(());
        }

        let builder = self.conf.index_pages()?;
        let label = self.page_label(dir);
        let root = dir.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || builder.build(&root, &label))
            .await
            .context("index page task failed")??;
        debug!("wrote {} index pages under {}", pages.len(), dir.display());
        Ok(())
    }

    fn page_label(&self, dir: &Path) -> String {
        match dir.strip_prefix(repo_root(&self.workspace)) {
            Ok(relative) if !relative.as_os_str().is_empty() => format!(
                "{}/{}",
                self.bucket.name(),
                relative.to_string_lossy().replace('\\', "/")
            ),
            _ => self.bucket.name().to_string(),
        }
    }

    async fn pull_and_inject(&self, remote: &str, local: &Path) -> Result<PathBuf> {
        let report = self
            .bucket
            .sync_from(local, remote, false)
            .await
            .with_context(|| format!("pulling {remote} from bucket {}", self.bucket.name()))?;
        debug!("pulled {remote}: {} changed", report.changed());
        self.inject_packages(local).await
    }

    async fn push(&self, remote: &str, local: &Path) -> Result<()> {
        self.log.record_step(BuildStep::Push {
            local: local.to_path_buf(),
            remote: remote.to_string(),
        });
        let report = self
            .bucket
            .sync_to(local, remote, false)
            .await
            .with_context(|| format!("pushing {remote} to bucket {}", self.bucket.name()))?;
        info!(
            "pushed {} to {}/{remote}: {} changed",
            local.display(),
            self.bucket.name(),
            report.changed()
        );
        Ok(())
    }
}

/// MD5 of `path`, or `None` when it does not exist yet.
async fn file_checksum(path: &Path) -> Result<Option<Checksum>> {
    if !path_exists(path).await? {
        return Ok(None);
    }
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(Some(Checksum::md5_of(&data)))
}

#[async_trait]
impl Job for BuildRepoJob {
    fn id(&self) -> &str {
        &self.id
    }

    fn job_type(&self) -> JobType {
        JobType::new(BUILD_RPM_REPO, 0)
    }

    fn completed(&self) -> bool {
        self.completion.is_complete()
    }

    fn error(&self) -> Option<JobError> {
        self.log.to_error()
    }

    async fn run(&self) {
        let _done = self.completion.guard();

        let mut targets = Vec::new();
        for remote in self.repo_paths() {
            let local = local_repo_path(&self.workspace, &remote);
            match self.pull_and_inject(&remote, &local).await {
                Ok(working_dir) => targets.push((remote, local, working_dir)),
                Err(err) => {
                    error!("{err:#}");
                    self.log.record_error(&err);
                }
            }
        }

        let dirs: Vec<PathBuf> = targets.iter().map(|(_, _, dir)| dir.clone()).collect();
        let rebuilt = self.rebuild_all(&dirs).await;

        for ((remote, local, _), ok) in targets.iter().zip(rebuilt) {
            if !ok {
                continue;
            }
            if let Err(err) = self.push(remote, local).await {
                error!("{err:#}");
                self.log.record_error(&err);
            }
        }
    }
}
