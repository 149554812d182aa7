use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use relkit_schema::{Checksum, RemoteFile};
use tracing::{debug, info, warn};

use super::{SyncAction, SyncJob, path_exists, remove_all};
use crate::bucket::Bucket;
use crate::job::{Completion, Job, JobErrors, JobError, JobType, next_job_number};

/// Registry name of [`SyncFromJob`].
pub const SYNC_FROM: &str = "s3-sync-from";

/// Pulls one remote object to its local path when the content differs.
///
/// Sync jobs are an implementation detail of [`Bucket::sync_from`] and are
/// not registered with the job registry.
#[derive(Debug)]
pub struct SyncFromJob {
    id: String,
    bucket: Arc<Bucket>,
    local_path: PathBuf,
    remote: RemoteFile,
    with_delete: bool,
    completion: Completion,
    errors: JobErrors,
    action: OnceLock<SyncAction>,
}

impl SyncFromJob {
    /// Create a job pairing `remote` with `local_path`.
    pub fn new(
        bucket: Arc<Bucket>,
        local_path: impl Into<PathBuf>,
        remote: RemoteFile,
        with_delete: bool,
    ) -> Self {
        let local_path = local_path.into();
        Self {
            id: format!(
                "{}.{}.sync-from",
                local_path.display(),
                next_job_number()
            ),
            bucket,
            local_path,
            remote,
            with_delete,
            completion: Completion::default(),
            errors: JobErrors::default(),
            action: OnceLock::new(),
        }
    }

    /// Local side of the pair.
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Remote side of the pair.
    pub fn remote(&self) -> &RemoteFile {
        &self.remote
    }

    async fn pull(&self) -> Result<SyncAction> {
        if self.remote.is_none() {
            return Ok(SyncAction::Skipped);
        }
        let key = self.remote.key();

        let exists = self
            .bucket
            .exists(key)
            .await
            .with_context(|| format!("problem checking if the file '{key}' exists"))?;
        if !exists {
            return self.remote_missing().await;
        }

        let local_exists = path_exists(&self.local_path).await.with_context(|| {
            format!("problem checking local file {}", self.local_path.display())
        })?;
        if !local_exists {
            return self
                .fetch()
                .await
                .context("problem downloading file during sync");
        }

        let data = tokio::fs::read(&self.local_path).await.with_context(|| {
            format!(
                "problem reading file {} before hashing for sync operation",
                self.local_path.display()
            )
        })?;

        let local = Checksum::md5_of(&data);
        let remote = self.remote.checksum();
        if local == *remote {
            return Ok(SyncAction::Unchanged);
        }

        debug!(op = "pull", file = key, %local, %remote, "hashes aren't the same");
        self.fetch()
            .await
            .with_context(|| format!("problem fetching file '{key}' during sync"))
    }

    async fn remote_missing(&self) -> Result<SyncAction> {
        let key = self.remote.key();
        let bucket = self.bucket.name();

        if !self.with_delete {
            warn!(
                "file {key} disappeared from bucket {bucket} during sync pull operation; \
                 doing nothing because not in delete-mode"
            );
            return Ok(SyncAction::Kept);
        }

        if self.bucket.dry_run() {
            info!(
                "dry-run: would remove local file {} because {key} doesn't exist in bucket {bucket}",
                self.local_path.display()
            );
            return Ok(SyncAction::RemovedLocal);
        }

        remove_all(&self.local_path).await.with_context(|| {
            format!(
                "problem removing local file {}, during sync from bucket {bucket} with delete",
                self.local_path.display()
            )
        })?;
        debug!(
            "removed local file {} during sync from bucket {bucket} with delete",
            self.local_path.display()
        );
        Ok(SyncAction::RemovedLocal)
    }

    async fn fetch(&self) -> Result<SyncAction> {
        let key = self.remote.key();
        if self.bucket.dry_run() {
            info!(
                "dry-run: would fetch {key} from bucket {} to {}",
                self.bucket.name(),
                self.local_path.display()
            );
            return Ok(SyncAction::Fetched);
        }

        self.bucket
            .get(key, &self.local_path)
            .await
            .context("problem with get during sync")?;
        Ok(SyncAction::Fetched)
    }
}

#[async_trait]
impl Job for SyncFromJob {
    fn id(&self) -> &str {
        &self.id
    }

    fn job_type(&self) -> JobType {
        JobType::new(SYNC_FROM, 0)
    }

    fn completed(&self) -> bool {
        self.completion.is_complete()
    }

    fn error(&self) -> Option<JobError> {
        self.errors.to_error()
    }

    /// If the local file doesn't exist, pull down the remote file. Otherwise
    /// hash the local file and pull the remote file only when the hashes
    /// differ. A remote object that vanished since listing removes the local
    /// path in delete-mode and is left alone otherwise.
    async fn run(&self) {
        let _done = self.completion.guard();
        match self.pull().await {
            Ok(action) => {
                if let Err(again) = self.action.set(action) {
                    warn!(
                        "{} already ran; keeping its first action instead of {again}",
                        self.id
                    );
                }
            }
            Err(err) => self.errors.record(&err),
        }
    }
}

impl SyncJob for SyncFromJob {
    fn key(&self) -> &str {
        self.remote.key()
    }

    fn action(&self) -> Option<SyncAction> {
        self.action.get().copied()
    }
}
