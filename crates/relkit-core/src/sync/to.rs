use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use relkit_schema::{Checksum, RemoteFile};
use tracing::{debug, info, warn};

use super::{SyncAction, SyncJob, path_exists};
use crate::bucket::Bucket;
use crate::job::{Completion, Job, JobErrors, JobError, JobType, next_job_number};

/// Registry name of [`SyncToJob`].
pub const SYNC_TO: &str = "s3-sync-to";

/// Pushes one local file to its key when the bucket copy is missing or differs.
#[derive(Debug)]
pub struct SyncToJob {
    id: String,
    bucket: Arc<Bucket>,
    local_path: PathBuf,
    key: String,
    remote: Option<RemoteFile>,
    with_delete: bool,
    completion: Completion,
    errors: JobErrors,
    action: OnceLock<SyncAction>,
}

impl SyncToJob {
    /// Create a job pushing `local_path` to `key`. `remote` is the listing
    /// entry for `key`, if the bucket had one.
    pub fn new(
        bucket: Arc<Bucket>,
        local_path: impl Into<PathBuf>,
        key: impl Into<String>,
        remote: Option<RemoteFile>,
        with_delete: bool,
    ) -> Self {
        let local_path = local_path.into();
        Self {
            id: format!("{}.{}.sync-to", local_path.display(), next_job_number()),
            bucket,
            local_path,
            key: key.into(),
            remote: remote.filter(|r| !r.is_none()),
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

    async fn push(&self) -> Result<SyncAction> {
        if self.key.is_empty() {
            return Ok(SyncAction::Skipped);
        }

        let local_exists = path_exists(&self.local_path).await.with_context(|| {
            format!("problem checking local file {}", self.local_path.display())
        })?;
        if !local_exists {
            return self.local_missing().await;
        }

        if let Some(remote) = &self.remote {
            let data = tokio::fs::read(&self.local_path).await.with_context(|| {
                format!(
                    "problem reading file {} before hashing for sync operation",
                    self.local_path.display()
                )
            })?;
            let local = Checksum::md5_of(&data);
            if local == *remote.checksum() {
                return Ok(SyncAction::Unchanged);
            }
            debug!(op = "push", file = %self.key, %local, remote = %remote.checksum(), "hashes aren't the same");
        }

        self.upload()
            .await
            .with_context(|| format!("problem uploading '{}' during sync", self.key))
    }

    async fn local_missing(&self) -> Result<SyncAction> {
        let bucket = self.bucket.name();
        if self.remote.is_none() {
            return Ok(SyncAction::Skipped);
        }
        if !self.with_delete {
            debug!(
                "local file {} is gone; keeping {} in bucket {bucket} because not in delete-mode",
                self.local_path.display(),
                self.key
            );
            return Ok(SyncAction::Kept);
        }
        if self.bucket.dry_run() {
            info!(
                "dry-run: would remove {} from bucket {bucket} because {} doesn't exist locally",
                self.key,
                self.local_path.display()
            );
            return Ok(SyncAction::RemovedRemote);
        }

        self.bucket.delete(&self.key).await.with_context(|| {
            format!(
                "problem removing {} during sync to bucket {bucket} with delete",
                self.key
            )
        })?;
        debug!("removed {} from bucket {bucket} during sync with delete", self.key);
        Ok(SyncAction::RemovedRemote)
    }

    async fn upload(&self) -> Result<SyncAction> {
        if self.bucket.dry_run() {
            info!(
                "dry-run: would upload {} to {} in bucket {}",
                self.local_path.display(),
                self.key,
                self.bucket.name()
            );
            return Ok(SyncAction::Uploaded);
        }
        self.bucket
            .put(&self.local_path, &self.key)
            .await
            .context("problem with put during sync")?;
        Ok(SyncAction::Uploaded)
    }
}

#[async_trait]
impl Job for SyncToJob {
    fn id(&self) -> &str {
        &self.id
    }

    fn job_type(&self) -> JobType {
        JobType::new(SYNC_TO, 0)
    }

    fn completed(&self) -> bool {
        self.completion.is_complete()
    }

    fn error(&self) -> Option<JobError> {
        self.errors.to_error()
    }

    async fn run(&self) {
        let _done = self.completion.guard();
        match self.push().await {
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

impl SyncJob for SyncToJob {
    fn key(&self) -> &str {
        &self.key
    }

    fn action(&self) -> Option<SyncAction> {
        self.action.get().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, ObjectStore, StoreOp};

    fn bucket(store: &Arc<MemoryStore>, dry_run: bool) -> Arc<Bucket> {
        Arc::new(Bucket::new("b", store.clone()).with_dry_run(dry_run))
    }

    #[tokio::test]
    async fn uploads_when_remote_missing() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("a.rpm");
        std::fs::write(&local, "pkg").unwrap();
        let store = Arc::new(MemoryStore::new());

        let job = SyncToJob::new(bucket(&store, false), &local, "r/a.rpm", None, false);
        job.run().await;

        assert!(job.error().is_none());
        assert_eq!(job.action(), Some(SyncAction::Uploaded));
        assert_eq!(store.contents("r/a.rpm").unwrap(), b"pkg");
    }

    #[tokio::test]
    async fn matching_checksum_skips_upload() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("a.rpm");
        std::fs::write(&local, "pkg").unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert("r/a.rpm", "pkg");
        let remote = store.list("r").await.unwrap().pop();

        let job = SyncToJob::new(bucket(&store, false), &local, "r/a.rpm", remote, false);
        job.run().await;

        assert_eq!(job.action(), Some(SyncAction::Unchanged));
        assert_eq!(store.calls(StoreOp::Put), 0);
    }

    #[tokio::test]
    async fn delete_mode_removes_orphaned_remote() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert("r/gone.rpm", "old");
        let remote = store.list("r").await.unwrap().pop();

        let job = SyncToJob::new(
            bucket(&store, false),
            dir.path().join("gone.rpm"),
            "r/gone.rpm",
            remote,
            true,
        );
        job.run().await;

        assert!(job.error().is_none());
        assert_eq!(job.action(), Some(SyncAction::RemovedRemote));
        assert!(store.contents("r/gone.rpm").is_none());
    }

    #[tokio::test]
    async fn dry_run_neither_uploads_nor_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("new.rpm");
        std::fs::write(&local, "pkg").unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert("r/gone.rpm", "old");
        let remote = store.list("r").await.unwrap().pop();

        let upload = SyncToJob::new(bucket(&store, true), &local, "r/new.rpm", None, true);
        let delete = SyncToJob::new(
            bucket(&store, true),
            dir.path().join("gone.rpm"),
            "r/gone.rpm",
            remote,
            true,
        );
        upload.run().await;
        delete.run().await;

        assert_eq!(upload.action(), Some(SyncAction::Uploaded));
        assert_eq!(delete.action(), Some(SyncAction::RemovedRemote));
        assert_eq!(store.calls(StoreOp::Put), 0);
        assert_eq!(store.calls(StoreOp::Delete), 0);
        assert!(store.contents("r/gone.rpm").is_some());
    }
}
