//! A named bucket plus the orchestrators that fan a tree sync out into jobs.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use relkit_schema::{RemoteFile, key_for_path, local_path_for_key};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::job::{Job, JobError};
use crate::store::ObjectStore;
use crate::sync::{SyncAction, SyncFromJob, SyncJob, SyncToJob};

/// Default number of sync jobs run at once.
pub const DEFAULT_PARALLEL: usize = 8;

/// A remote storage location.
///
/// Jobs hold an `Arc<Bucket>` to query and mutate the store. When `dry_run`
/// is set, jobs perform existence checks and reads but log every mutation
/// instead of performing it.
#[derive(Debug)]
pub struct Bucket {
    name: String,
    store: Arc<dyn ObjectStore>,
    dry_run: bool,
    parallel: usize,
}

impl Bucket {
    /// A bucket named `name` backed by `store`.
    pub fn new(name: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            name: name.into(),
            store,
            dry_run: false,
            parallel: DEFAULT_PARALLEL,
        }
    }

    /// Toggle dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Number of sync jobs run at once; at least one.
    #[must_use]
    pub fn with_parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn parallel(&self) -> usize {
        self.parallel
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        self.store.exists(key).await
    }

    pub async fn get(&self, key: &str, local_path: &Path) -> anyhow::Result<()> {
        self.store.get(key, local_path).await
    }

    pub async fn put(&self, local_path: &Path, key: &str) -> anyhow::Result<()> {
        self.store.put(local_path, key).await
    }

    pub async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.store.delete(key).await
    }

    pub async fn list(&self, prefix: &str) -> anyhow::Result<Vec<RemoteFile>> {
        self.store.list(prefix).await
    }

    /// Mirror every object under `prefix` into `local_root`.
    ///
    /// One [`SyncFromJob`] is created per listed key. In delete-mode every
    /// local file with no listed counterpart gets a job too, which removes
    /// it. Keys that would map outside `local_root` are never synced; each
    /// one counts as a failed key. All jobs run to the end even when some
    /// fail; the result fails if any key failed, and carries the report of
    /// the keys that succeeded.
    pub async fn sync_from(
        self: &Arc<Self>,
        local_root: &Path,
        prefix: &str,
        with_delete: bool,
    ) -> Result<SyncReport, SyncError> {
        let remote = self.list(prefix).await.map_err(|reason| SyncError::List {
            bucket: self.name.clone(),
            prefix: prefix.to_string(),
            reason,
        })?;
        let local = if with_delete {
            local_files(local_root)?
        } else {
            Vec::new()
        };

        info!(
            "syncing {} objects from {}/{} to {}",
            remote.len(),
            self.name,
            prefix,
            local_root.display()
        );

        let mut rejected = Vec::new();
        let mut mirrored = HashSet::with_capacity(remote.len());
        let mut jobs = Vec::with_capacity(remote.len());
        for file in remote {
            let Some(path) = local_path_for_key(local_root, prefix, file.key()) else {
                rejected.push(self.reject(file.key(), local_root));
                continue;
            };
            mirrored.insert(path.clone());
            jobs.push(SyncFromJob::new(Arc::clone(self), path, file, with_delete));
        }

        for path in local {
            if mirrored.contains(&path) {
                continue;
            }
            let Some(key) = key_for_path(local_root, prefix, &path) else {
                continue;
            };
            debug!("{} has no counterpart in bucket {}", path.display(), self.name);
            jobs.push(SyncFromJob::new(
                Arc::clone(self),
                path,
                RemoteFile::new(key, ""),
                true,
            ));
        }

        self.run_all(&jobs).await;
        self.summarise(&jobs, rejected)
    }

    /// Mirror every file under `local_root` into `prefix`.
    ///
    /// In delete-mode, remote keys with no local counterpart get a job too,
    /// which removes them. A missing `local_root` is treated as empty.
    pub async fn sync_to(
        self: &Arc<Self>,
        local_root: &Path,
        prefix: &str,
        with_delete: bool,
    ) -> Result<SyncReport, SyncError> {
        let local = local_files(local_root)?;
        let listed = self.list(prefix).await.map_err(|reason| SyncError::List {
            bucket: self.name.clone(),
            prefix: prefix.to_string(),
            reason,
        })?;
        let mut remote: BTreeMap<String, RemoteFile> = listed
            .into_iter()
            .map(|file| (file.key().to_string(), file))
            .collect();

        info!(
            "syncing {} local files from {} to {}/{}",
            local.len(),
            local_root.display(),
            self.name,
            prefix
        );

        let mut jobs = Vec::with_capacity(local.len());
        for path in local {
            let Some(key) = key_for_path(local_root, prefix, &path) else {
                warn!("skipping {} outside of {}", path.display(), local_root.display());
                continue;
            };
            let counterpart = remote.remove(&key);
            jobs.push(SyncToJob::new(
                Arc::clone(self),
                path,
                key,
                counterpart,
                with_delete,
            ));
        }

        let mut rejected = Vec::new();
        if with_delete {
            for (key, file) in remote {
                let Some(path) = local_path_for_key(local_root, prefix, &key) else {
                    rejected.push(self.reject(&key, local_root));
                    continue;
                };
                jobs.push(SyncToJob::new(
                    Arc::clone(self),
                    path,
                    key,
                    Some(file),
                    true,
                ));
            }
        }

        self.run_all(&jobs).await;
        self.summarise(&jobs, rejected)
    }

    fn reject(&self, key: &str, local_root: &Path) -> String {
        warn!(
            "refusing to sync {key} from bucket {}: it maps outside of {}",
            self.name,
            local_root.display()
        );
        format!("{key}: key maps outside of {}", local_root.display())
    }

    async fn run_all<J: Job>(&self, jobs: &[J]) {
        stream::iter(jobs)
            .for_each_concurrent(self.parallel, |job| job.run())
            .await;
    }

    fn summarise<J: SyncJob>(
        &self,
        jobs: &[J],
        rejected: Vec<String>,
    ) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport {
            bucket: self.name.clone(),
            dry_run: self.dry_run,
            actions: BTreeMap::new(),
        };
        let total = jobs.len() + rejected.len();
        let mut failed = rejected.len();
        let mut messages = rejected;

        for job in jobs {
            if let Some(err) = job.error() {
                failed += 1;
                messages.extend(
                    err.messages()
                        .iter()
                        .map(|message| format!("{}: {message}", job.key())),
                );
            } else if let Some(action) = job.action() {
                report.actions.insert(job.key().to_string(), action);
            }
        }

        debug!("bucket {}: {total} keys, {failed} failed", self.name);

        if failed == 0 {
            Ok(report)
        } else {
            Err(SyncError::Jobs {
                bucket: self.name.clone(),
                failed,
                total,
                errors: JobError::new(messages),
                report,
            })
        }
    }
}

/// Regular files and symlinks under `root`, sorted. A missing root is empty.
fn local_files(root: &Path) -> Result<Vec<PathBuf>, SyncError> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|reason| SyncError::Walk {
            path: root.to_path_buf(),
            reason,
        })?;
        if !entry.file_type().is_dir() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Outcome of a tree sync: the action taken for every key that succeeded.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SyncReport {
    /// Bucket synced against.
    pub bucket: String,
    /// Whether actions were only logged.
    pub dry_run: bool,
    /// Action per key.
    pub actions: BTreeMap<String, SyncAction>,
}

impl SyncReport {
    /// Number of keys that ended with `action`.
    pub fn count(&self, action: SyncAction) -> usize {
        self.actions.values().filter(|a| **a == action).count()
    }

    /// Number of keys that moved data or removed something.
    pub fn changed(&self) -> usize {
        self.actions
            .values()
            .filter(|a| {
                !matches!(
                    a,
                    SyncAction::Unchanged | SyncAction::Kept | SyncAction::Skipped
                )
            })
            .count()
    }
}

/// A tree sync that did not fully succeed.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("problem listing {prefix} in bucket {bucket}: {reason:#}")]
    List {
        bucket: String,
        prefix: String,
        reason: anyhow::Error,
    },

    #[error("problem walking {path}: {reason}")]
    Walk {
        path: PathBuf,
        #[source]
        reason: walkdir::Error,
    },

    #[error("{failed} of {total} sync jobs against bucket {bucket} failed:\n{errors}")]
    Jobs {
        bucket: String,
        failed: usize,
        total: usize,
        errors: JobError,
        report: SyncReport,
    },
}
