//! Content-hash synchronisation jobs.
//!
//! [`SyncFromJob`] pulls one object into the local tree, [`SyncToJob`]
//! pushes one local file into the bucket. Each job owns its own
//! `(local path, key)` pair, so sibling jobs never share mutable state and
//! need no locking between each other. Fan-out and reduction live on
//! [`Bucket`](crate::Bucket).

pub mod from;
pub mod to;

use std::io::ErrorKind;
use std::path::Path;

use crate::job::Job;

pub use from::SyncFromJob;
pub use to::SyncToJob;

/// What a sync job did, or would have done in dry-run mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncAction {
    /// Checksums matched; nothing transferred.
    Unchanged,
    /// Remote object downloaded over the local path.
    Fetched,
    /// Local file uploaded.
    Uploaded,
    /// Local path removed because the remote object is gone.
    RemovedLocal,
    /// Remote object removed because the local file is gone.
    RemovedRemote,
    /// Counterpart missing, but delete-mode is off, so nothing was removed.
    Kept,
    /// Nothing to do (empty key or nothing on either side).
    Skipped,
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unchanged => "unchanged",
            Self::Fetched => "fetched",
            Self::Uploaded => "uploaded",
            Self::RemovedLocal => "removed-local",
            Self::RemovedRemote => "removed-remote",
            Self::Kept => "kept",
            Self::Skipped => "skipped",
        };
        f.pad(s)
    }
}

/// A job produced by a sync orchestrator.
pub trait SyncJob: Job {
    /// Bucket key the job is responsible for.
    fn key(&self) -> &str;

    /// Action taken by the first successful `run`; `None` before that or
    /// after a failure.
    fn action(&self) -> Option<SyncAction>;
}

/// Whether `path` exists, without following a final symlink.
pub(crate) async fn path_exists(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Remove `path` whatever it is. A path that is already gone is not an error.
pub(crate) async fn remove_all(path: &Path) -> std::io::Result<()> {
    let meta = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };

    let result = if meta.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    match result {
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn remove_all_handles_files_dirs_and_absence() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        let tree = dir.path().join("t/u");
        std::fs::write(&file, "x").unwrap();
        std::fs::create_dir_all(&tree).unwrap();
        std::fs::write(tree.join("g"), "y").unwrap();

        remove_all(&file).await.unwrap();
        remove_all(&dir.path().join("t")).await.unwrap();
        remove_all(&file).await.unwrap();

        assert!(!path_exists(&file).await.unwrap());
        assert!(!path_exists(&dir.path().join("t")).await.unwrap());
    }

    #[test]
    fn actions_display_kebab_case() {
        assert_eq!(SyncAction::RemovedLocal.to_string(), "removed-local");
        assert_eq!(SyncAction::Unchanged.to_string(), "unchanged");
    }
}
