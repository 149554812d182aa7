use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use async_trait::async_trait;
use relkit_schema::{Checksum, RemoteFile};

use super::{ObjectStore, write_local};

/// Operations of [`ObjectStore`], for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// [`ObjectStore::exists`]
    Exists,
    /// [`ObjectStore::get`]
    Get,
    /// [`ObjectStore::put`]
    Put,
    /// [`ObjectStore::delete`]
    Delete,
    /// [`ObjectStore::list`]
    List,
}

impl StoreOp {
    fn index(self) -> usize {
        match self {
            Self::Exists => 0,
            Self::Get => 1,
            Self::Put => 2,
            Self::Delete => 3,
            Self::List => 4,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    etag: String,
}

/// In-memory object store.
///
/// Objects carry an S3-style quoted MD5 `ETag`. Every call is counted per
/// [`StoreOp`], and individual `(op, key)` pairs can be made to fail.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    failures: Mutex<HashSet<(StoreOp, String)>>,
    calls: [AtomicUsize; 5],
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` under `key` with its real MD5 as `ETag`.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Vec<u8>>) {
        let data = data.into();
        let etag = format!("\"{}\"", Checksum::md5_of(&data));
        self.insert_with_etag(key, data, etag);
    }

    /// Store `data` under `key` with an arbitrary `ETag`.
    pub fn insert_with_etag(
        &self,
        key: impl Into<String>,
        data: impl Into<Vec<u8>>,
        etag: impl Into<String>,
    ) {
        self.objects().insert(
            key.into(),
            StoredObject {
                data: data.into(),
                etag: etag.into(),
            },
        );
    }

    /// Drop `key` without counting a call.
    pub fn remove(&self, key: &str) {
        self.objects().remove(key);
    }

    /// Current contents of `key`.
    pub fn contents(&self, key: &str) -> Option<Vec<u8>> {
        self.objects().get(key).map(|o| o.data.clone())
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.objects().keys().cloned().collect()
    }

    /// Make `op` on `key` fail from now on. `List` matches on the prefix.
    pub fn fail_on(&self, op: StoreOp, key: impl Into<String>) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((op, key.into()));
    }

    /// Number of calls made for `op`.
    pub fn calls(&self, op: StoreOp) -> usize {
        self.calls[op.index()].load(Ordering::SeqCst)
    }

    fn objects(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, StoredObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self, op: StoreOp, key: &str) -> Result<()> {
        self.calls[op.index()].fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(op, key.to_string()));
        if failing {
            anyhow::bail!("injected {op:?} failure for '{key}'");
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        self.enter(StoreOp::Exists, key)?;
        Ok(self.objects().contains_key(key))
    }

    async fn get(&self, key: &str, local_path: &Path) -> Result<()> {
        self.enter(StoreOp::Get, key)?;
        let data = self
            .contents(key)
            .with_context(|| format!("no such key: {key}"))?;
        write_local(local_path, &data).await
    }

    async fn put(&self, local_path: &Path, key: &str) -> Result<()> {
        self.enter(StoreOp::Put, key)?;
        let data = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("reading {}", local_path.display()))?;
        self.insert(key, data);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.enter(StoreOp::Delete, key)?;
        self.objects().remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<RemoteFile>> {
        self.enter(StoreOp::List, prefix)?;
        let prefix = prefix.trim_matches('/');
        Ok(self
            .objects()
            .iter()
            .filter(|(key, _)| {
                prefix.is_empty()
                    || key
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .map(|(key, object)| RemoteFile::new(key.clone(), &object.etag))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_reports_quoted_md5() {
        let store = MemoryStore::new();
        store.insert("a/b", "hello");
        let listed = store.list("a").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(
            listed[0].checksum().as_str(),
            "5d41402abc4b2a76b9719d911017c592"
        );
    }

    #[tokio::test]
    async fn list_respects_segment_boundaries() {
        let store = MemoryStore::new();
        store.insert("repo/a", "1");
        store.insert("repository/b", "2");
        let keys: Vec<_> = store
            .list("repo/")
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.key().to_string())
            .collect();
        assert_eq!(keys, vec!["repo/a".to_string()]);
    }

    #[tokio::test]
    async fn injected_failures_and_counts() {
        let store = MemoryStore::new();
        store.insert("k", "v");
        store.fail_on(StoreOp::Exists, "k");
        assert!(store.exists("k").await.is_err());
        assert!(!store.exists("other").await.unwrap());
        assert_eq!(store.calls(StoreOp::Exists), 2);
        assert_eq!(store.calls(StoreOp::Get), 0);
    }

    #[tokio::test]
    async fn get_writes_nested_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        store.insert("k", "payload");
        let dest = dir.path().join("x/y/z");
        store.get("k", &dest).await.unwrap();
        assert_eq!(std::fs::read_to_string(dest).unwrap(), "payload");
    }
}
