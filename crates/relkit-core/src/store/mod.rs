//! Object storage, seen through the handful of operations sync jobs need.
//!
//! [`S3Store`] talks to a real S3-compatible service through opendal;
//! [`MemoryStore`] keeps objects in memory and counts calls, for tests and
//! local experiments.

pub mod memory;
pub mod s3;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use relkit_schema::RemoteFile;

use crate::error::ConfigError;

pub use memory::{MemoryStore, StoreOp};
pub use s3::S3Store;

/// Operations consumed from an object-storage service.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Whether `key` currently exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Download `key` to `local_path`, creating parent directories.
    async fn get(&self, key: &str, local_path: &Path) -> Result<()>;

    /// Upload `local_path` as `key`.
    async fn put(&self, local_path: &Path, key: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Every object under `prefix`, recursively, with its checksum.
    async fn list(&self, prefix: &str) -> Result<Vec<RemoteFile>>;
}

/// Opens the store that backs a named bucket.
pub trait StoreProvider: Send + Sync + std::fmt::Debug {
    /// Open `bucket`.
    fn open(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>>;
}

/// Provider that hands out one store for every bucket name.
#[derive(Debug, Clone)]
pub struct SharedStore(pub Arc<dyn ObjectStore>);

impl StoreProvider for SharedStore {
    fn open(&self, _bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        Ok(Arc::clone(&self.0))
    }
}

/// Connection settings for an S3-compatible service.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// S3-compatible endpoint (e.g., `https://s3.us-east-1.amazonaws.com`)
    pub endpoint: String,
    /// Access Key ID
    pub access_key: String,
    /// Secret Access Key
    pub secret_key: String,
    /// Region; `auto` for services that ignore it
    pub region: String,
}

impl StoreConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            std::env::var(name).map_err(|_| ConfigError::MissingEnv(name))
        };

        Ok(Self {
            endpoint: required("RELKIT_STORE_ENDPOINT")?,
            access_key: required("RELKIT_STORE_ACCESS_KEY")?,
            secret_key: required("RELKIT_STORE_SECRET_KEY")?,
            region: std::env::var("RELKIT_STORE_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

/// Provider that opens one [`S3Store`] per bucket.
#[derive(Debug, Clone)]
pub struct S3Provider {
    config: StoreConfig,
}

impl S3Provider {
    /// Create a provider from connection settings.
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }
}

impl StoreProvider for S3Provider {
    fn open(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        Ok(Arc::new(S3Store::connect(&self.config, bucket)?))
    }
}

/// Write downloaded bytes to `path`, creating its parent directories.
pub(crate) async fn write_local(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    tokio::fs::write(path, data)
        .await
        .with_context(|| format!("writing {}", path.display()))
}
