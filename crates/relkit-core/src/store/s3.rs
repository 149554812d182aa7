use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use opendal::{Metakey, Operator, services::S3};
use relkit_schema::RemoteFile;

use super::{ObjectStore, StoreConfig, write_local};

/// An S3-compatible bucket accessed through opendal.
#[derive(Debug, Clone)]
pub struct S3Store {
    op: Operator,
    bucket: String,
}

impl S3Store {
    /// Connect to `bucket` with the given credentials.
    pub fn connect(config: &StoreConfig, bucket: &str) -> Result<Self> {
        let mut builder = S3::default();
        builder.bucket(bucket);
        builder.endpoint(&config.endpoint);
        builder.access_key_id(&config.access_key);
        builder.secret_access_key(&config.secret_key);
        builder.region(&config.region);

        let op = Operator::new(builder)
            .with_context(|| format!("configuring bucket {bucket}"))?
            .finish();

        Ok(Self::from_operator(op, bucket))
    }

    /// Wrap an already configured operator.
    pub fn from_operator(op: Operator, bucket: &str) -> Self {
        Self {
            op,
            bucket: bucket.to_string(),
        }
    }
}

/// opendal lists directories by path ending in `/`; the root is `/`.
fn list_path(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("{trimmed}/")
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn exists(&self, key: &str) -> Result<bool> {
        self.op
            .is_exist(key)
            .await
            .with_context(|| format!("HEAD {key} in bucket {}", self.bucket))
    }

    async fn get(&self, key: &str, local_path: &Path) -> Result<()> {
        let data = self
            .op
            .read(key)
            .await
            .with_context(|| format!("GET {key} from bucket {}", self.bucket))?;
        write_local(local_path, &data).await
    }

    async fn put(&self, local_path: &Path, key: &str) -> Result<()> {
        let data = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("reading {}", local_path.display()))?;
        self.op
            .write(key, data)
            .await
            .with_context(|| format!("PUT {key} to bucket {}", self.bucket))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.op
            .delete(key)
            .await
            .with_context(|| format!("DELETE {key} from bucket {}", self.bucket))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<RemoteFile>> {
        let path = list_path(prefix);
        let entries = self
            .op
            .list_with(&path)
            .recursive(true)
            .metakey(Metakey::Mode | Metakey::Etag)
            .await
            .with_context(|| format!("LIST {path} in bucket {}", self.bucket))?;

        Ok(entries
            .into_iter()
            .filter(|entry| entry.metadata().is_file())
            .map(|entry| RemoteFile::new(entry.path(), entry.metadata().etag().unwrap_or("")))
            .collect())
    }
}
