#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use relkit_core::repo::RepositoryConfig;
use relkit_core::signing::{CommandSigner, Ed25519Signer, Signer, generate_keypair};
use relkit_core::store::{MemoryStore, SharedStore};
use relkit_core::tools::{ToolCommand, ToolError, ToolRunner};
use relkit_core::{Bucket, JobContext};
use tempfile::TempDir;

/// Scratch directory plus an in-memory bucket.
pub struct TestContext {
    pub temp_dir: TempDir,
    pub store: Arc<MemoryStore>,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
            store: Arc::new(MemoryStore::new()),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent");
        }
        std::fs::write(&path, content).expect("failed to write file");
        path
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.path(rel)).expect("failed to read file")
    }

    pub fn bucket(&self, dry_run: bool) -> Arc<Bucket> {
        Arc::new(Bucket::new("test-bucket", self.store.clone()).with_dry_run(dry_run))
    }
}

/// Stand-in for `createrepo` and `gpg`.
///
/// Records every invocation. An indexer run writes
/// `<dir>/repodata/repomd.xml` listing the packages in `<dir>/RPMS`; a run
/// with `--output <sig>` writes the signature file. Working directories
/// registered with [`RecordingRunner::fail_in`] fail.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<ToolCommand>>,
    failing: Mutex<HashSet<PathBuf>>,
}

impl RecordingRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_in(&self, dir: impl Into<PathBuf>) {
        self.failing.lock().unwrap().insert(dir.into());
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, program: &str) -> usize {
        self.calls().iter().filter(|c| c.program == program).count()
    }
}

#[async_trait]
impl ToolRunner for RecordingRunner {
    async fn run(&self, command: &ToolCommand) -> Result<String, ToolError> {
        self.calls.lock().unwrap().push(command.clone());

        if let Some(pos) = command.args.iter().position(|a| a == "--output") {
            let signature = &command.args[pos + 1];
            std::fs::write(signature, "-----BEGIN PGP SIGNATURE-----\n").unwrap();
            return Ok(String::new());
        }

        let dir = PathBuf::from(command.args.last().cloned().unwrap_or_default());
        if self.failing.lock().unwrap().contains(&dir) {
            return Err(ToolError::Spawn {
                command: command.to_string(),
                source: std::io::Error::other(format!("scripted failure in {}", dir.display())),
            });
        }

        let mut packages: Vec<String> = std::fs::read_dir(dir.join("RPMS"))
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .filter(|name| name.ends_with(".rpm"))
                    .collect()
            })
            .unwrap_or_default();
        packages.sort();

        let repodata = dir.join("repodata");
        std::fs::create_dir_all(&repodata).unwrap();
        std::fs::write(
            repodata.join("repomd.xml"),
            format!("<repomd>{}</repomd>\n", packages.join(",")),
        )
        .unwrap();

        Ok(format!("Spawning worker 0\nWorker 0: {} packages\n", packages.len()))
    }
}

pub const CONFIG: &str = r#"
[[repos]]
name = "rhel8"
bucket = "test-bucket"
repos = ["yum/{series}"]
architectures = ["x86_64", "aarch64", "ppc64le"]
"#;

pub fn config(toml: &str) -> Arc<RepositoryConfig> {
    Arc::new(RepositoryConfig::parse(toml).expect("invalid test config"))
}

pub fn ed25519() -> Arc<dyn Signer> {
    Arc::new(Ed25519Signer::from_base64(&generate_keypair().secret).unwrap())
}

pub fn gpg(runner: &Arc<RecordingRunner>) -> Arc<dyn Signer> {
    Arc::new(CommandSigner::gpg(runner.clone()))
}

/// Job context over the test store, with the workspace in the temp dir.
pub fn job_context(
    ctx: &TestContext,
    toml: &str,
    runner: &Arc<RecordingRunner>,
    signer: Arc<dyn Signer>,
) -> JobContext {
    JobContext::new(
        config(toml),
        Arc::new(SharedStore(ctx.store.clone())),
        runner.clone(),
        signer,
    )
    .with_workspace(ctx.path("ws"))
}
