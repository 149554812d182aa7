//! build-repo

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use relkit_core::repo::{BUILD_RPM_REPO, BuildRepoRequest, RepositoryConfig};
use relkit_core::store::{S3Provider, StoreConfig, StoreProvider};
use relkit_core::tools::{ProcessRunner, ToolRunner};
use relkit_core::{Job, JobContext, JobRegistry};

use crate::{BuildArgs, Global};

/// Build one job per architecture and run them concurrently.
pub async fn build_repo(args: &BuildArgs, global: Global) -> Result<()> {
    let config = Arc::new(RepositoryConfig::load(&args.config)?);
    let runner: Arc<dyn ToolRunner> = Arc::new(ProcessRunner);
    let signer = config
        .signing
        .signer(Arc::clone(&runner))
        .context("configuring signer")?;
    let stores: Arc<dyn StoreProvider> = Arc::new(S3Provider::new(StoreConfig::from_env()?));

    let mut ctx = JobContext::new(config, stores, runner, signer)
        .with_dry_run(global.dry_run)
        .with_parallel(global.parallel);
    if let Some(workspace) = &args.workspace {
        ctx = ctx.with_workspace(workspace);
    }

    let registry = JobRegistry::with_defaults();
    let mut jobs: Vec<Box<dyn Job>> = Vec::with_capacity(args.arches.len());
    for arch in &args.arches {
        let request = BuildRepoRequest {
            distro: args.distro.clone(),
            version: args.version.clone(),
            arch: arch.clone(),
            profile: args.profile.clone(),
            packages: args.packages.clone(),
        };
        let payload = serde_json::to_value(&request)?;
        jobs.push(registry.create(BUILD_RPM_REPO, &ctx, payload)?);
    }

    tracing::info!(
        distro = %args.distro,
        version = %args.version,
        jobs = jobs.len(),
        dry_run = global.dry_run,
        "starting repository builds"
    );
    join_all(jobs.iter().map(|job| job.run())).await;

    let mut failed = 0;
    for (arch, job) in args.arches.iter().zip(&jobs) {
        match job.error() {
            None => println!("  ✓ {arch} ({})", job.id()),
            Some(err) => {
                failed += 1;
                eprintln!("  ✗ {arch} ({})", job.id());
                for message in err.messages() {
                    eprintln!("    {message}");
                }
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} builds failed", jobs.len());
    }
    Ok(())
}
