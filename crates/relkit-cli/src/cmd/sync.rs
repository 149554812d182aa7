//! sync-from / sync-to

use std::sync::Arc;

use anyhow::{Context, Result};
use relkit_core::store::{S3Provider, StoreConfig, StoreProvider};
use relkit_core::{Bucket, SyncAction, SyncError, SyncReport};

use crate::{Global, SyncArgs};

pub async fn sync_from(args: &SyncArgs, global: Global) -> Result<()> {
    let bucket = open_bucket(&args.bucket, global)?;
    let result = bucket.sync_from(&args.local, &args.prefix, args.delete).await;
    finish(result)
}

pub async fn sync_to(args: &SyncArgs, global: Global) -> Result<()> {
    let bucket = open_bucket(&args.bucket, global)?;
    let result = bucket.sync_to(&args.local, &args.prefix, args.delete).await;
    finish(result)
}

fn open_bucket(name: &str, global: Global) -> Result<Arc<Bucket>> {
    let config = StoreConfig::from_env()?;
    tracing::debug!(bucket = name, endpoint = %config.endpoint, "opening bucket");
    let store = S3Provider::new(config)
        .open(name)
        .with_context(|| format!("opening bucket {name}"))?;
    Ok(Arc::new(
        Bucket::new(name, store)
            .with_dry_run(global.dry_run)
            .with_parallel(global.parallel),
    ))
}

fn finish(result: Result<SyncReport, SyncError>) -> Result<()> {
    match result {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(SyncError::Jobs {
            bucket,
            failed,
            total,
            errors,
            report,
        }) => {
            print_report(&report);
            for message in errors.messages() {
                eprintln!("  ✗ {message}");
            }
            anyhow::bail!("{failed} of {total} sync jobs against bucket {bucket} failed")
        }
        Err(err) => Err(err.into()),
    }
}

fn print_report(report: &SyncReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    for (key, action) in &report.actions {
        if !matches!(action, SyncAction::Unchanged | SyncAction::Skipped) {
            println!("  {prefix}{action:<14} {key}");
        }
    }
    println!(
        "  {prefix}{} changed, {} unchanged ({})",
        report.changed(),
        report.count(SyncAction::Unchanged),
        report.bucket
    );
}
