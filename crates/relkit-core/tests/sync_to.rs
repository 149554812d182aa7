//! Integration tests.
mod common;

use common::TestContext;
use relkit_core::store::StoreOp;
use relkit_core::{SyncAction, SyncError};

#[tokio::test]
async fn test_push_uploads_tree_then_is_unchanged() {
    let ctx = TestContext::new();
    ctx.write("tree/x86_64/RPMS/a.rpm", "a");
    ctx.write("tree/x86_64/repodata/repomd.xml", "<repomd/>");
    let bucket = ctx.bucket(false);

    let first = bucket.sync_to(&ctx.path("tree"), "yum/8", false).await.unwrap();
    assert_eq!(first.count(SyncAction::Uploaded), 2);
    assert_eq!(
        ctx.store.keys(),
        vec!["yum/8/x86_64/RPMS/a.rpm", "yum/8/x86_64/repodata/repomd.xml"]
    );
    assert_eq!(ctx.store.contents("yum/8/x86_64/RPMS/a.rpm").unwrap(), b"a");

    let second = bucket.sync_to(&ctx.path("tree"), "yum/8", false).await.unwrap();
    assert_eq!(second.count(SyncAction::Unchanged), 2);
    assert_eq!(ctx.store.calls(StoreOp::Put), 2);
}

#[tokio::test]
async fn test_changed_file_is_uploaded_again() {
    let ctx = TestContext::new();
    ctx.write("tree/a.rpm", "new");
    ctx.store.insert("r/a.rpm", "old");

    let report = ctx
        .bucket(false)
        .sync_to(&ctx.path("tree"), "r", false)
        .await
        .unwrap();
    assert_eq!(report.actions["r/a.rpm"], SyncAction::Uploaded);
    assert_eq!(ctx.store.contents("r/a.rpm").unwrap(), b"new");
}

#[tokio::test]
async fn test_orphans_survive_without_delete_and_go_with_it() {
    let ctx = TestContext::new();
    ctx.write("tree/keep.rpm", "keep");
    ctx.store.insert("r/keep.rpm", "keep");
    ctx.store.insert("r/orphan.rpm", "gone locally");

    let report = ctx
        .bucket(false)
        .sync_to(&ctx.path("tree"), "r", false)
        .await
        .unwrap();
    assert!(!report.actions.contains_key("r/orphan.rpm"));
    assert!(ctx.store.contents("r/orphan.rpm").is_some());

    let report = ctx
        .bucket(false)
        .sync_to(&ctx.path("tree"), "r", true)
        .await
        .unwrap();
    assert_eq!(report.actions["r/orphan.rpm"], SyncAction::RemovedRemote);
    assert_eq!(report.actions["r/keep.rpm"], SyncAction::Unchanged);
    assert_eq!(ctx.store.keys(), vec!["r/keep.rpm"]);
}

#[tokio::test]
async fn test_dry_run_push_mutates_nothing() {
    let ctx = TestContext::new();
    ctx.write("tree/new.rpm", "new");
    ctx.store.insert("r/orphan.rpm", "x");

    let report = ctx
        .bucket(true)
        .sync_to(&ctx.path("tree"), "r", true)
        .await
        .unwrap();
    assert_eq!(report.actions["r/new.rpm"], SyncAction::Uploaded);
    assert_eq!(report.actions["r/orphan.rpm"], SyncAction::RemovedRemote);
    assert_eq!(ctx.store.calls(StoreOp::Put), 0);
    assert_eq!(ctx.store.calls(StoreOp::Delete), 0);
    assert_eq!(ctx.store.keys(), vec!["r/orphan.rpm"]);
}

#[tokio::test]
async fn test_push_failure_does_not_stop_siblings() {
    let ctx = TestContext::new();
    ctx.write("tree/a.rpm", "a");
    ctx.write("tree/b.rpm", "b");
    ctx.store.fail_on(StoreOp::Put, "r/a.rpm");

    let err = ctx
        .bucket(false)
        .sync_to(&ctx.path("tree"), "r", false)
        .await
        .unwrap_err();

    match err {
        SyncError::Jobs { failed, report, .. } => {
            assert_eq!(failed, 1);
            assert_eq!(report.actions["r/b.rpm"], SyncAction::Uploaded);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(ctx.store.keys(), vec!["r/b.rpm"]);
}
