//! Behaviour across sessions: snapshot reuse, full resyncs and dry runs

use std::fs;

use tokio_util::sync::CancellationToken;
use wsync_sync::snapshot::snapshot_path;
use wsync_sync::{SyncEngine, SyncError};

use crate::common::{Fixture, HOST, REMOTE_ROOT};

#[tokio::test]
async fn test_snapshot_carries_over_between_sessions() {
    let fx = Fixture::new();
    fx.write("a.txt", "a", 100);
    fx.write("b.txt", "b", 100);
    fx.engine().run_once(&CancellationToken::new()).await.unwrap();

    // Changes made while no session was running
    fx.remove("b.txt");
    fx.write("c.txt", "c", 100);

    let diff = fx.engine().run_once(&CancellationToken::new()).await.unwrap();
    assert_eq!(diff.put, vec!["c.txt".to_string()]);
    assert_eq!(diff.delete, vec!["b.txt".to_string()]);
    assert_eq!(
        fx.remote.file_names(),
        vec!["a.txt".to_string(), "c.txt".to_string()]
    );
}

#[tokio::test]
async fn test_full_uploads_everything_again() {
    let fx = Fixture::new();
    fx.write("a.txt", "a", 100);
    fx.write("d/b.txt", "b", 100);
    fx.engine().run_once(&CancellationToken::new()).await.unwrap();

    let diff = fx
        .full_engine()
        .run_once(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(diff.put, vec!["a.txt".to_string(), "d/b.txt".to_string()]);
    assert_eq!(diff.mkdir, vec!["d".to_string()]);
}

#[tokio::test]
async fn test_dry_run_reports_without_applying() {
    let fx = Fixture::new();
    fx.write("a.txt", "a", 100);
    fx.engine().run_once(&CancellationToken::new()).await.unwrap();
    fx.remove("a.txt");
    fx.write("b.txt", "b", 100);

    let engine = fx.engine();
    let preview = engine.dry_run().await.unwrap();
    assert_eq!(preview.put, vec!["b.txt".to_string()]);
    assert_eq!(preview.delete, vec!["a.txt".to_string()]);
    assert!(fx.remote.file("a.txt").is_some());
    assert!(fx.remote.file("b.txt").is_none());

    // The real cycle applies exactly what was previewed
    let applied = engine.run_once(&CancellationToken::new()).await.unwrap();
    assert_eq!(applied, preview);
}

#[tokio::test]
async fn test_corrupt_snapshot_needs_full() {
    let fx = Fixture::new();
    fx.write("a.txt", "a", 100);
    let path = snapshot_path(fx.cache.path(), HOST, REMOTE_ROOT);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let body = serde_json::json!({
        "version": "v1",
        "host": HOST,
        "remote_path": REMOTE_ROOT,
        "last_modified_times": {},
        "local_to_remote_names": {"a.txt": "a.txt"},
        "remote_to_local_names": {"other": "a.txt"}
    });
    fs::write(&path, body.to_string()).unwrap();

    let err = fx
        .engine()
        .run_once(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::CorruptState(_)));

    fx.full_engine()
        .run_once(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(fx.remote.file("a.txt").as_deref(), Some("a"));
}

#[tokio::test]
async fn test_cancelled_session_commits_nothing() {
    let fx = Fixture::new();
    fx.write("a.txt", "a", 100);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = fx.engine().run_once(&cancel).await;
    assert!(matches!(result, Err(SyncError::Cancelled)));
    assert!(!snapshot_path(fx.cache.path(), HOST, REMOTE_ROOT).exists());

    let diff = fx.engine().dry_run().await.unwrap();
    assert_eq!(diff.put, vec!["a.txt".to_string()]);
}

#[tokio::test]
async fn test_cache_dir_inside_local_root_is_not_uploaded() {
    let fx = Fixture::new();
    fx.write("a.txt", "a", 100);
    let engine = || {
        let mut options = fx.options();
        options.cache_dir = fx.path().join("state");
        SyncEngine::new(options, fx.remote.clone())
    };

    let first = engine().run_once(&CancellationToken::new()).await.unwrap();
    assert_eq!(first.put, vec!["a.txt".to_string()]);

    for _ in 0..2 {
        let again = engine().run_once(&CancellationToken::new()).await.unwrap();
        assert!(again.is_empty(), "unexpected changes: {again:?}");
    }
    assert_eq!(fx.remote.file_names(), vec!["a.txt".to_string()]);
    assert!(snapshot_path(&fx.path().join("state"), HOST, REMOTE_ROOT).exists());
}
