//! Single-session flows: create, edit, delete, notebooks and directories

use tokio_util::sync::CancellationToken;

use crate::common::{self, Fixture, PY_NOTEBOOK};

// ============================================================================
// Files
// ============================================================================

#[tokio::test]
async fn test_initial_sync_uploads_tree() {
    let fx = Fixture::new();
    fx.write("a.txt", "alpha", 100);
    fx.write("src/nb.py", PY_NOTEBOOK, 100);
    fx.write("src/lib/util.py", "def f(): pass\n", 100);

    let diff = fx.engine().run_once(&CancellationToken::new()).await.unwrap();

    assert_eq!(diff.put.len(), 3);
    assert_eq!(fx.remote.file("a.txt").as_deref(), Some("alpha"));
    assert_eq!(fx.remote.file("src/nb").as_deref(), Some(PY_NOTEBOOK));
    assert!(fx.remote.file("src/nb.py").is_none());
    assert!(fx.remote.file("src/lib/util.py").is_some());
    assert!(fx.remote.has_dir("src/lib"));
}

#[tokio::test]
async fn test_edit_and_delete_are_propagated() {
    let fx = Fixture::new();
    fx.write("a.txt", "one", 100);
    fx.write("b.txt", "bee", 100);
    let engine = fx.engine();
    let cancel = CancellationToken::new();
    engine.run_once(&cancel).await.unwrap();

    fx.write("a.txt", "two", 200);
    fx.remove("b.txt");
    let diff = engine.run_once(&cancel).await.unwrap();

    assert_eq!(diff.put, vec!["a.txt".to_string()]);
    assert_eq!(diff.delete, vec!["b.txt".to_string()]);
    assert_eq!(fx.remote.file("a.txt").as_deref(), Some("two"));
    assert!(fx.remote.file("b.txt").is_none());
}

#[tokio::test]
async fn test_older_mtime_is_not_an_edit() {
    let fx = Fixture::new();
    fx.write("a.txt", "one", 200);
    let engine = fx.engine();
    let cancel = CancellationToken::new();
    engine.run_once(&cancel).await.unwrap();

    fx.write("a.txt", "restored", 100);
    let diff = engine.run_once(&cancel).await.unwrap();

    assert!(diff.is_empty());
    assert_eq!(fx.remote.file("a.txt").as_deref(), Some("one"));
}

#[tokio::test]
async fn test_unchanged_tree_is_idempotent() {
    let fx = Fixture::new();
    fx.write("a.txt", "a", 100);
    fx.write("d/b.txt", "b", 100);
    let engine = fx.engine();
    let cancel = CancellationToken::new();

    engine.run_once(&cancel).await.unwrap();
    let second = engine.run_once(&cancel).await.unwrap();
    let third = engine.run_once(&cancel).await.unwrap();

    assert!(second.is_empty());
    assert!(third.is_empty());
}

// ============================================================================
// Notebooks
// ============================================================================

#[tokio::test]
async fn test_file_becoming_notebook_moves_remote_object() {
    let fx = Fixture::new();
    fx.write("job.py", "print(1)\n", 100);
    let engine = fx.engine();
    let cancel = CancellationToken::new();
    engine.run_once(&cancel).await.unwrap();
    assert!(fx.remote.file("job.py").is_some());

    fx.write("job.py", PY_NOTEBOOK, 200);
    let diff = engine.run_once(&cancel).await.unwrap();

    assert_eq!(diff.delete, vec!["job.py".to_string()]);
    assert_eq!(diff.put, vec!["job.py".to_string()]);
    assert!(fx.remote.file("job.py").is_none());
    assert_eq!(fx.remote.file("job").as_deref(), Some(PY_NOTEBOOK));
}

#[tokio::test]
async fn test_notebook_becoming_file_moves_remote_object() {
    let fx = Fixture::new();
    fx.write("query.sql", "-- Databricks notebook source\nSELECT 1\n", 100);
    let engine = fx.engine();
    let cancel = CancellationToken::new();
    engine.run_once(&cancel).await.unwrap();
    assert!(fx.remote.file("query").is_some());

    fx.write("query.sql", "SELECT 1\n", 200);
    let diff = engine.run_once(&cancel).await.unwrap();

    assert_eq!(diff.delete, vec!["query".to_string()]);
    assert!(fx.remote.file("query").is_none());
    assert_eq!(fx.remote.file("query.sql").as_deref(), Some("SELECT 1\n"));
}

#[tokio::test]
async fn test_deleted_notebook_removes_remote_name() {
    let fx = Fixture::new();
    fx.write("nb.py", PY_NOTEBOOK, 100);
    let engine = fx.engine();
    let cancel = CancellationToken::new();
    engine.run_once(&cancel).await.unwrap();

    fx.remove("nb.py");
    let diff = engine.run_once(&cancel).await.unwrap();

    assert_eq!(diff.delete, vec!["nb".to_string()]);
    assert!(fx.remote.file_names().is_empty());
}

#[tokio::test]
async fn test_notebook_and_file_colliding_is_an_error() {
    let fx = Fixture::new();
    fx.write("x.py", PY_NOTEBOOK, 100);
    fx.write("x", "plain", 100);

    let err = fx
        .engine()
        .run_once(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("point to the same remote file location"));
    assert!(fx.remote.file_names().is_empty());
}

// ============================================================================
// Directories
// ============================================================================

#[tokio::test]
async fn test_emptied_directories_are_removed() {
    let fx = Fixture::new();
    fx.write("a/b/c.txt", "c", 100);
    fx.write("keep.txt", "k", 100);
    let engine = fx.engine();
    let cancel = CancellationToken::new();
    engine.run_once(&cancel).await.unwrap();
    assert!(fx.remote.has_dir("a/b"));

    fx.remove("a");
    let diff = engine.run_once(&cancel).await.unwrap();

    assert_eq!(diff.rmdir.len(), 2);
    assert!(!fx.remote.has_dir("a/b"));
    assert!(!fx.remote.has_dir("a"));
    assert_eq!(fx.remote.file("keep.txt").as_deref(), Some("k"));
}

#[tokio::test]
async fn test_directory_replaced_by_file() {
    let fx = Fixture::new();
    fx.write("d/inner.txt", "inner", 100);
    let engine = fx.engine();
    let cancel = CancellationToken::new();
    engine.run_once(&cancel).await.unwrap();

    fx.remove("d");
    fx.write("d", "now a file", 200);
    let diff = engine.run_once(&cancel).await.unwrap();

    assert_eq!(diff.rmdir, vec!["d".to_string()]);
    assert_eq!(diff.put, vec!["d".to_string()]);
    assert!(!fx.remote.has_dir("d"));
    assert_eq!(fx.remote.file("d").as_deref(), Some("now a file"));
}

#[tokio::test]
async fn test_file_replaced_by_directory() {
    let fx = Fixture::new();
    fx.write("d", "a file", 100);
    let engine = fx.engine();
    let cancel = CancellationToken::new();
    engine.run_once(&cancel).await.unwrap();

    fx.remove("d");
    fx.write("d/inner.txt", "inner", 200);
    engine.run_once(&cancel).await.unwrap();

    assert!(fx.remote.has_dir("d"));
    assert_eq!(fx.remote.file("d/inner.txt").as_deref(), Some("inner"));
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_events_describe_the_cycle() {
    let fx = Fixture::new();
    fx.write("a.txt", "a", 100);
    let (engine, mut rx) = fx.engine_with_events();

    engine.run_once(&CancellationToken::new()).await.unwrap();
    drop(engine);

    let texts = common::drain_texts(&mut rx);
    assert_eq!(
        texts,
        vec![
            "Action: PUT: a.txt".to_string(),
            "Uploaded a.txt".to_string(),
            "Initial Sync Complete".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_nothing_to_do_still_reports_initial_sync() {
    let fx = Fixture::new();
    let (engine, mut rx) = fx.engine_with_events();

    let diff = engine.run_once(&CancellationToken::new()).await.unwrap();
    drop(engine);

    assert!(diff.is_empty());
    assert_eq!(common::drain_texts(&mut rx), vec!["Initial Sync Complete".to_string()]);
    assert!(fx.path().join(".git").exists());
}
