//! Ignore files, exclude files and extra patterns seen through a session

use std::fs;

use tokio_util::sync::CancellationToken;
use wsync_sync::SyncEngine;

use crate::common::Fixture;

#[tokio::test]
async fn test_gitignore_hierarchy_is_respected() {
    let fx = Fixture::new();
    fx.write(".gitignore", "*.log\nbuild/\n", 100);
    fx.write("src/.gitignore", "secret.py\n", 100);
    fx.write("app.py", "a", 100);
    fx.write("debug.log", "noise", 100);
    fx.write("build/out.bin", "bin", 100);
    fx.write("src/main.py", "m", 100);
    fx.write("src/secret.py", "s", 100);
    fx.write("docs/secret.py", "public", 100);

    fx.engine().run_once(&CancellationToken::new()).await.unwrap();

    let names = fx.remote.file_names();
    assert!(names.contains(&"app.py".to_string()));
    assert!(names.contains(&"src/main.py".to_string()));
    assert!(names.contains(&"docs/secret.py".to_string()));
    assert!(!names.contains(&"debug.log".to_string()));
    assert!(!names.contains(&"build/out.bin".to_string()));
    assert!(!names.contains(&"src/secret.py".to_string()));
    assert!(!fx.remote.has_dir("build"));
}

#[tokio::test]
async fn test_vcs_and_state_dirs_are_never_synced() {
    let fx = Fixture::new();
    fx.write(".git/HEAD", "ref: refs/heads/main\n", 100);
    fx.write(".wsync/notes", "local", 100);
    fx.write("a.txt", "a", 100);

    fx.engine().run_once(&CancellationToken::new()).await.unwrap();

    assert_eq!(fx.remote.file_names(), vec!["a.txt".to_string()]);
}

#[tokio::test]
async fn test_info_exclude_and_extra_patterns() {
    let fx = Fixture::new();
    fx.write(".git/info/exclude", "scratch/\n", 100);
    fx.write("scratch/tmp.py", "x", 100);
    fx.write("cache.tmp", "x", 100);
    fx.write("keep.py", "k", 100);

    let mut options = fx.options();
    options.extra_patterns = vec!["*.tmp".to_string()];
    SyncEngine::new(options, fx.remote.clone())
        .run_once(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(fx.remote.file_names(), vec!["keep.py".to_string()]);
}

#[tokio::test]
async fn test_global_excludes_file() {
    let fx = Fixture::new();
    let global = fx.cache.path().join("global-ignore");
    fs::write(&global, ".DS_Store\n").unwrap();
    fx.write(".DS_Store", "finder", 100);
    fx.write("a.txt", "a", 100);

    let mut options = fx.options();
    options.global_excludes_file = Some(global);
    SyncEngine::new(options, fx.remote.clone())
        .run_once(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(fx.remote.file_names(), vec!["a.txt".to_string()]);
}

#[tokio::test]
async fn test_newly_ignored_file_is_removed_remotely() {
    let fx = Fixture::new();
    fx.write("a.txt", "a", 100);
    fx.write("b.py", "b", 100);
    let engine = fx.engine();
    let cancel = CancellationToken::new();
    engine.run_once(&cancel).await.unwrap();

    fx.write(".gitignore", "*.txt\n", 200);
    let diff = engine.run_once(&cancel).await.unwrap();

    assert_eq!(diff.delete, vec!["a.txt".to_string()]);
    assert!(fx.remote.file("a.txt").is_none());
    assert!(fx.remote.file("b.py").is_some());
}

#[tokio::test]
async fn test_invalid_extra_pattern_is_an_error() {
    let fx = Fixture::new();
    let mut options = fx.options();
    options.extra_patterns = vec!["a[".to_string()];

    assert!(SyncEngine::new(options, fx.remote.clone()).dry_run().await.is_err());
}
