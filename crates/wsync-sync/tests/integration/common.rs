//! Shared fixtures: an in-memory workspace and a local project directory

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use filetime::FileTime;
use tempfile::TempDir;
use tokio::sync::mpsc;

use wsync_core::domain::newtypes::RemotePath;
use wsync_core::ports::workspace_files::{
    IWorkspaceFiles, ObjectInfo, ObjectType, Principal, RemoteError,
};
use wsync_sync::events::{Event, EventNotifier};
use wsync_sync::{SyncEngine, SyncOptions};

pub const HOST: &str = "https://acme.example.com";
pub const USER: &str = "me@example.com";
pub const REMOTE_ROOT: &str = "/Users/me@example.com/project";

pub const PY_NOTEBOOK: &str = "# Databricks notebook source\nprint(1)\n";

/// Workspace double that behaves like the REST adapter seen through the port
///
/// Uploads create missing parents. Files and directories share one namespace,
/// so a file cannot be uploaded over a directory and vice versa.
#[derive(Default)]
pub struct MemoryWorkspace {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    dirs: Mutex<BTreeSet<String>>,
}

impl MemoryWorkspace {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Content of the remote file at `relative` below [`REMOTE_ROOT`]
    pub fn file(&self, relative: &str) -> Option<String> {
        let path = format!("{REMOTE_ROOT}/{relative}");
        self.files
            .lock()
            .unwrap()
            .get(&path)
            .map(|c| String::from_utf8_lossy(c).into_owned())
    }

    pub fn has_dir(&self, relative: &str) -> bool {
        let path = format!("{REMOTE_ROOT}/{relative}");
        self.dirs.lock().unwrap().contains(&path)
    }

    /// Every remote file below [`REMOTE_ROOT`], relative to it
    pub fn file_names(&self) -> Vec<String> {
        let prefix = format!("{REMOTE_ROOT}/");
        self.files
            .lock()
            .unwrap()
            .keys()
            .filter_map(|p| p.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    fn insert_dirs(&self, path: &str) {
        let mut dirs = self.dirs.lock().unwrap();
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(part);
            dirs.insert(current.clone());
        }
    }
}

#[async_trait]
impl IWorkspaceFiles for MemoryWorkspace {
    async fn upload(&self, path: &str, content: Vec<u8>, overwrite: bool) -> Result<(), RemoteError> {
        if self.dirs.lock().unwrap().contains(path) {
            return Err(RemoteError::AlreadyExists(path.to_string()));
        }
        if !overwrite && self.files.lock().unwrap().contains_key(path) {
            return Err(RemoteError::AlreadyExists(path.to_string()));
        }
        if let Some((parent, _)) = path.rsplit_once('/') {
            self.insert_dirs(parent);
        }
        self.files.lock().unwrap().insert(path.to_string(), content);
        Ok(())
    }

    async fn delete(&self, path: &str, recursive: bool) -> Result<(), RemoteError> {
        if self.files.lock().unwrap().remove(path).is_some() {
            return Ok(());
        }
        if !self.dirs.lock().unwrap().contains(path) {
            return Err(RemoteError::NotFound(path.to_string()));
        }

        let prefix = format!("{path}/");
        let mut files = self.files.lock().unwrap();
        let mut dirs = self.dirs.lock().unwrap();
        let has_children = files.keys().any(|p| p.starts_with(&prefix))
            || dirs.iter().any(|p| p.starts_with(&prefix));
        if has_children && !recursive {
            return Err(RemoteError::DirectoryNotEmpty(path.to_string()));
        }
        files.retain(|p, _| !p.starts_with(&prefix));
        dirs.retain(|p| p != path && !p.starts_with(&prefix));
        Ok(())
    }

    async fn mkdirs(&self, path: &str) -> Result<(), RemoteError> {
        if self.files.lock().unwrap().contains_key(path) {
            return Err(RemoteError::AlreadyExists(path.to_string()));
        }
        self.insert_dirs(path);
        Ok(())
    }

    async fn get_status(&self, path: &str) -> Result<ObjectInfo, RemoteError> {
        let object_type = if self.dirs.lock().unwrap().contains(path) {
            ObjectType::Directory
        } else if self.files.lock().unwrap().contains_key(path) {
            ObjectType::File
        } else {
            return Err(RemoteError::NotFound(path.to_string()));
        };
        Ok(ObjectInfo {
            path: path.to_string(),
            object_type,
        })
    }

    async fn current_principal(&self) -> Result<Principal, RemoteError> {
        Ok(Principal {
            user_name: USER.to_string(),
        })
    }
}

/// A local project, a snapshot cache and the workspace they sync to
pub struct Fixture {
    pub local: TempDir,
    pub cache: TempDir,
    pub remote: Arc<MemoryWorkspace>,
}

impl Fixture {
    pub fn new() -> Self {
        let local = TempDir::new().unwrap();
        // Pin the repository root to the project itself
        fs::create_dir(local.path().join(".git")).unwrap();
        Self {
            local,
            cache: TempDir::new().unwrap(),
            remote: MemoryWorkspace::new(),
        }
    }

    pub fn options(&self) -> SyncOptions {
        let mut options = SyncOptions::new(
            self.local.path(),
            RemotePath::new(REMOTE_ROOT.to_string()).unwrap(),
            HOST,
        );
        options.cache_dir = self.cache.path().to_path_buf();
        options.global_excludes_file = Some(self.cache.path().join("no-global-excludes"));
        options.max_in_flight = 4;
        options
    }

    pub fn engine(&self) -> SyncEngine {
        SyncEngine::new(self.options(), self.remote.clone())
    }

    pub fn full_engine(&self) -> SyncEngine {
        let mut options = self.options();
        options.full = true;
        SyncEngine::new(options, self.remote.clone())
    }

    /// An engine whose events can be drained after it is dropped
    pub fn engine_with_events(&self) -> (SyncEngine, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(256);
        let engine = self.engine().with_events(EventNotifier::new(tx));
        (engine, rx)
    }

    /// Writes `content` to `relative` with a modification time of `mtime` seconds
    pub fn write(&self, relative: &str, content: &str, mtime: i64) {
        let path = self.local.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
    }

    pub fn remove(&self, relative: &str) {
        let path = self.local.path().join(relative);
        if path.is_dir() {
            fs::remove_dir_all(path).unwrap();
        } else {
            fs::remove_file(path).unwrap();
        }
    }

    pub fn path(&self) -> &Path {
        self.local.path()
    }
}

/// Drains every event already sent on `rx`
pub fn drain_texts(rx: &mut mpsc::Receiver<Event>) -> Vec<String> {
    let mut texts = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let Some(text) = event.to_text() {
            texts.push(text);
        }
    }
    texts
}
