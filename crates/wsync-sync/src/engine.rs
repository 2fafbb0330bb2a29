//! Sync session object
//!
//! [`SyncEngine`] is built once per invocation from a [`SyncOptions`] and a
//! remote port implementation. It wires the ignore view, file set, snapshot,
//! applier and poller together and exposes the three ways a session can run:
//!
//! - [`SyncEngine::run_once`] - a single forced cycle
//! - [`SyncEngine::run`] - the continuous poll loop, optionally woken early
//!   by filesystem notifications
//! - [`SyncEngine::dry_run`] - compute the pending diff without touching the
//!   remote or the snapshot
//!
//! ## Example
//!
//! ```rust,ignore
//! let options = SyncOptions::new("./project", remote_path, "https://acme.example.com");
//! let engine = SyncEngine::new(options, client).with_events(EventNotifier::new(tx));
//! engine.run(&CancellationToken::new()).await?;
//! ```

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use wsync_core::config::Config;
use wsync_core::domain::newtypes::RemotePath;
use wsync_core::ports::workspace_files::{IWorkspaceFiles, RemoteError};

use crate::applier::{Applier, DEFAULT_MAX_IN_FLIGHT};
use crate::diff::Diff;
use crate::events::EventNotifier;
use crate::fileset::FileSet;
use crate::ignore::{global_excludes_file, View, STATE_DIR_NAME};
use crate::poller::{Poller, DEFAULT_POLL_INTERVAL};
use crate::remote::RemoteFiles;
use crate::snapshot::{Snapshot, SNAPSHOT_DIR_NAME};
use crate::watcher::{watch_root, DEFAULT_DEBOUNCE};
use crate::SyncError;

// ============================================================================
// SyncOptions
// ============================================================================

/// Everything a sync session needs to know, resolved once per invocation
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Local directory being synchronized
    pub local_root: PathBuf,
    /// Remote directory receiving the files
    pub remote_path: RemotePath,
    /// Workspace host URL; part of the snapshot identity
    pub host: String,
    /// Root-relative paths to list; empty means the whole root
    pub include: Vec<String>,
    /// Time between two polls in continuous mode
    pub poll_interval: Duration,
    /// Upper bound on concurrent remote operations
    pub max_in_flight: usize,
    /// Directory holding the snapshot cache
    pub cache_dir: PathBuf,
    /// Global excludes file; resolved from git configuration when unset
    pub global_excludes_file: Option<PathBuf>,
    /// Additional ignore patterns applied at the local root
    pub extra_patterns: Vec<String>,
    /// Discard the snapshot and upload everything again
    pub full: bool,
}

impl SyncOptions {
    /// Options with defaults for everything but the sync target
    pub fn new(
        local_root: impl Into<PathBuf>,
        remote_path: RemotePath,
        host: impl Into<String>,
    ) -> Self {
        let local_root = local_root.into();
        Self {
            cache_dir: local_root.join(STATE_DIR_NAME),
            local_root,
            remote_path,
            host: host.into(),
            include: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            global_excludes_file: None,
            extra_patterns: Vec::new(),
            full: false,
        }
    }

    /// Options taken from the `sync`, `ignore` and `cache` config sections
    pub fn from_config(config: &Config, remote_path: RemotePath, host: impl Into<String>) -> Self {
        Self {
            local_root: config.sync.root.clone(),
            remote_path,
            host: host.into(),
            include: config.sync.include.clone(),
            poll_interval: Duration::from_secs(config.sync.poll_interval.max(1)),
            max_in_flight: config.sync.max_in_flight,
            cache_dir: config.cache_dir(),
            global_excludes_file: config.ignore.global_excludes_file.clone(),
            extra_patterns: config.ignore.extra_patterns.clone(),
            full: false,
        }
    }

    /// Anchored ignore pattern for the snapshot directory when it lies
    /// inside the local root, so snapshot files are never listed
    fn snapshot_dir_pattern(&self) -> Option<String> {
        let snapshots = self.cache_dir.join(SNAPSHOT_DIR_NAME);
        let relative = match snapshots.strip_prefix(&self.local_root) {
            Ok(relative) if is_plain(relative) => relative.to_path_buf(),
            _ => {
                let root = self.local_root.canonicalize().ok()?;
                let cache = self.cache_dir.canonicalize().ok()?;
                cache.join(SNAPSHOT_DIR_NAME).strip_prefix(&root).ok()?.to_path_buf()
            }
        };

        let parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            return None;
        }
        Some(format!("/{}/", parts.join("/")))
    }
}

/// True if `path` only descends, never climbing with `..`
fn is_plain(path: &Path) -> bool {
    !path.components().any(|c| matches!(c, Component::ParentDir))
}

// ============================================================================
// SyncEngine
// ============================================================================

/// One sync session between a local directory and a remote directory
pub struct SyncEngine {
    options: SyncOptions,
    client: Arc<dyn IWorkspaceFiles>,
    events: EventNotifier,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("options", &self.options)
            .finish()
    }
}

impl SyncEngine {
    /// Creates an engine that reports no events
    pub fn new(options: SyncOptions, client: Arc<dyn IWorkspaceFiles>) -> Self {
        Self {
            options,
            client,
            events: EventNotifier::disabled(),
        }
    }

    /// Delivers progress events through `events`
    pub fn with_events(mut self, events: EventNotifier) -> Self {
        self.events = events;
        self
    }

    /// The options this session was built with
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Checks the remote path can receive files, creating it if needed
    ///
    /// An existing directory or repo is accepted as is. A missing path is
    /// only created when it lies below the caller's home directory.
    ///
    /// # Errors
    /// Returns [`SyncError::UnusableRemotePath`] if the path exists as a
    /// non-directory or is missing outside the home directory, and any
    /// remote failure.
    #[tracing::instrument(skip(self), fields(remote = %self.options.remote_path))]
    pub async fn ensure_remote_path_usable(&self) -> Result<(), SyncError> {
        let remote = &self.options.remote_path;
        match self.client.get_status(remote.as_str()).await {
            Ok(info) if info.object_type.is_container() => {
                debug!(kind = ?info.object_type, "Remote path exists");
                return Ok(());
            }
            Ok(info) => {
                return Err(SyncError::UnusableRemotePath(format!(
                    "{remote} exists as {:?}, not a directory",
                    info.object_type
                )));
            }
            Err(RemoteError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let principal = self.client.current_principal().await?;
        let home = principal.home()?;
        if *remote == home || !remote.starts_with(&home) {
            return Err(SyncError::UnusableRemotePath(format!(
                "{remote} does not exist and is not inside your home directory {home}"
            )));
        }

        info!("Creating remote directory");
        self.client.mkdirs(remote.as_str()).await?;
        Ok(())
    }

    /// File set over the local root with the session's ignore rules
    ///
    /// # Errors
    /// Returns an error if the local root cannot be resolved or an extra
    /// ignore pattern is invalid.
    pub fn fileset(&self) -> Result<FileSet, SyncError> {
        let global = self
            .options
            .global_excludes_file
            .clone()
            .or_else(global_excludes_file);
        let mut patterns = self.options.extra_patterns.clone();
        if let Some(pattern) = self.options.snapshot_dir_pattern() {
            debug!(%pattern, "Snapshot directory is inside the local root, ignoring it");
            patterns.push(pattern);
        }
        let view = View::new(&self.options.local_root, global, &patterns)?;
        Ok(FileSet::new(&self.options.local_root, Arc::new(view)))
    }

    fn load_snapshot(&self) -> Result<Snapshot, SyncError> {
        let o = &self.options;
        let remote = o.remote_path.as_str();
        if o.full {
            let fresh = Snapshot::new(&o.cache_dir, &o.host, remote);
            info!(path = %fresh.path().display(), "Discarding snapshot for full sync");
            fresh.destroy()?;
            return Ok(fresh);
        }
        Snapshot::load(&o.cache_dir, &o.host, remote)
    }

    fn build_poller(&self) -> Result<Poller, SyncError> {
        let o = &self.options;
        let remote = RemoteFiles::new(Arc::clone(&self.client), o.remote_path.clone());
        let applier = Applier::new(remote, &o.local_root, o.max_in_flight, self.events.clone());
        let poller = Poller::new(
            self.fileset()?,
            self.load_snapshot()?,
            Arc::new(applier),
            o.poll_interval,
        )
        .with_include(o.include.clone());
        Ok(poller)
    }

    /// Runs one cycle and returns the diff it applied
    ///
    /// # Errors
    /// Returns the first validation, listing, diff, apply or persistence
    /// error, or [`SyncError::Cancelled`].
    #[tracing::instrument(skip(self, cancel), fields(local = %self.options.local_root.display()))]
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<Diff, SyncError> {
        self.ensure_remote_path_usable().await?;
        let mut poller = self.build_poller()?;
        poller.run_once(cancel).await
    }

    /// Polls until `cancel` fires or a cycle fails
    ///
    /// Filesystem notifications wake the loop early when a watcher can be
    /// installed; otherwise the loop relies on the timer alone.
    ///
    /// # Errors
    /// Returns the error of the first failing cycle.
    #[tracing::instrument(skip(self, cancel), fields(local = %self.options.local_root.display()))]
    pub async fn run(&self, cancel: &CancellationToken) -> Result<(), SyncError> {
        self.ensure_remote_path_usable().await?;
        let mut poller = self.build_poller()?;

        // Dropping the watcher stops notifications, so it lives for the loop
        let _watcher = match watch_root(
            &self.options.local_root,
            vec![self.options.cache_dir.clone()],
            DEFAULT_DEBOUNCE,
        ) {
            Ok((watcher, waker)) => {
                poller = poller.with_waker(waker);
                Some(watcher)
            }
            Err(e) => {
                warn!(error = %e, "File watcher unavailable, polling only");
                None
            }
        };

        poller.run(cancel).await
    }

    /// Computes what the next cycle would do without doing it
    ///
    /// Makes no remote calls and leaves the snapshot on disk untouched. With
    /// `full` set the diff is computed against an empty state.
    ///
    /// # Errors
    /// Returns listing, ignore-rule, snapshot or name-collision errors.
    #[tracing::instrument(skip(self), fields(local = %self.options.local_root.display()))]
    pub async fn dry_run(&self) -> Result<Diff, SyncError> {
        let o = &self.options;
        let remote = o.remote_path.as_str();
        let snapshot = if o.full {
            Snapshot::new(&o.cache_dir, &o.host, remote)
        } else {
            Snapshot::load(&o.cache_dir, &o.host, remote)?
        };
        let remote_files = RemoteFiles::new(Arc::clone(&self.client), o.remote_path.clone());
        let applier = Applier::new(remote_files, &o.local_root, o.max_in_flight, EventNotifier::disabled());
        let poller = Poller::new(self.fileset()?, snapshot, Arc::new(applier), o.poll_interval)
            .with_include(o.include.clone());
        poller.preview().await
    }
}
