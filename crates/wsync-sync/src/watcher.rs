//! File watching and debounced wake-ups for the poll loop
//!
//! A [`FileWatcher`] wraps the `notify` crate and turns raw OS events into
//! [`ChangeEvent`] values. A [`ChangeWaker`] debounces them through a
//! [`DebouncedChangeQueue`] and resolves once changes have settled, which the
//! poller uses to start a cycle before its next timed tick.
//!
//! Watch events are only a hint. Every wake-up still performs a full listing,
//! so a missed or coalesced event never causes a missed change.
//!
//! ```text
//! inotify / kqueue
//!       │
//!       ▼
//!  FileWatcher ──→ mpsc::channel ──→ ChangeWaker(DebouncedChangeQueue) ──→ Poller
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::SyncError;

/// Default quiet period before a burst of changes wakes the poller
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

// ============================================================================
// ChangeEvent
// ============================================================================

/// A filesystem change reported by the watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A file or directory was created
    Created(PathBuf),
    /// A file was modified (content or metadata)
    Modified(PathBuf),
    /// A file or directory was removed
    Deleted(PathBuf),
    /// A file or directory was renamed
    Renamed {
        /// Path before the rename
        old: PathBuf,
        /// Path after the rename
        new: PathBuf,
    },
}

impl ChangeEvent {
    /// Returns the primary path of this event (the destination for renames)
    pub fn path(&self) -> &Path {
        match self {
            ChangeEvent::Created(p) | ChangeEvent::Modified(p) | ChangeEvent::Deleted(p) => p,
            ChangeEvent::Renamed { new, .. } => new,
        }
    }
}

// ============================================================================
// FileWatcher
// ============================================================================

/// Recursively watches the sync root using the OS-native mechanism
pub struct FileWatcher {
    watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Creates a watcher and the channel its events are delivered on
    ///
    /// Events whose paths all lie below one of `excluded` are dropped, so the
    /// tool's own snapshot writes do not wake the poller.
    ///
    /// # Errors
    /// Returns [`SyncError::Watch`] if the OS watcher cannot be created
    pub fn new(excluded: Vec<PathBuf>) -> Result<(Self, mpsc::Receiver<ChangeEvent>), SyncError> {
        let (tx, rx) = mpsc::channel::<ChangeEvent>(1024);

        let watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if event
                        .paths
                        .iter()
                        .all(|p| excluded.iter().any(|dir| p.starts_with(dir)))
                    {
                        trace!(paths = ?event.paths, "Ignoring event in excluded directory");
                        return;
                    }
                    if let Some(change) = map_notify_event(&event) {
                        if tx.blocking_send(change).is_err() {
                            trace!("Change receiver dropped");
                        }
                    }
                }
                Err(err) => {
                    error!(error = %err, "File watcher error");
                }
            },
            notify::Config::default(),
        )?;

        Ok((Self { watcher }, rx))
    }

    /// Starts watching `path` and everything below it
    ///
    /// # Errors
    /// Returns [`SyncError::Watch`] if the path cannot be watched (missing,
    /// permission denied, or the OS watch limit reached).
    pub fn watch(&mut self, path: &Path) -> Result<(), SyncError> {
        info!(path = %path.display(), "Watching for local changes");
        self.watcher.watch(path, RecursiveMode::Recursive)?;
        Ok(())
    }
}

/// Converts a `notify::Event` into a [`ChangeEvent`]
///
/// - `Create(*)` -> `Created`
/// - `Modify(Name(Both))` with two paths -> `Renamed`
/// - other `Modify(*)` -> `Modified`
/// - `Remove(*)` -> `Deleted`
///
/// Access events and events without paths yield `None`.
fn map_notify_event(event: &notify::Event) -> Option<ChangeEvent> {
    let paths = &event.paths;

    match &event.kind {
        EventKind::Create(_) => Some(ChangeEvent::Created(paths.first()?.clone())),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() >= 2 => {
            Some(ChangeEvent::Renamed {
                old: paths[0].clone(),
                new: paths[1].clone(),
            })
        }
        EventKind::Modify(_) => Some(ChangeEvent::Modified(paths.first()?.clone())),
        EventKind::Remove(_) => Some(ChangeEvent::Deleted(paths.first()?.clone())),
        _ => {
            trace!(kind = ?event.kind, "Ignoring event kind");
            None
        }
    }
}

// ============================================================================
// DebouncedChangeQueue
// ============================================================================

/// Coalesces bursts of changes per path until they go quiet
///
/// A new event for a path replaces the pending one and restarts its timer,
/// so a file being written in many small chunks settles once.
pub struct DebouncedChangeQueue {
    pending: HashMap<PathBuf, (ChangeEvent, Instant)>,
    debounce_delay: Duration,
}

impl DebouncedChangeQueue {
    /// Creates a queue with the given quiet period
    pub fn new(debounce_delay: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            debounce_delay,
        }
    }

    /// Inserts or refreshes the pending event for the event's path
    pub fn push(&mut self, event: ChangeEvent) {
        let path = event.path().to_path_buf();
        trace!(path = %path.display(), event = ?event, "Enqueuing change event");
        self.pending.insert(path, (event, Instant::now()));
    }

    /// Removes and returns every event that has been quiet long enough
    pub fn poll(&mut self) -> Vec<ChangeEvent> {
        let now = Instant::now();
        let settled_paths: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, (_, at))| now.duration_since(*at) >= self.debounce_delay)
            .map(|(path, _)| path.clone())
            .collect();

        settled_paths
            .iter()
            .filter_map(|path| self.pending.remove(path))
            .map(|(event, _)| event)
            .collect()
    }

    /// When the oldest pending event settles, if any are pending
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending
            .values()
            .map(|(_, at)| *at + self.debounce_delay)
            .min()
    }

    /// Number of paths with unsettled events
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// ============================================================================
// ChangeWaker
// ============================================================================

/// Turns a stream of change events into debounced wake-ups
pub struct ChangeWaker {
    rx: mpsc::Receiver<ChangeEvent>,
    queue: DebouncedChangeQueue,
}

impl ChangeWaker {
    /// Creates a waker reading from `rx`
    pub fn new(rx: mpsc::Receiver<ChangeEvent>, debounce_delay: Duration) -> Self {
        Self {
            rx,
            queue: DebouncedChangeQueue::new(debounce_delay),
        }
    }

    /// Resolves with the settled changes once at least one has settled
    ///
    /// Cancel-safe: events received before the future is dropped stay queued.
    /// Never resolves once the channel is closed and the queue is drained.
    pub async fn settled(&mut self) -> Vec<ChangeEvent> {
        loop {
            let Some(deadline) = self.queue.next_deadline() else {
                match self.rx.recv().await {
                    Some(event) => self.queue.push(event),
                    None => std::future::pending::<()>().await,
                }
                continue;
            };

            tokio::select! {
                received = self.rx.recv() => match received {
                    Some(event) => self.queue.push(event),
                    None => tokio::time::sleep_until(deadline).await,
                },
                _ = tokio::time::sleep_until(deadline) => {}
            }

            let settled = self.queue.poll();
            if !settled.is_empty() {
                debug!(count = settled.len(), "Local changes settled");
                return settled;
            }
        }
    }
}

/// Starts a watcher on `root` and wraps it in a [`ChangeWaker`]
///
/// The returned [`FileWatcher`] must be kept alive for events to flow.
///
/// # Errors
/// Returns an error if the watcher cannot be created or `root` watched.
pub fn watch_root(
    root: &Path,
    excluded: Vec<PathBuf>,
    debounce_delay: Duration,
) -> Result<(FileWatcher, ChangeWaker), SyncError> {
    let (mut watcher, rx) = FileWatcher::new(excluded)?;
    if let Err(e) = watcher.watch(root) {
        warn!(path = %root.display(), error = %e, "Cannot watch sync root");
        return Err(e);
    }
    Ok((watcher, ChangeWaker::new(rx, debounce_delay)))
}
