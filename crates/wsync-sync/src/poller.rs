//! The list / diff / apply control loop
//!
//! ## State machine
//!
//! ```text
//! Idle ──tick or wake──→ Listing ──→ Diffing ──→ Applying ──→ Idle
//!   │                                  │ empty      │ error
//!   └── cancel ──→ Cancelled           └──→ Idle    └──→ Terminated
//! ```
//!
//! The poller owns the committed [`SnapshotState`](crate::state::SnapshotState)
//! exclusively. A cycle diffs against a copy and commits (in memory and on
//! disk) only after the diff was applied, so a failed or cancelled cycle is
//! retried in full next time.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::applier::ApplyDiff;
use crate::diff::{diff, Diff};
use crate::fileset::{File, FileSet};
use crate::snapshot::Snapshot;
use crate::watcher::{ChangeEvent, ChangeWaker};
use crate::SyncError;

/// Default time between two polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Repeatedly converges the remote tree to the local one
pub struct Poller {
    fileset: FileSet,
    include: Vec<String>,
    snapshot: Snapshot,
    applier: Arc<dyn ApplyDiff>,
    interval: Duration,
    waker: Option<ChangeWaker>,
    seq: u64,
}

impl Poller {
    /// Creates a poller listing the whole of `fileset`
    pub fn new(
        fileset: FileSet,
        snapshot: Snapshot,
        applier: Arc<dyn ApplyDiff>,
        interval: Duration,
    ) -> Self {
        Self {
            fileset,
            include: vec![".".to_string()],
            snapshot,
            applier,
            interval,
            waker: None,
            seq: 0,
        }
    }

    /// Restricts listing to the given root-relative paths
    ///
    /// An empty list means the whole root.
    pub fn with_include(mut self, include: Vec<String>) -> Self {
        if !include.is_empty() {
            self.include = include;
        }
        self
    }

    /// Lets filesystem notifications start a cycle before the next tick
    pub fn with_waker(mut self, waker: ChangeWaker) -> Self {
        self.waker = Some(waker);
        self
    }

    /// The committed snapshot
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Sequence number the next applied cycle will carry
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Lists local files on the blocking pool
    async fn list(&self) -> Result<Vec<File>, SyncError> {
        let fileset = self.fileset.clone();
        let include = self.include.clone();
        tokio::task::spawn_blocking(move || fileset.files(&include))
            .await
            .map_err(|e| SyncError::TaskFailed(e.to_string()))?
    }

    /// Computes the pending diff without applying or committing it
    ///
    /// # Errors
    /// Returns listing, ignore-rule or name-collision errors.
    pub async fn preview(&self) -> Result<Diff, SyncError> {
        let files = self.list().await?;
        let mut next = self.snapshot.state().clone();
        diff(&mut next, &files)
    }

    /// Runs a single cycle and applies its diff even if it is empty
    ///
    /// # Errors
    /// Returns the first listing, diff, apply or persistence error, or
    /// [`SyncError::Cancelled`].
    pub async fn run_once(&mut self, cancel: &CancellationToken) -> Result<Diff, SyncError> {
        self.cycle(true, cancel).await
    }

    /// Polls until cancelled or until a cycle fails
    ///
    /// The first cycle always applies, so a session reports its initial sync
    /// even when nothing changed. Later cycles with an empty diff are skipped
    /// silently. Cancellation is a clean exit; the in-flight cycle, if any,
    /// is not committed.
    ///
    /// # Errors
    /// Returns the error of the first failing cycle.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<(), SyncError> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = self.interval.as_millis() as u64, "Starting sync loop");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Sync loop cancelled");
                    return Ok(());
                }
                _ = ticker.tick() => {}
                changes = wait_for_changes(&mut self.waker) => {
                    debug!(count = changes.len(), "Woken by local changes");
                }
            }

            let force = self.seq == 0;
            match self.cycle(force, cancel).await {
                Ok(_) => {}
                Err(SyncError::Cancelled) => {
                    info!("Sync loop cancelled during apply");
                    return Ok(());
                }
                Err(e) => {
                    warn!(seq = self.seq, error = %e, "Sync cycle failed, stopping");
                    return Err(e);
                }
            }
        }
    }

    async fn cycle(&mut self, force: bool, cancel: &CancellationToken) -> Result<Diff, SyncError> {
        let seq = self.seq;
        let files = self.list().await?;

        let mut next = self.snapshot.state().clone();
        let change = diff(&mut next, &files)?;
        if change.is_empty() && !force {
            debug!(seq, "No changes");
            return Ok(change);
        }

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        self.applier.apply(seq, &change, cancel).await?;

        self.snapshot.set_state(next);
        self.snapshot.save()?;
        self.seq += 1;
        Ok(change)
    }
}

async fn wait_for_changes(waker: &mut Option<ChangeWaker>) -> Vec<ChangeEvent> {
    match waker {
        Some(waker) => waker.settled().await,
        None => std::future::pending().await,
    }
}
