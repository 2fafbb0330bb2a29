//! Concurrent application of a diff against the remote workspace
//!
//! ## Ordering
//!
//! Operations run in four phases, each a barrier for the next:
//!
//! 1. file deletes
//! 2. directory removals, one wave at a time, children before parents
//! 3. directory creations, one wave at a time, shallowest first
//! 4. file uploads
//!
//! Removal always precedes creation, so a directory replaced by a file of the
//! same name (or the reverse) converges in a single cycle.
//!
//! ## Failure and cancellation
//!
//! Within a phase at most `max_in_flight` remote calls run at once. The first
//! failure stops new operations from starting; operations already in flight
//! are allowed to finish, then the first error is returned. Cancellation
//! behaves the same way and yields [`SyncError::Cancelled`].

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::diff::Diff;
use crate::events::{EventAction, EventNotifier};
use crate::remote::RemoteFiles;
use crate::SyncError;

/// Default cap on simultaneous remote calls
pub const DEFAULT_MAX_IN_FLIGHT: usize = 20;

/// Applies a diff; the seam between the poll loop and the remote side
#[async_trait]
pub trait ApplyDiff: Send + Sync {
    /// Applies `diff` as cycle `seq`
    ///
    /// # Errors
    /// Returns the first operation failure, or [`SyncError::Cancelled`] if
    /// `cancel` fired before every operation ran.
    async fn apply(&self, seq: u64, diff: &Diff, cancel: &CancellationToken)
        -> Result<(), SyncError>;
}

// ============================================================================
// Operations
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Put { local: String, remote: String },
    Delete(String),
    Mkdir(String),
    Rmdir(String),
}

/// What became of one operation
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Done,
    /// A put whose local file was gone by the time it ran
    Skipped(String),
}

/// Everything a single operation needs, cloned into each task
#[derive(Clone)]
struct Worker {
    seq: u64,
    remote: RemoteFiles,
    local_root: PathBuf,
    events: EventNotifier,
}

impl Worker {
    async fn execute(&self, op: Op) -> Result<Outcome, SyncError> {
        match op {
            Op::Put { local, remote } => {
                let content = match tokio::fs::read(self.local_root.join(&local)).await {
                    Ok(content) => content,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        warn!(path = %local, "File vanished before upload, skipping");
                        return Ok(Outcome::Skipped(local));
                    }
                    Err(e) => return Err(e.into()),
                };
                self.events
                    .progress(self.seq, EventAction::Put, &local, 0.0)
                    .await;
                self.remote.put(&remote, content).await?;
                self.events
                    .progress(self.seq, EventAction::Put, &local, 1.0)
                    .await;
            }
            Op::Delete(remote) => {
                self.events
                    .progress(self.seq, EventAction::Delete, &remote, 0.0)
                    .await;
                self.remote.delete(&remote).await?;
                self.events
                    .progress(self.seq, EventAction::Delete, &remote, 1.0)
                    .await;
            }
            Op::Mkdir(dir) => self.remote.mkdir(&dir).await?,
            Op::Rmdir(dir) => self.remote.rmdir(&dir).await?,
        }
        Ok(Outcome::Done)
    }
}

/// Waits for a permit, then runs `op` unless the group was stopped meanwhile
async fn run_op(
    worker: Worker,
    op: Op,
    semaphore: Arc<Semaphore>,
    group: CancellationToken,
) -> Result<Outcome, SyncError> {
    let _permit = tokio::select! {
        biased;
        _ = group.cancelled() => return Ok(Outcome::Done),
        permit = semaphore.acquire_owned() => {
            permit.map_err(|e| SyncError::TaskFailed(e.to_string()))?
        }
    };
    if group.is_cancelled() {
        return Ok(Outcome::Done);
    }
    worker.execute(op).await
}

// ============================================================================
// Applier
// ============================================================================

/// Applies diffs against the remote with bounded concurrency
pub struct Applier {
    remote: RemoteFiles,
    local_root: PathBuf,
    semaphore: Arc<Semaphore>,
    events: EventNotifier,
}

impl Applier {
    /// Creates an applier reading local files below `local_root`
    ///
    /// `max_in_flight` is clamped to at least one.
    pub fn new(
        remote: RemoteFiles,
        local_root: impl Into<PathBuf>,
        max_in_flight: usize,
        events: EventNotifier,
    ) -> Self {
        Self {
            remote,
            local_root: local_root.into(),
            semaphore: Arc::new(Semaphore::new(max_in_flight.max(1))),
            events,
        }
    }

    fn worker(&self, seq: u64) -> Worker {
        Worker {
            seq,
            remote: self.remote.clone(),
            local_root: self.local_root.clone(),
            events: self.events.clone(),
        }
    }

    /// Runs one phase; returns once every spawned operation has finished
    ///
    /// On success the local paths of skipped puts are returned.
    async fn run_group(
        &self,
        seq: u64,
        ops: Vec<Op>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, SyncError> {
        if ops.is_empty() {
            return Ok(Vec::new());
        }

        let group = cancel.child_token();
        let mut tasks = JoinSet::new();
        for op in ops {
            tasks.spawn(run_op(
                self.worker(seq),
                op,
                Arc::clone(&self.semaphore),
                group.clone(),
            ));
        }

        let mut first_error: Option<SyncError> = None;
        let mut skipped = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let result = joined
                .map_err(|e| SyncError::TaskFailed(e.to_string()))
                .and_then(|r| r);
            match result {
                Ok(Outcome::Done) => {}
                Ok(Outcome::Skipped(local)) => skipped.push(local),
                Err(e) if first_error.is_none() => {
                    error!(seq, error = %e, "Apply operation failed, draining in-flight operations");
                    group.cancel();
                    first_error = Some(e);
                }
                Err(e) => debug!(seq, error = %e, "Additional apply failure"),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None if cancel.is_cancelled() => Err(SyncError::Cancelled),
            None => Ok(skipped),
        }
    }
}

#[async_trait]
impl ApplyDiff for Applier {
    #[tracing::instrument(skip(self, diff, cancel))]
    async fn apply(
        &self,
        seq: u64,
        diff: &Diff,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        self.events
            .start(seq, diff.put.clone(), diff.delete.clone())
            .await;

        let deletes = diff.delete.iter().cloned().map(Op::Delete).collect();
        self.run_group(seq, deletes, cancel).await?;

        for wave in diff.grouped_rmdir() {
            self.run_group(seq, wave.into_iter().map(Op::Rmdir).collect(), cancel)
                .await?;
        }

        for wave in diff.grouped_mkdir() {
            self.run_group(seq, wave.into_iter().map(Op::Mkdir).collect(), cancel)
                .await?;
        }

        let puts = diff
            .put
            .iter()
            .map(|local| Op::Put {
                local: local.clone(),
                remote: diff.remote_name(local).to_string(),
            })
            .collect();
        let skipped = self.run_group(seq, puts, cancel).await?;
        let put: Vec<String> = diff
            .put
            .iter()
            .filter(|local| !skipped.contains(local))
            .cloned()
            .collect();

        self.events.complete(seq, put.clone(), diff.delete.clone()).await;

        if !diff.is_empty() {
            info!(
                seq,
                put = put.len(),
                skipped = skipped.len(),
                delete = diff.delete.len(),
                "Applied changes"
            );
        }
        Ok(())
    }
}
