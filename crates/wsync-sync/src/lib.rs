//! wsync Sync - local-to-workspace file synchronization engine
//!
//! Provides:
//! - Ignore-aware recursive file listing
//! - Local/remote naming across the notebook boundary
//! - Snapshot-based change detection with disk persistence
//! - Bounded-concurrency application of change sets
//! - A poll loop for continuous synchronization
//!
//! ## Modules
//!
//! - [`fileset`] - Recursive listing of files under the sync root
//! - [`ignore`] - Hierarchical ignore-file resolution (repository and view)
//! - [`notebook`] - Notebook detection and remote naming
//! - [`state`] - Bijective local/remote name mapping with modification times
//! - [`diff`] - Change set computation between two states
//! - [`snapshot`] - Versioned on-disk persistence of the state
//! - [`events`] - Progress event model and renderers
//! - [`remote`] - Idempotent wrapper around the remote port
//! - [`applier`] - Concurrent application of a change set
//! - [`poller`] - The list/diff/apply control loop
//! - [`watcher`] - Filesystem notifications that wake the poller early
//! - [`engine`] - Session object wiring all of the above together

pub mod applier;
pub mod diff;
pub mod engine;
pub mod events;
pub mod fileset;
pub mod ignore;
pub mod notebook;
pub mod poller;
pub mod remote;
pub mod snapshot;
pub mod state;
pub mod watcher;

use std::path::PathBuf;

use thiserror::Error;

use wsync_core::domain::errors::DomainError;
use wsync_core::ports::workspace_files::RemoteError;

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error occurred during file operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Walking the local tree failed
    #[error("Failed to list local files: {0}")]
    WalkError(#[from] walkdir::Error),

    /// A listing request escapes the sync root
    #[error("Path is outside the sync root: {0}")]
    OutsideRoot(String),

    /// An ignore rule file exists but could not be read
    #[error("Failed to read ignore rules from {path}: {source}")]
    IgnoreRules {
        /// The ignore file that failed to load
        path: PathBuf,
        /// Underlying cause
        #[source]
        source: std::io::Error,
    },

    /// An ignore pattern could not be compiled
    #[error("Invalid ignore pattern {pattern:?}: {message}")]
    InvalidPattern {
        /// The offending pattern line
        pattern: String,
        /// Why it was rejected
        message: String,
    },

    /// Two local files resolve to the same remote identity
    #[error(
        "both {first} and {second} point to the same remote file location {remote}. \
         Please remove one of them from your local project"
    )]
    RemoteNameCollision {
        /// The local path seen first
        first: String,
        /// The local path seen second
        second: String,
        /// The contested remote identity
        remote: String,
    },

    /// The in-memory or persisted state violates its invariants
    #[error("Sync state is corrupt: {0}")]
    CorruptState(String),

    /// The snapshot file could not be decoded or encoded
    #[error("Snapshot error for {path}: {source}")]
    Snapshot {
        /// Location of the snapshot file
        path: PathBuf,
        /// Underlying cause
        #[source]
        source: serde_json::Error,
    },

    /// The remote path cannot be used as a sync target
    #[error("Remote path is not usable: {0}")]
    UnusableRemotePath(String),

    /// A remote operation failed
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The filesystem watcher could not be set up
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// The sync was cancelled before it completed
    #[error("Sync cancelled")]
    Cancelled,

    /// A worker task panicked or was aborted
    #[error("Sync task failed: {0}")]
    TaskFailed(String),

    /// A domain-level error propagated from wsync-core
    #[error("Domain error: {0}")]
    DomainError(#[from] DomainError),
}

pub use diff::Diff;
pub use engine::{SyncEngine, SyncOptions};
pub use fileset::{File, FileSet, Ignorer};
pub use snapshot::Snapshot;
pub use state::SnapshotState;
