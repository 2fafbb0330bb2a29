//! Versioned on-disk persistence of the sync state
//!
//! One snapshot file exists per (host, remote path) pair, named by a hash of
//! the two so unrelated sync targets never share state. Files written by a
//! different schema version are discarded rather than migrated.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::state::SnapshotState;
use crate::SyncError;

/// Current snapshot schema version
pub const SNAPSHOT_VERSION: &str = "v1";

/// Subdirectory of the cache root holding snapshot files
pub const SNAPSHOT_DIR_NAME: &str = "sync-snapshots";

/// Number of hex characters in a snapshot file name
const KEY_LEN: usize = 16;

/// Persisted sync state for one (host, remote path) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Location of the backing file; not serialized
    #[serde(skip)]
    path: PathBuf,

    /// Schema version the file was written with
    version: String,

    /// Workspace host this snapshot belongs to
    host: String,

    /// Remote root this snapshot belongs to
    remote_path: String,

    #[serde(flatten)]
    state: SnapshotState,
}

/// Just enough of a snapshot file to decide whether it can be decoded
#[derive(Deserialize)]
struct VersionProbe {
    #[serde(default)]
    version: Option<String>,
}

/// Computes the snapshot file location for a (host, remote path) pair
pub fn snapshot_path(cache_dir: &Path, host: &str, remote_path: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(host.as_bytes());
    hasher.update(remote_path.as_bytes());
    let digest = hex::encode(hasher.finalize());

    cache_dir
        .join(SNAPSHOT_DIR_NAME)
        .join(format!("{}.json", &digest[..KEY_LEN]))
}

impl Snapshot {
    /// Creates an empty snapshot; nothing is written until [`Snapshot::save`]
    pub fn new(cache_dir: &Path, host: &str, remote_path: &str) -> Self {
        Self {
            path: snapshot_path(cache_dir, host, remote_path),
            version: SNAPSHOT_VERSION.to_string(),
            host: host.to_string(),
            remote_path: remote_path.to_string(),
            state: SnapshotState::new(),
        }
    }

    /// Loads the snapshot for a (host, remote path) pair
    ///
    /// A missing file, or one written with another schema version, yields an
    /// empty snapshot so the next cycle performs a full sync.
    ///
    /// # Errors
    /// - [`SyncError::IoError`] if the file exists but cannot be read
    /// - [`SyncError::Snapshot`] if a current-version file cannot be decoded
    /// - [`SyncError::CorruptState`] if the decoded state violates its invariants
    pub fn load(cache_dir: &Path, host: &str, remote_path: &str) -> Result<Self, SyncError> {
        let fresh = Self::new(cache_dir, host, remote_path);

        let bytes = match fs::read(&fresh.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %fresh.path.display(), "No snapshot found, starting fresh");
                return Ok(fresh);
            }
            Err(e) => return Err(e.into()),
        };

        let probe: VersionProbe =
            serde_json::from_slice(&bytes).map_err(|source| SyncError::Snapshot {
                path: fresh.path.clone(),
                source,
            })?;
        if probe.version.as_deref() != Some(SNAPSHOT_VERSION) {
            info!(
                path = %fresh.path.display(),
                found = probe.version.as_deref().unwrap_or("none"),
                expected = SNAPSHOT_VERSION,
                "Snapshot schema changed, starting fresh"
            );
            return Ok(fresh);
        }

        let mut loaded: Snapshot =
            serde_json::from_slice(&bytes).map_err(|source| SyncError::Snapshot {
                path: fresh.path.clone(),
                source,
            })?;
        loaded.path = fresh.path.clone();

        if loaded.host != host || loaded.remote_path != remote_path {
            warn!(
                path = %fresh.path.display(),
                host = %loaded.host,
                remote_path = %loaded.remote_path,
                "Snapshot belongs to another target, starting fresh"
            );
            return Ok(fresh);
        }

        loaded.state.validate().map_err(|e| {
            SyncError::CorruptState(format!(
                "{} ({e}); run with --full to rebuild it",
                fresh.path.display()
            ))
        })?;

        debug!(path = %loaded.path.display(), files = loaded.state.len(), "Loaded snapshot");
        Ok(loaded)
    }

    /// Writes the snapshot, replacing any previous content
    ///
    /// # Errors
    /// Returns an error if the cache directory or file cannot be written.
    pub fn save(&self) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(self).map_err(|source| SyncError::Snapshot {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, bytes)?;

        debug!(path = %self.path.display(), files = self.state.len(), "Saved snapshot");
        Ok(())
    }

    /// Removes the backing file; a missing file is not an error
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be removed.
    pub fn destroy(&self) -> Result<(), SyncError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Removed snapshot");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Workspace host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Remote root
    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }

    /// The last committed state
    pub fn state(&self) -> &SnapshotState {
        &self.state
    }

    /// Replaces the committed state
    pub fn set_state(&mut self, state: SnapshotState) {
        self.state = state;
    }
}
