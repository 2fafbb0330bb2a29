//! Bijective local/remote name mapping with last-seen modification times
//!
//! ## Invariants
//!
//! 1. `last_modified_times` and `local_to_remote_names` have identical key sets
//! 2. `local_to_remote_names` and `remote_to_local_names` are exact inverses
//!
//! Both hold for every value this module hands out. Values read from disk are
//! checked with [`SnapshotState::validate`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fileset::File;
use crate::SyncError;

/// The last known mapping between local files and remote objects
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotState {
    /// Local path -> modification time when last synchronized
    #[serde(default)]
    last_modified_times: BTreeMap<String, DateTime<Utc>>,

    /// Local path -> remote name
    #[serde(default)]
    local_to_remote_names: BTreeMap<String, String>,

    /// Remote name -> local path
    #[serde(default)]
    remote_to_local_names: BTreeMap<String, String>,
}

impl SnapshotState {
    /// Creates an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the state describing `files` as they are now
    ///
    /// # Errors
    /// Returns [`SyncError::RemoteNameCollision`] naming both local paths if
    /// two files resolve to the same remote name.
    pub fn from_files(files: &[File]) -> Result<Self, SyncError> {
        let mut state = Self::new();

        for file in files {
            let local = file.relative().to_string();
            let remote = file.remote_name();

            if let Some(existing) = state.remote_to_local_names.get(&remote) {
                if *existing != local {
                    return Err(SyncError::RemoteNameCollision {
                        first: existing.clone(),
                        second: local,
                        remote,
                    });
                }
            }

            state.last_modified_times.insert(local.clone(), file.modified());
            state.local_to_remote_names.insert(local.clone(), remote.clone());
            state.remote_to_local_names.insert(remote, local);
        }

        Ok(state)
    }

    /// Checks both invariants
    ///
    /// # Errors
    /// Returns [`SyncError::CorruptState`] describing the first violation found.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.last_modified_times.len() != self.local_to_remote_names.len()
            || self
                .last_modified_times
                .keys()
                .zip(self.local_to_remote_names.keys())
                .any(|(a, b)| a != b)
        {
            return Err(SyncError::CorruptState(
                "modification times and remote names cover different files".to_string(),
            ));
        }

        if self.local_to_remote_names.len() != self.remote_to_local_names.len() {
            return Err(SyncError::CorruptState(
                "local and remote name maps differ in size".to_string(),
            ));
        }

        for (local, remote) in &self.local_to_remote_names {
            match self.remote_to_local_names.get(remote) {
                Some(back) if back == local => {}
                Some(back) => {
                    return Err(SyncError::CorruptState(format!(
                        "remote name {remote} maps back to {back}, expected {local}"
                    )))
                }
                None => {
                    return Err(SyncError::CorruptState(format!(
                        "remote name {remote} for {local} has no reverse entry"
                    )))
                }
            }
        }

        Ok(())
    }

    /// Modification time recorded for a local path
    pub fn last_modified(&self, local: &str) -> Option<DateTime<Utc>> {
        self.last_modified_times.get(local).copied()
    }

    /// Remote name recorded for a local path
    pub fn remote_name(&self, local: &str) -> Option<&str> {
        self.local_to_remote_names.get(local).map(String::as_str)
    }

    /// Local path recorded for a remote name
    pub fn local_name(&self, remote: &str) -> Option<&str> {
        self.remote_to_local_names.get(remote).map(String::as_str)
    }

    /// Iterates over `(local, remote)` pairs in local path order
    pub fn names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.local_to_remote_names
            .iter()
            .map(|(local, remote)| (local.as_str(), remote.as_str()))
    }

    /// Iterates over `(local, modified)` pairs in local path order
    pub fn modification_times(&self) -> impl Iterator<Item = (&str, DateTime<Utc>)> {
        self.last_modified_times
            .iter()
            .map(|(local, modified)| (local.as_str(), *modified))
    }

    /// Number of tracked files
    pub fn len(&self) -> usize {
        self.local_to_remote_names.len()
    }

    /// Returns true if no files are tracked
    pub fn is_empty(&self) -> bool {
        self.local_to_remote_names.is_empty()
    }
}
