//! Change set computation
//!
//! [`diff`] compares the previous [`SnapshotState`] against a fresh listing
//! and yields the remote operations needed to converge. Directory operations
//! are grouped into waves that must be applied with a barrier between them.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::fileset::File;
use crate::state::SnapshotState;
use crate::SyncError;

/// Remote operations that bring the remote tree in line with the local one
///
/// - `put`: local paths to upload
/// - `delete`: remote names to remove
/// - `mkdir` / `rmdir`: directories (root-relative) to create or remove
///
/// Each list is sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    pub put: Vec<String>,
    pub delete: Vec<String>,
    pub mkdir: Vec<String>,
    pub rmdir: Vec<String>,
    pub(crate) remote_names: BTreeMap<String, String>,
}

impl Diff {
    /// Returns true if there is nothing to do
    pub fn is_empty(&self) -> bool {
        self.put.is_empty() && self.delete.is_empty() && self.mkdir.is_empty() && self.rmdir.is_empty()
    }

    /// Adds an upload of `local` under the remote name `remote`
    pub fn add_put(&mut self, local: impl Into<String>, remote: impl Into<String>) {
        let local = local.into();
        self.remote_names.insert(local.clone(), remote.into());
        if let Err(idx) = self.put.binary_search(&local) {
            self.put.insert(idx, local);
        }
    }

    /// Remote name a put of `local` uploads to
    ///
    /// Falls back to the local path for paths not added through this diff.
    pub fn remote_name<'a>(&'a self, local: &'a str) -> &'a str {
        self.remote_names
            .get(local)
            .map(String::as_str)
            .unwrap_or(local)
    }

    /// Directory creations grouped into waves, shallowest first
    ///
    /// Only leaf directories are listed; creating one creates its parents.
    /// Directories in the same wave are independent of each other.
    pub fn grouped_mkdir(&self) -> Vec<Vec<String>> {
        let ancestors: BTreeSet<&str> = self
            .mkdir
            .iter()
            .flat_map(|dir| parent_dirs(dir))
            .collect();

        let mut by_depth: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for dir in &self.mkdir {
            if !ancestors.contains(dir.as_str()) {
                by_depth.entry(depth(dir)).or_default().push(dir.clone());
            }
        }
        by_depth.into_values().collect()
    }

    /// Directory removals grouped into waves, children before parents
    ///
    /// Each wave holds the directories that are not an ancestor of any other
    /// directory still pending removal.
    pub fn grouped_rmdir(&self) -> Vec<Vec<String>> {
        let mut waves = Vec::new();
        let mut remaining: Vec<&str> = self.rmdir.iter().map(String::as_str).collect();

        while !remaining.is_empty() {
            let ancestors: BTreeSet<&str> = remaining
                .iter()
                .flat_map(|dir| parent_dirs(*dir))
                .collect();
            let (next, wave): (Vec<&str>, Vec<&str>) = remaining
                .into_iter()
                .partition(|dir| ancestors.contains(dir));

            waves.push(wave.into_iter().map(str::to_string).collect());
            remaining = next;
        }

        waves
    }
}

/// Number of path segments in `path`
fn depth(path: &str) -> usize {
    path.split('/').count()
}

/// Every proper ancestor directory of `path`, nearest last
///
/// `"a/b/c"` yields `"a"` and `"a/b"`.
fn parent_dirs(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/').map(move |(idx, _)| &path[..idx])
}

/// All directories implied by a set of file paths
fn implied_dirs<'a>(paths: impl Iterator<Item = &'a str>) -> BTreeSet<String> {
    paths
        .flat_map(parent_dirs)
        .map(str::to_string)
        .collect()
}

/// Computes the operations that take the remote from `previous` to `files`
///
/// On success `previous` is replaced by the state describing `files`. The
/// caller persists it only once the returned diff has been applied.
///
/// # Errors
/// Returns [`SyncError::RemoteNameCollision`] if two files share a remote
/// name. `previous` is left untouched in that case.
pub fn diff(previous: &mut SnapshotState, files: &[File]) -> Result<Diff, SyncError> {
    let current = SnapshotState::from_files(files)?;

    let mut put: BTreeSet<String> = BTreeSet::new();
    let mut delete: BTreeSet<String> = BTreeSet::new();

    // New or strictly newer files
    for (local, modified) in current.modification_times() {
        match previous.last_modified(local) {
            Some(seen) if modified <= seen => {}
            _ => {
                put.insert(local.to_string());
            }
        }
    }

    // Renamed remotely (notebook flip) or removed locally
    for (local, old_remote) in previous.names() {
        match current.remote_name(local) {
            Some(new_remote) if new_remote == old_remote => {}
            Some(_) => {
                delete.insert(old_remote.to_string());
                put.insert(local.to_string());
            }
            None => {
                delete.insert(old_remote.to_string());
            }
        }
    }

    let current_dirs = implied_dirs(current.names().map(|(local, _)| local));
    let previous_dirs = implied_dirs(previous.names().map(|(local, _)| local));

    let mut result = Diff {
        delete: delete.into_iter().collect(),
        mkdir: current_dirs.difference(&previous_dirs).cloned().collect(),
        rmdir: previous_dirs.difference(&current_dirs).cloned().collect(),
        ..Diff::default()
    };
    for local in put {
        let remote = current.remote_name(&local).unwrap_or(local.as_str()).to_string();
        result.remote_names.insert(local.clone(), remote);
        result.put.push(local);
    }

    debug!(
        put = result.put.len(),
        delete = result.delete.len(),
        mkdir = result.mkdir.len(),
        rmdir = result.rmdir.len(),
        "Computed diff"
    );

    *previous = current;
    Ok(result)
}
