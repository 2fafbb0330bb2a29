//! Recursive, ignore-aware listing of files under the sync root
//!
//! A [`FileSet`] produces a fresh, sorted list of [`File`] values on every
//! call. It never caches: the poller re-lists on every tick and the diff
//! engine compares the result against the previous snapshot.

use std::collections::BTreeMap;
use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::notebook;
use crate::SyncError;

// ============================================================================
// Ignorer capability
// ============================================================================

/// Decides whether a root-relative path is excluded from synchronization
///
/// Paths use forward slashes and never start with `./`. Both methods are
/// fallible: a rule source that exists but cannot be read must surface as
/// an error rather than as "not ignored".
pub trait Ignorer: Send + Sync {
    /// Returns true if the file at `path` is ignored
    fn ignore_file(&self, path: &str) -> Result<bool, SyncError>;

    /// Returns true if the directory at `path` (and everything below) is ignored
    fn ignore_directory(&self, path: &str) -> Result<bool, SyncError>;

    /// Invalidates cached rules so the next query re-checks their sources
    fn taint_rules(&self) {}
}

// ============================================================================
// File
// ============================================================================

/// A regular file found under the sync root
#[derive(Debug, Clone)]
pub struct File {
    absolute: PathBuf,
    relative: String,
    metadata: Option<Metadata>,
}

impl File {
    /// Creates a file entry; `metadata` is `None` when it could not be read
    pub fn new(absolute: PathBuf, relative: impl Into<String>, metadata: Option<Metadata>) -> Self {
        Self {
            absolute,
            relative: relative.into(),
            metadata,
        }
    }

    /// Absolute path on the local filesystem
    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    /// Path relative to the sync root, forward-slash separated
    pub fn relative(&self) -> &str {
        &self.relative
    }

    /// Last modification time, or the Unix epoch if it cannot be determined
    pub fn modified(&self) -> DateTime<Utc> {
        self.metadata
            .as_ref()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from)
            .unwrap_or_default()
    }

    /// Returns true if the file content starts with a notebook marker
    pub fn is_notebook(&self) -> bool {
        notebook::is_notebook(&self.absolute)
    }

    /// Identity of this file in the remote workspace, relative to the remote root
    pub fn remote_name(&self) -> String {
        notebook::remote_name(&self.relative, self.is_notebook())
    }
}

// ============================================================================
// FileSet
// ============================================================================

/// Lists files below a root directory, filtered through an [`Ignorer`]
#[derive(Clone)]
pub struct FileSet {
    root: PathBuf,
    ignorer: Arc<dyn Ignorer>,
}

impl std::fmt::Debug for FileSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSet").field("root", &self.root).finish()
    }
}

impl FileSet {
    /// Creates a file set rooted at `root`
    pub fn new(root: impl Into<PathBuf>, ignorer: Arc<dyn Ignorer>) -> Self {
        Self {
            root: root.into(),
            ignorer,
        }
    }

    /// The directory this file set lists
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists every non-ignored regular file below the root
    pub fn all(&self) -> Result<Vec<File>, SyncError> {
        self.files(&["."])
    }

    /// Lists every non-ignored regular file below each of `paths`
    ///
    /// Paths are relative to the root. Overlapping or repeated paths yield
    /// each file once. The result is sorted by relative path.
    ///
    /// # Errors
    /// - [`SyncError::OutsideRoot`] if a path is absolute or climbs above the root
    /// - [`SyncError::WalkError`] if a directory cannot be read
    /// - any error reported by the ignorer
    pub fn files<S: AsRef<str>>(&self, paths: &[S]) -> Result<Vec<File>, SyncError> {
        let mut found: BTreeMap<String, File> = BTreeMap::new();
        self.ignorer.taint_rules();

        for path in paths {
            let relative = normalize_relative(path.as_ref())?;
            self.collect(&relative, &mut found)?;
        }

        debug!(root = %self.root.display(), count = found.len(), "Listed local files");
        Ok(found.into_values().collect())
    }

    fn collect(&self, start: &str, found: &mut BTreeMap<String, File>) -> Result<(), SyncError> {
        let start_path = if start == "." {
            self.root.clone()
        } else {
            self.root.join(start)
        };

        let mut entries = WalkDir::new(&start_path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = entries.next() {
            let entry = entry?;
            let relative = self.relative_of(entry.path());
            let file_type = entry.file_type();

            if file_type.is_dir() {
                if relative != "." && self.ignorer.ignore_directory(&relative)? {
                    trace!(path = %relative, "Skipping ignored directory");
                    entries.skip_current_dir();
                }
                continue;
            }

            if !file_type.is_file() {
                trace!(path = %relative, "Skipping non-regular file");
                continue;
            }

            if found.contains_key(&relative) || self.ignorer.ignore_file(&relative)? {
                continue;
            }

            let metadata = entry.metadata().ok();
            found.insert(
                relative.clone(),
                File::new(entry.path().to_path_buf(), relative, metadata),
            );
        }

        Ok(())
    }

    fn relative_of(&self, path: &Path) -> String {
        let stripped = path.strip_prefix(&self.root).unwrap_or(path);
        let joined = stripped
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");
        if joined.is_empty() {
            ".".to_string()
        } else {
            joined
        }
    }
}

/// Lexically normalizes a root-relative path, rejecting escapes above the root
fn normalize_relative(path: &str) -> Result<String, SyncError> {
    if Path::new(path).is_absolute() {
        return Err(SyncError::OutsideRoot(path.to_string()));
    }

    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(SyncError::OutsideRoot(path.to_string()));
                }
            }
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        Ok(".".to_string())
    } else {
        Ok(parts.join("/"))
    }
}
