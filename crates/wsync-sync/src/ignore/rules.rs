//! Individual ignore rule sources
//!
//! A rule source answers "does this pattern list ignore `path`" where `path`
//! is relative to the directory that owns the source. Two kinds exist:
//! [`FileRules`], backed by a pattern file that is re-read when it changes,
//! and [`StringRules`], a fixed in-memory pattern list.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{debug, trace};

use crate::SyncError;

/// A single ordered source of ignore patterns
pub(crate) trait IgnoreRules: Send + Sync {
    /// Returns true if `path` (or one of its parents) matches an ignore pattern
    ///
    /// `path` is relative to the directory owning this source and must not be
    /// empty.
    fn matches(&self, path: &str, is_dir: bool) -> Result<bool, SyncError>;

    /// Marks the source as possibly stale so the next query re-checks it
    fn taint(&self) {}
}

fn is_ignored(matcher: &Gitignore, path: &str, is_dir: bool) -> bool {
    matcher.matched_path_or_any_parents(path, is_dir).is_ignore()
}

// ============================================================================
// StringRules
// ============================================================================

/// Ignore patterns held in memory
pub(crate) struct StringRules {
    matcher: Gitignore,
}

impl StringRules {
    /// Compiles `patterns` relative to `base`
    ///
    /// # Errors
    /// Returns [`SyncError::InvalidPattern`] if a pattern is not a valid glob
    pub(crate) fn new<S: AsRef<str>>(base: &Path, patterns: &[S]) -> Result<Self, SyncError> {
        let mut builder = GitignoreBuilder::new(base);
        for pattern in patterns {
            let pattern = pattern.as_ref();
            builder
                .add_line(None, pattern)
                .map_err(|e| SyncError::InvalidPattern {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })?;
        }

        let matcher = builder.build().map_err(|e| SyncError::InvalidPattern {
            pattern: patterns
                .iter()
                .map(|p| p.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
            message: e.to_string(),
        })?;

        Ok(Self { matcher })
    }
}

impl IgnoreRules for StringRules {
    fn matches(&self, path: &str, is_dir: bool) -> Result<bool, SyncError> {
        Ok(is_ignored(&self.matcher, path, is_dir))
    }
}

// ============================================================================
// FileRules
// ============================================================================

/// What we last saw of the backing file
#[derive(Debug, Clone, PartialEq, Eq)]
struct Stamp {
    modified: Option<SystemTime>,
    len: u64,
}

struct FileState {
    tainted: bool,
    stamp: Option<Stamp>,
    matcher: Option<Gitignore>,
}

/// Ignore patterns read from a file on disk
///
/// The file is loaded on first use. After [`IgnoreRules::taint`] the next
/// query stats the file and reloads it only if its size or modification time
/// changed. A missing file matches nothing; any other read failure is an error.
pub(crate) struct FileRules {
    path: PathBuf,
    base: PathBuf,
    state: Mutex<FileState>,
}

impl FileRules {
    /// Creates a rule source for the pattern file at `path`
    ///
    /// Patterns are interpreted relative to the file's parent directory.
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::with_base(path, base)
    }

    /// Creates a rule source whose patterns are relative to `base`
    pub(crate) fn with_base(path: impl Into<PathBuf>, base: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            base: base.into(),
            state: Mutex::new(FileState {
                tainted: true,
                stamp: None,
                matcher: None,
            }),
        }
    }

    fn error(&self, source: io::Error) -> SyncError {
        SyncError::IgnoreRules {
            path: self.path.clone(),
            source,
        }
    }

    fn refresh(&self, state: &mut FileState) -> Result<(), SyncError> {
        let metadata = match fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if state.stamp.is_some() {
                    debug!(path = %self.path.display(), "Ignore file removed");
                }
                state.stamp = None;
                state.matcher = None;
                return Ok(());
            }
            Err(e) => return Err(self.error(e)),
        };

        let stamp = Stamp {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        };
        if state.stamp.as_ref() == Some(&stamp) {
            trace!(path = %self.path.display(), "Ignore file unchanged");
            return Ok(());
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| self.error(e))?;
        let mut builder = GitignoreBuilder::new(&self.base);
        for line in contents.lines() {
            builder
                .add_line(Some(self.path.clone()), line)
                .map_err(|e| self.error(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        }
        let matcher = builder
            .build()
            .map_err(|e| self.error(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        debug!(
            path = %self.path.display(),
            patterns = matcher.num_ignores() + matcher.num_whitelists(),
            "Loaded ignore file"
        );
        state.stamp = Some(stamp);
        state.matcher = Some(matcher);
        Ok(())
    }
}

impl IgnoreRules for FileRules {
    fn matches(&self, path: &str, is_dir: bool) -> Result<bool, SyncError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.tainted {
            self.refresh(&mut state)?;
            state.tainted = false;
        }

        Ok(state
            .matcher
            .as_ref()
            .is_some_and(|matcher| is_ignored(matcher, path, is_dir)))
    }

    fn taint(&self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tainted = true;
    }
}
