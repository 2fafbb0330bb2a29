//! Ignore resolution
//!
//! Two [`Ignorer`](crate::fileset::Ignorer) implementations are provided:
//!
//! - [`View`] - file-backed, hierarchical `.gitignore` resolution with lazy
//!   loading and taint-to-invalidate
//! - [`PatternIgnorer`] - a fixed in-memory pattern list, also used by
//!   [`View`] for its extra patterns and the state directory

mod repository;
mod rules;
mod view;

use std::path::Path;

pub use repository::{global_excludes_file, Repository, IGNORE_FILE_NAME, VCS_DIR_NAME};
pub use view::{View, STATE_DIR_NAME};

use crate::fileset::Ignorer;
use crate::SyncError;
use rules::{IgnoreRules, StringRules};

/// [`Ignorer`] backed by an in-memory list of gitignore-style patterns
///
/// Paths are matched as given, relative to wherever the patterns apply.
pub struct PatternIgnorer {
    rules: StringRules,
}

impl PatternIgnorer {
    /// Compiles `patterns`
    ///
    /// # Errors
    /// Returns [`SyncError::InvalidPattern`] if a pattern is not a valid glob
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, SyncError> {
        Ok(Self {
            rules: StringRules::new(Path::new("."), patterns)?,
        })
    }

    fn ignore(&self, path: &str, is_dir: bool) -> Result<bool, SyncError> {
        let path = path.trim_end_matches('/');
        if path.is_empty() || path == "." {
            return Ok(false);
        }
        self.rules.matches(path, is_dir)
    }
}

impl Ignorer for PatternIgnorer {
    fn ignore_file(&self, path: &str) -> Result<bool, SyncError> {
        self.ignore(path, false)
    }

    fn ignore_directory(&self, path: &str) -> Result<bool, SyncError> {
        self.ignore(path, true)
    }
}
