//! Ignore resolution for a directory that may sit below the repository root

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use super::repository::Repository;
use super::PatternIgnorer;
use crate::fileset::Ignorer;
use crate::SyncError;

/// Directory holding the tool's own local state, always ignored at the view root
pub const STATE_DIR_NAME: &str = ".wsync";

/// File-backed [`Ignorer`] anchored at the sync root
///
/// Paths handed to a view are relative to the view. They are translated to
/// repository-relative form before resolution, so rules from the repository
/// root and every directory in between still apply.
pub struct View {
    repo: Arc<Repository>,
    target: String,
    local: PatternIgnorer,
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("repo", &self.repo)
            .field("target", &self.target)
            .finish()
    }
}

impl View {
    /// Creates a view for `path`, discovering the enclosing repository
    ///
    /// `extra_patterns` are applied in memory at the view root in addition to
    /// the built-in rule for the state directory.
    ///
    /// # Errors
    /// Returns an error if `path` cannot be canonicalized or an extra pattern
    /// is invalid.
    pub fn new<S: AsRef<str>>(
        path: &Path,
        global_excludes: Option<PathBuf>,
        extra_patterns: &[S],
    ) -> Result<Self, SyncError> {
        let path = path.canonicalize()?;
        let repo = Arc::new(Repository::discover(&path, global_excludes));
        Self::with_repository(repo, &path, extra_patterns)
    }

    /// Creates a view for `path` inside an existing repository
    ///
    /// # Errors
    /// Returns [`SyncError::OutsideRoot`] if `path` is not inside the repository.
    pub fn with_repository<S: AsRef<str>>(
        repo: Arc<Repository>,
        path: &Path,
        extra_patterns: &[S],
    ) -> Result<Self, SyncError> {
        let relative = path
            .strip_prefix(repo.root())
            .map_err(|_| SyncError::OutsideRoot(path.display().to_string()))?;
        let target = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");

        let mut patterns = vec![STATE_DIR_NAME.to_string()];
        patterns.extend(extra_patterns.iter().map(|p| p.as_ref().to_string()));
        let local = PatternIgnorer::new(&patterns)?;

        Ok(Self {
            repo,
            target,
            local,
        })
    }

    /// The repository this view resolves against
    pub fn repository(&self) -> &Arc<Repository> {
        &self.repo
    }

    fn repo_path(&self, path: &str) -> String {
        if self.target.is_empty() {
            path.to_string()
        } else {
            format!("{}/{path}", self.target)
        }
    }

    fn ignore(&self, path: &str, is_dir: bool) -> Result<bool, SyncError> {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() || trimmed == "." {
            return Ok(false);
        }
        if self.local.ignore(trimmed, is_dir)? {
            return Ok(true);
        }

        let mut query = self.repo_path(trimmed);
        if is_dir {
            query.push('/');
        }
        self.repo.ignore(&query)
    }
}

impl Ignorer for View {
    fn ignore_file(&self, path: &str) -> Result<bool, SyncError> {
        self.ignore(path, false)
    }

    fn ignore_directory(&self, path: &str) -> Result<bool, SyncError> {
        self.ignore(path, true)
    }

    fn taint_rules(&self) {
        self.repo.taint_ignore_files();
    }
}
