//! Lazily populated ignore-rule tree for one repository root
//!
//! Rule sources are keyed by directory prefix relative to the root (`"."` for
//! the root itself). The tree is filled in as prefixes are queried; nothing is
//! walked up front.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace};

use super::rules::{FileRules, IgnoreRules, StringRules};
use crate::SyncError;

/// Name of the per-directory ignore file
pub const IGNORE_FILE_NAME: &str = ".gitignore";

/// Version-control metadata directory, always ignored
pub const VCS_DIR_NAME: &str = ".git";

type RuleList = Vec<Arc<dyn IgnoreRules>>;

// ============================================================================
// Repository
// ============================================================================

/// Hierarchical ignore resolution rooted at a repository
///
/// The root prefix carries, in order: the machine-global excludes file (if
/// any), the repository-wide `.git/info/exclude`, an in-memory rule for the
/// `.git` directory, and the root `.gitignore`. Every other prefix carries
/// its own `.gitignore`. A path is ignored if any source at any ancestor
/// prefix matches the remainder of the path below that prefix.
pub struct Repository {
    root: PathBuf,
    global_excludes: Option<PathBuf>,
    rules: Mutex<HashMap<String, RuleList>>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("root", &self.root)
            .field("global_excludes", &self.global_excludes)
            .finish()
    }
}

impl Repository {
    /// Creates a repository rooted at `root`
    ///
    /// `global_excludes` is the machine-global excludes file; `None` disables it.
    pub fn new(root: impl Into<PathBuf>, global_excludes: Option<PathBuf>) -> Self {
        Self {
            root: root.into(),
            global_excludes,
            rules: Mutex::new(HashMap::new()),
        }
    }

    /// Finds the repository enclosing `path`
    ///
    /// Walks up from `path` looking for a `.git` entry. If none is found the
    /// path itself is treated as the root.
    pub fn discover(path: &Path, global_excludes: Option<PathBuf>) -> Self {
        let root = path
            .ancestors()
            .find(|dir| dir.join(VCS_DIR_NAME).exists())
            .unwrap_or(path)
            .to_path_buf();
        debug!(root = %root.display(), "Resolved repository root");
        Self::new(root, global_excludes)
    }

    /// The repository root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns true if `path` is ignored
    ///
    /// `path` is relative to the repository root. A trailing `/` makes this a
    /// directory query, so directory-only patterns apply.
    ///
    /// # Errors
    /// Propagates read failures of any rule source consulted.
    pub fn ignore(&self, path: &str) -> Result<bool, SyncError> {
        let is_dir = path.ends_with('/');
        let parts: Vec<&str> = path
            .split('/')
            .filter(|part| !part.is_empty() && *part != ".")
            .collect();
        if parts.is_empty() {
            return Ok(false);
        }

        for depth in 0..parts.len() {
            let prefix = if depth == 0 {
                ".".to_string()
            } else {
                parts[..depth].join("/")
            };
            let remainder = parts[depth..].join("/");

            for rules in self.rules_for(&prefix)? {
                if rules.matches(&remainder, is_dir)? {
                    trace!(path, prefix = %prefix, "Path ignored");
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    /// Marks every loaded rule source as possibly stale
    ///
    /// The next query against a tainted source stats its backing file and
    /// reloads it if it changed. The prefix tree itself is kept.
    pub fn taint_ignore_files(&self) {
        let rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
        for list in rules.values() {
            for source in list {
                source.taint();
            }
        }
    }

    fn rules_for(&self, prefix: &str) -> Result<RuleList, SyncError> {
        let mut rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = rules.get(prefix) {
            return Ok(list.clone());
        }

        let list = if prefix == "." {
            self.root_rules()?
        } else {
            let dir = self.root.join(prefix);
            vec![Arc::new(FileRules::new(dir.join(IGNORE_FILE_NAME))) as Arc<dyn IgnoreRules>]
        };
        trace!(prefix, sources = list.len(), "Created ignore rules for prefix");
        rules.insert(prefix.to_string(), list.clone());
        Ok(list)
    }

    fn root_rules(&self) -> Result<RuleList, SyncError> {
        let mut list: RuleList = Vec::new();
        if let Some(global) = &self.global_excludes {
            list.push(Arc::new(FileRules::with_base(global, &self.root)));
        }
        list.push(Arc::new(FileRules::with_base(
            self.root.join(VCS_DIR_NAME).join("info").join("exclude"),
            &self.root,
        )));
        list.push(Arc::new(StringRules::new(&self.root, &[VCS_DIR_NAME])?));
        list.push(Arc::new(FileRules::new(self.root.join(IGNORE_FILE_NAME))));
        Ok(list)
    }
}

// ============================================================================
// Global excludes file
// ============================================================================

/// Locates the machine-global excludes file
///
/// Reads `core.excludesFile` from `~/.gitconfig`; falls back to
/// `$XDG_CONFIG_HOME/git/ignore`. Returns `None` if neither location can be
/// determined. The file does not need to exist.
pub fn global_excludes_file() -> Option<PathBuf> {
    let home = dirs::home_dir();
    let from_config = home.as_ref().and_then(|home| {
        let contents = fs::read_to_string(home.join(".gitconfig")).ok()?;
        excludes_file_from_gitconfig(&contents, home)
    });

    from_config.or_else(|| dirs::config_dir().map(|dir| dir.join("git").join("ignore")))
}

/// Extracts `core.excludesFile` from gitconfig text, expanding a leading `~/`
fn excludes_file_from_gitconfig(contents: &str, home: &Path) -> Option<PathBuf> {
    let mut in_core = false;
    let mut found = None;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') {
            let section = line.trim_start_matches('[').trim_end_matches(']').trim();
            in_core = section.eq_ignore_ascii_case("core");
            continue;
        }
        if !in_core {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("excludesfile") {
            let value = value.trim().trim_matches('"');
            if value.is_empty() {
                continue;
            }
            found = Some(match value.strip_prefix("~/") {
                Some(rest) => home.join(rest),
                None => PathBuf::from(value),
            });
        }
    }

    found
}
