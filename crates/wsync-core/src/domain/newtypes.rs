//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for remote locations.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use super::errors::DomainError;

// ============================================================================
// Remote paths
// ============================================================================

/// An absolute path in the remote workspace (must start with /)
///
/// Represents paths such as `/Users/me@example.com/project/src/main.py`.
/// Never carries a trailing slash except for the root itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemotePath(String);

impl RemotePath {
    /// Create a new RemotePath
    ///
    /// # Errors
    /// Returns error if path doesn't start with /, contains empty segments
    /// or traversal components
    pub fn new(path: String) -> Result<Self, DomainError> {
        if !path.starts_with('/') {
            return Err(DomainError::InvalidRemotePath(format!(
                "Remote path must start with '/': {path}"
            )));
        }

        let trimmed = if path.len() > 1 {
            path.trim_end_matches('/').to_string()
        } else {
            path
        };

        // Validate no double slashes (except root)
        if trimmed.len() > 1 && trimmed.contains("//") {
            return Err(DomainError::InvalidRemotePath(format!(
                "Remote path contains invalid double slashes: {trimmed}"
            )));
        }

        // Validate no path traversal
        if trimmed.split('/').any(|segment| segment == ".." || segment == ".") {
            return Err(DomainError::InvalidRemotePath(format!(
                "Remote path contains invalid traversal: {trimmed}"
            )));
        }

        Ok(Self(if trimmed.is_empty() { "/".to_string() } else { trimmed }))
    }

    /// Create the root path "/"
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join a forward-slash separated relative path
    ///
    /// `"."` and the empty string resolve to `self`.
    ///
    /// # Errors
    /// Returns error if the relative path is absolute or contains traversal
    pub fn join(&self, relative: &str) -> Result<Self, DomainError> {
        if relative.is_empty() || relative == "." {
            return Ok(self.clone());
        }
        if relative.starts_with('/') {
            return Err(DomainError::InvalidRemotePath(format!(
                "Cannot join absolute path: {relative}"
            )));
        }

        let new_path = if self.0 == "/" {
            format!("/{relative}")
        } else {
            format!("{}/{relative}", self.0)
        };

        Self::new(new_path)
    }

    /// Get the parent path
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0 == "/" {
            return None;
        }

        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Get the file name component
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        if self.0 == "/" {
            return None;
        }

        self.0.rsplit('/').next()
    }

    /// Returns true if `self` equals `ancestor` or lives below it
    #[must_use]
    pub fn starts_with(&self, ancestor: &RemotePath) -> bool {
        if ancestor.0 == "/" {
            return true;
        }
        self.0 == ancestor.0
            || (self.0.starts_with(&ancestor.0)
                && self.0.as_bytes().get(ancestor.0.len()) == Some(&b'/'))
    }
}

impl Display for RemotePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemotePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RemotePath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemotePath> for String {
    fn from(path: RemotePath) -> Self {
        path.0
    }
}

// ============================================================================
// Workspace host
// ============================================================================

/// A normalized workspace base URL (`scheme://host[:port]`, no trailing slash)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkspaceHost(String);

impl WorkspaceHost {
    /// Parse and normalize a workspace host
    ///
    /// A bare hostname is accepted and assumed to be `https`.
    ///
    /// # Errors
    /// Returns error if the value is not an http(s) URL with a host
    pub fn new(raw: &str) -> Result<Self, DomainError> {
        let raw = raw.trim();
        let candidate = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("https://{raw}")
        };

        let url = Url::parse(&candidate)
            .map_err(|e| DomainError::InvalidHost(format!("{raw}: {e}")))?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(DomainError::InvalidHost(format!(
                "{raw}: scheme must be http or https"
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| DomainError::InvalidHost(format!("{raw}: missing host")))?;

        let normalized = match url.port() {
            Some(port) => format!("{}://{host}:{port}", url.scheme()),
            None => format!("{}://{host}", url.scheme()),
        };
        Ok(Self(normalized))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for WorkspaceHost {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for WorkspaceHost {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<WorkspaceHost> for String {
    fn from(host: WorkspaceHost) -> Self {
        host.0
    }
}
