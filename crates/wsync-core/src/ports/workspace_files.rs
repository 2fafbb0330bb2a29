//! Remote workspace files port (driven/secondary port)
//!
//! This module defines the interface the sync engine uses to mutate the
//! remote workspace. The primary implementation is the REST client in
//! `wsync-remote`; tests substitute in-memory fakes.
//!
//! ## Design Notes
//!
//! - Errors are a typed [`RemoteError`] rather than `anyhow::Error` because
//!   callers must tell "object is missing" apart from real failures to keep
//!   deletes idempotent.
//! - Uses `#[async_trait]` for async trait methods.
//! - Paths are absolute workspace paths (`/Users/...`).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::newtypes::RemotePath;

// ============================================================================
// RemoteError
// ============================================================================

/// Errors returned by remote workspace operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The object at the given path does not exist
    #[error("Remote object not found: {0}")]
    NotFound(String),

    /// An object already exists at the given path
    #[error("Remote object already exists: {0}")]
    AlreadyExists(String),

    /// A non-recursive directory delete hit a directory with children
    #[error("Remote directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Credentials were rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Any other API-level failure
    #[error("Remote API error ({status} {code}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Provider error code, e.g. `INVALID_PARAMETER_VALUE`
        code: String,
        /// Provider error message
        message: String,
    },

    /// Network or protocol failure before a response was received
    #[error("Transport error: {0}")]
    Transport(String),
}

impl RemoteError {
    /// Returns true if this error means the object is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }
}

// ============================================================================
// ObjectInfo / Principal
// ============================================================================

/// Kind of object stored in the workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectType {
    Directory,
    File,
    Notebook,
    Repo,
    Library,
}

impl ObjectType {
    /// Returns true if files can be synchronized into this object
    pub fn is_container(&self) -> bool {
        matches!(self, ObjectType::Directory | ObjectType::Repo)
    }
}

/// Status of a single workspace object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Absolute workspace path of the object
    pub path: String,
    /// Object kind
    pub object_type: ObjectType,
}

/// Identity of the authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// User name, typically an email address
    pub user_name: String,
}

impl Principal {
    /// Home directory of this principal in the workspace
    pub fn home(&self) -> Result<RemotePath, crate::domain::DomainError> {
        RemotePath::new(format!("/Users/{}", self.user_name))
    }
}

// ============================================================================
// IWorkspaceFiles trait
// ============================================================================

/// Port trait for remote workspace file operations
///
/// ## Implementation Notes
///
/// - `upload` with `overwrite = false` must fail with
///   [`RemoteError::AlreadyExists`] when the target exists. With
///   `overwrite = true`, type clashes (a notebook where a file should go) are
///   resolved by the implementation.
/// - `delete` of a missing object must report [`RemoteError::NotFound`];
///   swallowing it is the caller's decision.
#[async_trait::async_trait]
pub trait IWorkspaceFiles: Send + Sync {
    /// Writes `content` to the file at `path`
    async fn upload(&self, path: &str, content: Vec<u8>, overwrite: bool)
        -> Result<(), RemoteError>;

    /// Deletes the object at `path`
    async fn delete(&self, path: &str, recursive: bool) -> Result<(), RemoteError>;

    /// Creates the directory at `path` including missing parents
    async fn mkdirs(&self, path: &str) -> Result<(), RemoteError>;

    /// Returns the status of the object at `path`
    async fn get_status(&self, path: &str) -> Result<ObjectInfo, RemoteError>;

    /// Returns the identity of the authenticated caller
    async fn current_principal(&self) -> Result<Principal, RemoteError>;
}
