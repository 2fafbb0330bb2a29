//! Port definitions (hexagonal architecture interfaces)
//!
//! ## Ports Overview
//!
//! - [`IWorkspaceFiles`] - Remote workspace file operations (upload, delete,
//!   mkdirs, status, principal)

pub mod workspace_files;

pub use workspace_files::{IWorkspaceFiles, ObjectInfo, ObjectType, Principal, RemoteError};
