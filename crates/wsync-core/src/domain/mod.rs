//! Domain types and validation
//!
//! - Newtypes for validated remote paths and workspace hosts
//! - Domain-specific error types

pub mod errors;
pub mod newtypes;

pub use errors::DomainError;
pub use newtypes::{RemotePath, WorkspaceHost};
