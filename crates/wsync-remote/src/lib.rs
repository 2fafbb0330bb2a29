//! wsync Remote - workspace REST API adapter
//!
//! Implements the [`IWorkspaceFiles`](wsync_core::ports::IWorkspaceFiles)
//! port over HTTP with bearer-token authentication.
//!
//! ## Modules
//!
//! - [`client`] - The [`WorkspaceClient`](client::WorkspaceClient) HTTP client
//! - [`error`] - Mapping of API error responses onto
//!   [`RemoteError`](wsync_core::ports::RemoteError)
//! - [`retry`] - Back-off on throttled responses

pub mod client;
pub mod error;
pub mod retry;

pub use client::WorkspaceClient;
