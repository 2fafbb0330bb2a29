//! Integration tests for wsync-sync
//!
//! Drives whole sync sessions through [`wsync_sync::SyncEngine`] against an
//! in-memory workspace and checks what ends up on the remote side.

mod common;

mod test_ignore_rules;
mod test_sessions;
mod test_sync_flow;
