//! Integration tests for wsync-remote
//!
//! Uses wiremock to simulate the workspace REST API and verifies the
//! requests the WorkspaceClient sends and how it reads the responses.

mod common;

mod test_files;
mod test_status;
