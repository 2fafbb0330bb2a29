//! Shared test helpers for workspace API integration tests
//!
//! Each helper mounts mock endpoints on a wiremock server. Clients returned
//! here never wait between retries.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wsync_remote::retry::RetryPolicy;
use wsync_remote::WorkspaceClient;

pub const TOKEN: &str = "test-access-token";
pub const USER: &str = "me@example.com";

/// Starts a mock server with `GET /preview/scim/v2/Me` mounted and returns a
/// client pointing at it
pub async fn setup_workspace_mock() -> (MockServer, WorkspaceClient) {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/preview/scim/v2/Me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "1234",
            "userName": USER,
            "displayName": "Me"
        })))
        .mount(&server)
        .await;

    let client = WorkspaceClient::with_base_url(&server.uri(), TOKEN)
        .unwrap()
        .with_retry_policy(RetryPolicy {
            max_retries: 2,
            default_delay: Duration::ZERO,
        });
    (server, client)
}

/// Workspace API error response
pub fn api_error(status: u16, code: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "error_code": code,
        "message": message
    }))
}

/// Import path for a workspace file
pub fn import_path(workspace_path: &str) -> String {
    format!("/api/2.0/workspace-files/import-file{workspace_path}")
}
