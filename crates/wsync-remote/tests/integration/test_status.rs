//! Status lookups, principal resolution and error classification

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use wsync_core::ports::{IWorkspaceFiles, ObjectType, RemoteError};
use wsync_remote::WorkspaceClient;

use crate::common::{self, USER};

#[tokio::test]
async fn test_get_status_of_directory() {
    let (server, client) = common::setup_workspace_mock().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/workspace/get-status"))
        .and(query_param("path", "/Users/me@example.com/project"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object_type": "DIRECTORY",
            "path": "/Users/me@example.com/project",
            "object_id": 123456
        })))
        .mount(&server)
        .await;

    let info = client
        .get_status("/Users/me@example.com/project")
        .await
        .expect("get-status failed");
    assert_eq!(info.path, "/Users/me@example.com/project");
    assert_eq!(info.object_type, ObjectType::Directory);
}

#[tokio::test]
async fn test_get_status_of_notebook() {
    let (server, client) = common::setup_workspace_mock().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/workspace/get-status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object_type": "NOTEBOOK",
            "path": "/Users/me@example.com/nb",
            "language": "PYTHON"
        })))
        .mount(&server)
        .await;

    let info = client.get_status("/Users/me@example.com/nb").await.unwrap();
    assert_eq!(info.object_type, ObjectType::Notebook);
    assert!(!info.object_type.is_container());
}

#[tokio::test]
async fn test_get_status_missing() {
    let (server, client) = common::setup_workspace_mock().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/workspace/get-status"))
        .respond_with(common::api_error(
            404,
            "RESOURCE_DOES_NOT_EXIST",
            "Path (/nope) doesn't exist.",
        ))
        .mount(&server)
        .await;

    let err = client.get_status("/nope").await.unwrap_err();
    assert_eq!(err, RemoteError::NotFound("/nope".to_string()));
}

#[tokio::test]
async fn test_current_principal() {
    let (_server, client) = common::setup_workspace_mock().await;

    let me = client.current_principal().await.expect("scim Me failed");
    assert_eq!(me.user_name, USER);
    assert_eq!(me.home().unwrap().as_str(), "/Users/me@example.com");
}

#[tokio::test]
async fn test_rejected_token_is_unauthorized() {
    let (server, client) = common::setup_workspace_mock().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/workspace/get-status"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid access token"))
        .mount(&server)
        .await;

    let err = client.get_status("/x").await.unwrap_err();
    assert_eq!(err, RemoteError::Unauthorized("Invalid access token".to_string()));
}

#[tokio::test]
async fn test_malformed_response_is_transport_error() {
    let (server, client) = common::setup_workspace_mock().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/workspace/get-status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;

    assert!(matches!(
        client.get_status("/x").await,
        Err(RemoteError::Transport(_))
    ));
}

#[tokio::test]
async fn test_unreachable_host_is_transport_error() {
    let client = WorkspaceClient::with_base_url("http://127.0.0.1:1", "t").unwrap();

    assert!(matches!(
        client.mkdirs("/Users/me").await,
        Err(RemoteError::Transport(_))
    ));
}
