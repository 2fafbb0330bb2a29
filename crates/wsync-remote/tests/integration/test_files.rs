//! Upload, delete and mkdirs against a mocked workspace API

use serde_json::json;
use wiremock::matchers::{body_bytes, body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use wsync_core::ports::{IWorkspaceFiles, RemoteError};

use crate::common::{self, TOKEN};

const FILE: &str = "/Users/me@example.com/project/src/main.py";
const PARENT: &str = "/Users/me@example.com/project/src";

// ============================================================================
// Upload
// ============================================================================

#[tokio::test]
async fn test_upload_sends_raw_body_with_auth() {
    let (server, client) = common::setup_workspace_mock().await;

    Mock::given(method("POST"))
        .and(path(common::import_path(FILE)))
        .and(query_param("overwrite", "true"))
        .and(header("Authorization", format!("Bearer {TOKEN}").as_str()))
        .and(body_bytes(b"print(1)\n".to_vec()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client
        .upload(FILE, b"print(1)\n".to_vec(), true)
        .await
        .expect("upload failed");
}

#[tokio::test]
async fn test_upload_path_is_percent_encoded() {
    let (server, client) = common::setup_workspace_mock().await;

    Mock::given(method("POST"))
        .and(path(
            "/api/2.0/workspace-files/import-file/Users/me@example.com/my%20notes.md",
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client
        .upload("/Users/me@example.com/my notes.md", b"x".to_vec(), false)
        .await
        .expect("upload failed");
}

#[tokio::test]
async fn test_upload_creates_missing_parent_and_retries() {
    let (server, client) = common::setup_workspace_mock().await;

    Mock::given(method("POST"))
        .and(path(common::import_path(FILE)))
        .respond_with(common::api_error(
            404,
            "RESOURCE_DOES_NOT_EXIST",
            "The parent folder does not exist.",
        ))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(common::import_path(FILE)))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/2.0/workspace/mkdirs"))
        .and(body_json(json!({ "path": PARENT })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client
        .upload(FILE, b"x".to_vec(), true)
        .await
        .expect("upload failed");

    let paths: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(
        paths,
        vec![
            common::import_path(FILE),
            "/api/2.0/workspace/mkdirs".to_string(),
            common::import_path(FILE),
        ]
    );
}

#[tokio::test]
async fn test_upload_replaces_object_of_other_type() {
    let (server, client) = common::setup_workspace_mock().await;

    Mock::given(method("POST"))
        .and(path(common::import_path(FILE)))
        .respond_with(common::api_error(
            409,
            "RESOURCE_ALREADY_EXISTS",
            "A notebook with this name exists",
        ))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(common::import_path(FILE)))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/2.0/workspace/delete"))
        .and(body_json(json!({ "path": FILE, "recursive": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client
        .upload(FILE, b"x".to_vec(), true)
        .await
        .expect("upload failed");
}

#[tokio::test]
async fn test_upload_without_overwrite_reports_existing() {
    let (server, client) = common::setup_workspace_mock().await;

    Mock::given(method("POST"))
        .and(path(common::import_path(FILE)))
        .and(query_param("overwrite", "false"))
        .respond_with(common::api_error(409, "RESOURCE_ALREADY_EXISTS", "exists"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/2.0/workspace/delete"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client.upload(FILE, b"x".to_vec(), false).await.unwrap_err();
    assert_eq!(err, RemoteError::AlreadyExists(FILE.to_string()));
}

#[tokio::test]
async fn test_upload_gives_up_after_one_recovery() {
    let (server, client) = common::setup_workspace_mock().await;

    Mock::given(method("POST"))
        .and(path(common::import_path(FILE)))
        .respond_with(common::api_error(404, "RESOURCE_DOES_NOT_EXIST", "missing"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/2.0/workspace/mkdirs"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let err = client.upload(FILE, b"x".to_vec(), true).await.unwrap_err();
    assert!(err.is_not_found());
}

// ============================================================================
// Delete / mkdirs
// ============================================================================

#[tokio::test]
async fn test_delete_sends_json_request() {
    let (server, client) = common::setup_workspace_mock().await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/workspace/delete"))
        .and(body_json(json!({ "path": PARENT, "recursive": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client.delete(PARENT, true).await.expect("delete failed");
}

#[tokio::test]
async fn test_delete_missing_is_not_found() {
    let (server, client) = common::setup_workspace_mock().await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/workspace/delete"))
        .respond_with(common::api_error(
            400,
            "RESOURCE_DOES_NOT_EXIST",
            "Path (/x) doesn't exist.",
        ))
        .mount(&server)
        .await;

    let err = client.delete(FILE, false).await.unwrap_err();
    assert_eq!(err, RemoteError::NotFound(FILE.to_string()));
}

#[tokio::test]
async fn test_delete_populated_directory() {
    let (server, client) = common::setup_workspace_mock().await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/workspace/delete"))
        .respond_with(common::api_error(
            400,
            "DIRECTORY_NOT_EMPTY",
            "Folder (/x) is not empty",
        ))
        .mount(&server)
        .await;

    let err = client.delete(PARENT, false).await.unwrap_err();
    assert_eq!(err, RemoteError::DirectoryNotEmpty(PARENT.to_string()));
}

#[tokio::test]
async fn test_mkdirs_sends_json_request() {
    let (server, client) = common::setup_workspace_mock().await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/workspace/mkdirs"))
        .and(body_json(json!({ "path": PARENT })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client.mkdirs(PARENT).await.expect("mkdirs failed");
}

// ============================================================================
// Throttling
// ============================================================================

#[tokio::test]
async fn test_throttled_request_is_retried() {
    let (server, client) = common::setup_workspace_mock().await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/workspace/mkdirs"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/2.0/workspace/mkdirs"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.mkdirs(PARENT).await.expect("mkdirs failed");
}

#[tokio::test]
async fn test_throttling_gives_up_after_max_retries() {
    let (server, client) = common::setup_workspace_mock().await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/workspace/mkdirs"))
        .respond_with(common::api_error(429, "REQUEST_LIMIT_EXCEEDED", "slow down"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client.mkdirs(PARENT).await.unwrap_err();
    assert_eq!(
        err,
        RemoteError::Api {
            status: 429,
            code: "REQUEST_LIMIT_EXCEEDED".to_string(),
            message: "slow down".to_string(),
        }
    );
}
