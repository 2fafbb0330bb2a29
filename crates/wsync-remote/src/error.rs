//! Mapping of workspace API failures onto [`RemoteError`]
//!
//! The API reports failures as `{"error_code": "...", "message": "..."}`
//! bodies. The error code wins over the HTTP status when both are known, so
//! a `400 RESOURCE_DOES_NOT_EXIST` is still a [`RemoteError::NotFound`].

use reqwest::{Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use wsync_core::ports::workspace_files::RemoteError;

/// Error code for a missing object
pub const RESOURCE_DOES_NOT_EXIST: &str = "RESOURCE_DOES_NOT_EXIST";

/// Error code for an object that is already there
pub const RESOURCE_ALREADY_EXISTS: &str = "RESOURCE_ALREADY_EXISTS";

/// Error code for a non-recursive delete of a populated directory
pub const DIRECTORY_NOT_EMPTY: &str = "DIRECTORY_NOT_EMPTY";

/// Error body returned by the workspace API
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Classifies a failed response for the object at `path`
pub fn classify(status: StatusCode, body: &str, path: &str) -> RemoteError {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.error_code.unwrap_or_default();
    let message = parsed
        .message
        .unwrap_or_else(|| body.trim().to_string());

    match code.as_str() {
        RESOURCE_DOES_NOT_EXIST => return RemoteError::NotFound(path.to_string()),
        RESOURCE_ALREADY_EXISTS => return RemoteError::AlreadyExists(path.to_string()),
        DIRECTORY_NOT_EMPTY => return RemoteError::DirectoryNotEmpty(path.to_string()),
        _ => {}
    }

    match status {
        StatusCode::NOT_FOUND => RemoteError::NotFound(path.to_string()),
        StatusCode::CONFLICT => RemoteError::AlreadyExists(path.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized(message),
        _ => RemoteError::Api {
            status: status.as_u16(),
            code,
            message,
        },
    }
}

/// Passes successful responses through and turns the rest into errors
///
/// # Errors
/// Returns the classified [`RemoteError`] for any non-2xx status.
pub async fn check(response: Response, path: &str) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), path, body = %body, "Request failed");
    Err(classify(status, &body, path))
}

/// Wraps a client-side failure (connect, TLS, decode)
pub fn transport(err: reqwest::Error) -> RemoteError {
    RemoteError::Transport(err.to_string())
}
