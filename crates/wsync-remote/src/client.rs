//! Workspace REST API client
//!
//! [`WorkspaceClient`] speaks the workspace and workspace-files endpoints of
//! the 2.0 REST API and implements [`IWorkspaceFiles`] on top of them.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use wsync_core::domain::WorkspaceHost;
//! use wsync_core::ports::IWorkspaceFiles;
//! use wsync_remote::WorkspaceClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let host = WorkspaceHost::new("acme.example.com")?;
//! let client = WorkspaceClient::new(&host, "token")?;
//! let me = client.current_principal().await?;
//! println!("Signed in as {}", me.user_name);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use wsync_core::domain::WorkspaceHost;
use wsync_core::ports::workspace_files::{
    IWorkspaceFiles, ObjectInfo, ObjectType, Principal, RemoteError,
};

use crate::error::{check, transport};
use crate::retry::{is_throttled, parse_retry_after, RetryPolicy};

const API_PREFIX: [&str; 2] = ["api", "2.0"];

// ============================================================================
// API request and response types
// ============================================================================

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    path: &'a str,
    recursive: bool,
}

#[derive(Debug, Serialize)]
struct MkdirsRequest<'a> {
    path: &'a str,
}

/// Response from `workspace/get-status`
#[derive(Debug, Deserialize)]
struct StatusResponse {
    path: String,
    object_type: String,
}

/// Response from `preview/scim/v2/Me`
#[derive(Debug, Deserialize)]
struct MeResponse {
    #[serde(rename = "userName")]
    user_name: String,
}

/// Maps an API object type onto [`ObjectType`]
///
/// Types the sync engine has no use for (dashboards, experiments, ...) are
/// reported as plain files so they are never treated as sync targets.
fn object_type_from_api(raw: &str) -> ObjectType {
    match raw {
        "DIRECTORY" => ObjectType::Directory,
        "REPO" => ObjectType::Repo,
        "NOTEBOOK" => ObjectType::Notebook,
        "LIBRARY" => ObjectType::Library,
        "FILE" => ObjectType::File,
        other => {
            debug!(object_type = other, "Unrecognised object type");
            ObjectType::File
        }
    }
}

fn parent_of(path: &str) -> Option<&str> {
    match path.rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() => Some(parent),
        _ => None,
    }
}

// ============================================================================
// WorkspaceClient
// ============================================================================

/// HTTP client for the workspace REST API
#[derive(Clone)]
pub struct WorkspaceClient {
    client: Client,
    base_url: Url,
    token: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for WorkspaceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceClient")
            .field("base_url", &self.base_url.as_str())
            .field("retry", &self.retry)
            .finish()
    }
}

impl WorkspaceClient {
    /// Creates a client for `host` authenticating with `token`
    ///
    /// # Errors
    /// Returns [`RemoteError::Transport`] if the HTTP client cannot be built.
    pub fn new(host: &WorkspaceHost, token: impl Into<String>) -> Result<Self, RemoteError> {
        Self::with_base_url(host.as_str(), token)
    }

    /// Creates a client against an arbitrary base URL (useful for testing)
    ///
    /// # Errors
    /// Returns [`RemoteError::Transport`] if `base_url` is not a valid URL or
    /// the HTTP client cannot be built.
    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, RemoteError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RemoteError::Transport(format!("invalid base URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::Transport(format!(
                "invalid base URL {base_url}"
            )));
        }
        let client = Client::builder()
            .user_agent(concat!("wsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(transport)?;

        Ok(Self {
            client,
            base_url,
            token: token.into(),
            retry: RetryPolicy::default(),
        })
    }

    /// Replaces the policy for throttled responses
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The base URL requests are sent to
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Builds an API URL from path segments, percent-encoding each one
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut parts) = url.path_segments_mut() {
            parts.pop_if_empty().extend(API_PREFIX).extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url).bearer_auth(&self.token)
    }

    /// Sends `request`, backing off while the server throttles
    ///
    /// `path` is the workspace object the request is about, used in errors.
    async fn send(&self, request: RequestBuilder, path: &str) -> Result<Response, RemoteError> {
        let mut attempt = 0;
        loop {
            let current = request
                .try_clone()
                .ok_or_else(|| RemoteError::Transport("request cannot be replayed".into()))?;
            let response = current.send().await.map_err(transport)?;

            let status = response.status();
            if is_throttled(status) && attempt < self.retry.max_retries {
                let wait = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| parse_retry_after(v, self.retry.default_delay))
                    .unwrap_or(self.retry.default_delay);
                info!(
                    path,
                    attempt,
                    status = status.as_u16(),
                    retry_after_ms = wait.as_millis() as u64,
                    "Throttled, backing off"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
                continue;
            }

            if attempt > 0 {
                debug!(path, attempt, "Request went through after retry");
            }
            return check(response, path).await;
        }
    }

    /// `POST workspace-files/import-file/{path}` without any recovery
    async fn import_file(
        &self,
        path: &str,
        content: &[u8],
        overwrite: bool,
    ) -> Result<(), RemoteError> {
        let mut url = self.endpoint(
            ["workspace-files", "import-file"]
                .into_iter()
                .chain(path.split('/').filter(|s| !s.is_empty())),
        );
        url.query_pairs_mut()
            .append_pair("overwrite", if overwrite { "true" } else { "false" });

        let request = self.request(Method::POST, url).body(content.to_vec());
        self.send(request, path).await?;
        Ok(())
    }
}

#[async_trait]
impl IWorkspaceFiles for WorkspaceClient {
    /// Uploads a file, recovering once from a missing parent directory and,
    /// when overwriting, once from an object of a different type in the way
    async fn upload(&self, path: &str, content: Vec<u8>, overwrite: bool) -> Result<(), RemoteError> {
        debug!(path, bytes = content.len(), overwrite, "import-file");
        match self.import_file(path, &content, overwrite).await {
            Err(RemoteError::NotFound(_)) => {
                let Some(parent) = parent_of(path) else {
                    return Err(RemoteError::NotFound(path.to_string()));
                };
                debug!(path, parent, "Parent directory missing, creating it");
                self.mkdirs(parent).await?;
                self.import_file(path, &content, overwrite).await
            }
            Err(RemoteError::AlreadyExists(_)) if overwrite => {
                debug!(path, "Object of another type in the way, replacing it");
                match self.delete(path, false).await {
                    Ok(()) | Err(RemoteError::NotFound(_)) => {}
                    Err(e) => return Err(e),
                }
                self.import_file(path, &content, overwrite).await
            }
            other => other,
        }
    }

    async fn delete(&self, path: &str, recursive: bool) -> Result<(), RemoteError> {
        debug!(path, recursive, "workspace/delete");
        let url = self.endpoint(["workspace", "delete"]);
        let request = self
            .request(Method::POST, url)
            .json(&DeleteRequest { path, recursive });
        self.send(request, path).await?;
        Ok(())
    }

    async fn mkdirs(&self, path: &str) -> Result<(), RemoteError> {
        debug!(path, "workspace/mkdirs");
        let url = self.endpoint(["workspace", "mkdirs"]);
        let request = self.request(Method::POST, url).json(&MkdirsRequest { path });
        self.send(request, path).await?;
        Ok(())
    }

    async fn get_status(&self, path: &str) -> Result<ObjectInfo, RemoteError> {
        debug!(path, "workspace/get-status");
        let mut url = self.endpoint(["workspace", "get-status"]);
        url.query_pairs_mut().append_pair("path", path);

        let response = self.send(self.request(Method::GET, url), path).await?;
        let status: StatusResponse = response.json().await.map_err(transport)?;
        Ok(ObjectInfo {
            path: status.path,
            object_type: object_type_from_api(&status.object_type),
        })
    }

    async fn current_principal(&self) -> Result<Principal, RemoteError> {
        let url = self.endpoint(["preview", "scim", "v2", "Me"]);
        let response = self.send(self.request(Method::GET, url), "/").await?;
        let me: MeResponse = response.json().await.map_err(transport)?;
        debug!(user = %me.user_name, "Resolved current principal");
        Ok(Principal {
            user_name: me.user_name,
        })
    }
}
