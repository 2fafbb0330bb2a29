//! Root-relative, idempotent view of the remote workspace
//!
//! [`RemoteFiles`] is the boundary where "already absent" stops being an
//! error: deleting something that is gone succeeds, so re-applying a diff
//! after a failed or cancelled cycle is safe.

use std::sync::Arc;

use tracing::{debug, warn};

use wsync_core::domain::newtypes::RemotePath;
use wsync_core::ports::workspace_files::{IWorkspaceFiles, RemoteError};

use crate::SyncError;

/// Remote workspace operations addressed relative to the remote root
#[derive(Clone)]
pub struct RemoteFiles {
    client: Arc<dyn IWorkspaceFiles>,
    root: RemotePath,
}

impl std::fmt::Debug for RemoteFiles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFiles")
            .field("root", &self.root)
            .finish()
    }
}

impl RemoteFiles {
    /// Wraps `client`, resolving every path below `root`
    pub fn new(client: Arc<dyn IWorkspaceFiles>, root: RemotePath) -> Self {
        Self { client, root }
    }

    /// The remote root
    pub fn root(&self) -> &RemotePath {
        &self.root
    }

    fn resolve(&self, relative: &str) -> Result<RemotePath, SyncError> {
        Ok(self.root.join(relative)?)
    }

    /// Uploads `content` to `relative`, overwriting what is there
    ///
    /// # Errors
    /// Returns any remote failure.
    pub async fn put(&self, relative: &str, content: Vec<u8>) -> Result<(), SyncError> {
        let path = self.resolve(relative)?;
        debug!(path = %path, bytes = content.len(), "Uploading");
        self.client.upload(path.as_str(), content, true).await?;
        Ok(())
    }

    /// Deletes the object at `relative`; a missing object is success
    ///
    /// # Errors
    /// Returns any remote failure other than [`RemoteError::NotFound`].
    pub async fn delete(&self, relative: &str) -> Result<(), SyncError> {
        let path = self.resolve(relative)?;
        debug!(path = %path, "Deleting");
        match self.client.delete(path.as_str(), false).await {
            Ok(()) => Ok(()),
            Err(RemoteError::NotFound(_)) => {
                debug!(path = %path, "Already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Creates the directory at `relative` and any missing parents
    ///
    /// # Errors
    /// Returns any remote failure.
    pub async fn mkdir(&self, relative: &str) -> Result<(), SyncError> {
        let path = self.resolve(relative)?;
        debug!(path = %path, "Creating directory");
        self.client.mkdirs(path.as_str()).await?;
        Ok(())
    }

    /// Removes the empty directory at `relative`
    ///
    /// A missing directory is success. A directory that still holds objects
    /// this tool does not manage is left in place with a warning.
    ///
    /// # Errors
    /// Returns any other remote failure.
    pub async fn rmdir(&self, relative: &str) -> Result<(), SyncError> {
        let path = self.resolve(relative)?;
        debug!(path = %path, "Removing directory");
        match self.client.delete(path.as_str(), false).await {
            Ok(()) => Ok(()),
            Err(RemoteError::NotFound(_)) => Ok(()),
            Err(RemoteError::DirectoryNotEmpty(_)) => {
                warn!(path = %path, "Remote directory not empty, leaving it in place");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
