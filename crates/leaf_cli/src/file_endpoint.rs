//! Plain-file endpoint used by `leaf sync`
//!
//! The same type serves as the local side (whole-text swaps) and as a stand-in
//! remote (span edits applied against the file's current text). Writes go to a
//! sibling temp file first and are renamed into place.

use async_trait::async_trait;
use leaf_sync::endpoint::EndpointResult;
use leaf_sync::{diff, Edit, EndpointError, LocalEndpoint, RemoteEndpoint};
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

pub struct FileEndpoint {
    path: PathBuf,
}

impl FileEndpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, error: io::Error) -> EndpointError {
        if error.kind() == io::ErrorKind::NotFound {
            EndpointError::Unavailable(format!("{} not found", self.path.display()))
        } else {
            EndpointError::Transport(format!("{}: {}", self.path.display(), error))
        }
    }

    async fn read_text(&self) -> EndpointResult<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.io_error(e))
    }

    async fn replace(&self, text: &str) -> EndpointResult<()> {
        let mut tmp = OsString::from(self.path.as_os_str());
        tmp.push(".leaf-tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, text)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        tracing::trace!(path = %self.path.display(), bytes = text.len(), "File replaced");
        Ok(())
    }

    /// Ok(false) when the file no longer holds `old`
    async fn unchanged_since(&self, old: &str) -> EndpointResult<bool> {
        let current = self.read_text().await?;
        Ok(current == old)
    }
}

#[async_trait]
impl LocalEndpoint for FileEndpoint {
    async fn read(&self) -> EndpointResult<String> {
        self.read_text().await
    }

    async fn compare_and_write(&self, old: &str, new: &str) -> EndpointResult<bool> {
        if old == new {
            return Ok(true);
        }
        if !self.unchanged_since(old).await? {
            return Ok(false);
        }
        self.replace(new).await?;
        Ok(true)
    }
}

#[async_trait]
impl RemoteEndpoint for FileEndpoint {
    async fn read(&self) -> EndpointResult<String> {
        self.read_text().await
    }

    async fn compare_and_write(&self, old: &str, edits: &[Edit]) -> EndpointResult<bool> {
        if edits.is_empty() {
            return Ok(true);
        }
        if !self.unchanged_since(old).await? {
            return Ok(false);
        }
        let updated =
            diff::apply(old, edits).map_err(|e| EndpointError::Transport(e.to_string()))?;
        self.replace(&updated).await?;
        Ok(true)
    }
}
