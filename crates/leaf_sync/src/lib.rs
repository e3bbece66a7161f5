//! # LeafSync Engine
//!
//! Keeps a local text document and a remote collaborative document in step
//! by periodically running a three-way merge and writing the result back to
//! both sides with compare-and-swap writes.
//!
//! ## Architecture
//!
//! - **Diff**: span edits for the remote side ([`diff`])
//! - **Merge**: three-way merge, remote wins on conflict ([`merge`])
//! - **Session**: one pass at a time under a single lock ([`session`])
//! - **Driver**: periodic passes on a tokio task while connected ([`driver`])
//! - **Registry**: owned map from document key to session ([`registry`])
//!
//! ## Usage
//!
//! ```rust,no_run
//! use leaf_sync::{MemoryDocument, SessionOptions, SyncSession};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> leaf_sync::Result<()> {
//!     let local = MemoryDocument::new("");
//!     let remote = MemoryDocument::new("Hello");
//!
//!     let session = SyncSession::new(
//!         "main.tex",
//!         Arc::new(local.clone()),
//!         Arc::new(remote.clone()),
//!         SessionOptions::default(),
//!     );
//!     session.connect().await?;
//!     session.sync_now().await?;
//!     assert_eq!(local.text(), "Hello");
//!     Ok(())
//! }
//! ```

pub mod diff;
pub mod driver;
pub mod endpoint;
pub mod memory;
pub mod merge;
pub mod registry;
pub mod session;
pub mod state;

pub use diff::{Edit, EditError};
pub use endpoint::{
    initial_endpoint_identifier, initial_endpoint_identifier_with, EndpointError, LocalEndpoint,
    RemoteEndpoint,
};
pub use memory::MemoryDocument;
pub use merge::{merge, merge_with, Granularity, MergeOutcome};
pub use registry::SessionRegistry;
pub use session::{PassReport, SessionEvent, SessionOptions, SyncSession};
pub use state::{ConnectionState, DisconnectReason};

/// Common result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Why a single sync pass failed. Every kind ends the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PassError {
    #[error("Local document changed during the pass or rejected the write")]
    LocalConflict,

    #[error("Remote document changed during the pass or its transport failed")]
    RemoteConflict,

    #[error("Endpoint unavailable: {0}")]
    EndpointUnavailable(String),
}

/// Errors surfaced by sessions and the registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("Already connected")]
    AlreadyConnected,

    #[error("Not connected")]
    NotConnected,

    #[error("No sync session for {0}")]
    SessionNotFound(String),

    #[error("Sync pass failed: {0}")]
    Pass(#[from] PassError),
}

impl SyncError {
    /// Usage errors (connect while connected, disconnect while disconnected)
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, SyncError::AlreadyConnected | SyncError::NotConnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_display() {
        let err = SyncError::SessionNotFound("\"main.tex\"".to_string());
        assert_eq!(err.to_string(), "No sync session for \"main.tex\"");

        let err = SyncError::from(PassError::EndpointUnavailable("browser closed".to_string()));
        assert_eq!(
            err.to_string(),
            "Sync pass failed: Endpoint unavailable: browser closed"
        );
    }

    #[test]
    fn test_invalid_transition_classification() {
        assert!(SyncError::AlreadyConnected.is_invalid_transition());
        assert!(SyncError::NotConnected.is_invalid_transition());
        assert!(!SyncError::Pass(PassError::LocalConflict).is_invalid_transition());
    }
}
