//! Text endpoint capabilities consumed by the sync session
//!
//! Editor and browser bindings live outside this crate; they only have to
//! provide "read the current text" and a compare-and-swap write.

use crate::diff::Edit;
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Landing identifier used when a document carries no project-url marker
pub const DEFAULT_LANDING_URL: &str = "https://overleaf.com/login";

/// Marker key scanned for by [`initial_endpoint_identifier`]
pub const PROJECT_URL_MARKER: &str = "overleaf-project-url";

static DEFAULT_MARKER: OnceLock<Regex> = OnceLock::new();

/// Failures reported by an endpoint implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// The document (or the connection to it) no longer exists
    #[error("Endpoint unavailable: {0}")]
    Unavailable(String),

    /// The call itself failed (timeout, script error, IPC failure, ...)
    #[error("Endpoint transport error: {0}")]
    Transport(String),
}

pub type EndpointResult<T> = std::result::Result<T, EndpointError>;

/// The local, directly editable document
#[async_trait]
pub trait LocalEndpoint: Send + Sync {
    /// Current full content
    async fn read(&self) -> EndpointResult<String>;

    /// Replace `old` with `new` iff the current content still equals `old`.
    ///
    /// Returns `Ok(true)` without effect when `old == new`, `Ok(false)`
    /// without effect when the content has moved on.
    async fn compare_and_write(&self, old: &str, new: &str) -> EndpointResult<bool>;
}

/// The remote collaborative document, which only accepts span edits
#[async_trait]
pub trait RemoteEndpoint: Send + Sync {
    /// Current full content as seen by the remote document model
    async fn read(&self) -> EndpointResult<String>;

    /// Apply `edits` (offsets into `old`) iff the current content still equals `old`.
    ///
    /// An empty edit list is a successful no-op.
    async fn compare_and_write(&self, old: &str, edits: &[Edit]) -> EndpointResult<bool>;
}

/// Extract the remote project identifier from a seed document.
///
/// Looks for a line containing `overleaf-project-url: <value>` and returns
/// `<value>`, or [`DEFAULT_LANDING_URL`] if no marker is present.
pub fn initial_endpoint_identifier(seed_text: &str) -> String {
    let pattern = DEFAULT_MARKER.get_or_init(|| marker_regex(PROJECT_URL_MARKER));
    find_marker(pattern, seed_text).unwrap_or_else(|| DEFAULT_LANDING_URL.to_string())
}

/// Same as [`initial_endpoint_identifier`] with a custom marker key and fallback.
pub fn initial_endpoint_identifier_with(seed_text: &str, marker: &str, default: &str) -> String {
    let pattern = marker_regex(marker);
    find_marker(&pattern, seed_text).unwrap_or_else(|| default.to_string())
}

fn marker_regex(marker: &str) -> Regex {
    Regex::new(&format!(r"(?m){}: (.*?)$", regex::escape(marker)))
        .expect("escaped marker is always a valid pattern")
}

fn find_marker(pattern: &Regex, seed_text: &str) -> Option<String> {
    pattern
        .captures(seed_text)
        .and_then(|caps| caps.get(1))
        .map(|value| value.as_str().trim_end_matches('\r').to_string())
}
