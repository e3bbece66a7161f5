//! In-memory text document implementing both endpoint capabilities
//!
//! Useful for embedding the engine without an editor, and for tests that
//! need to play the part of a human typing between a read and a write.

use crate::diff::{self, Edit};
use crate::endpoint::{EndpointError, EndpointResult, LocalEndpoint, RemoteEndpoint};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared, cloneable text store. Clones observe the same document.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    inner: Arc<Mutex<DocumentSlot>>,
}

#[derive(Debug, Default)]
struct DocumentSlot {
    text: String,
    closed: bool,
    writes: usize,
}

impl MemoryDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DocumentSlot {
                text: text.into(),
                closed: false,
                writes: 0,
            })),
        }
    }

    fn slot(&self) -> MutexGuard<'_, DocumentSlot> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the current text
    pub fn text(&self) -> String {
        self.slot().text.clone()
    }

    /// Overwrite the text directly, as an outside actor would
    pub fn set_text(&self, text: impl Into<String>) {
        self.slot().text = text.into();
    }

    /// Make every further call fail with [`EndpointError::Unavailable`]
    pub fn close(&self) {
        self.slot().closed = true;
    }

    /// Number of successful compare-and-swap writes that changed the text
    pub fn write_count(&self) -> usize {
        self.slot().writes
    }

    fn read_text(&self) -> EndpointResult<String> {
        let slot = self.slot();
        if slot.closed {
            return Err(EndpointError::Unavailable("document closed".to_string()));
        }
        Ok(slot.text.clone())
    }

    fn swap_with<F>(&self, old: &str, produce: F) -> EndpointResult<bool>
    where
        F: FnOnce(&str) -> EndpointResult<String>,
    {
        let mut slot = self.slot();
        if slot.closed {
            return Err(EndpointError::Unavailable("document closed".to_string()));
        }
        if slot.text != old {
            return Ok(false);
        }
        slot.text = produce(old)?;
        slot.writes += 1;
        Ok(true)
    }
}

#[async_trait]
impl LocalEndpoint for MemoryDocument {
    async fn read(&self) -> EndpointResult<String> {
        self.read_text()
    }

    async fn compare_and_write(&self, old: &str, new: &str) -> EndpointResult<bool> {
        if old == new {
            return Ok(true);
        }
        self.swap_with(old, |_| Ok(new.to_string()))
    }
}

#[async_trait]
impl RemoteEndpoint for MemoryDocument {
    async fn read(&self) -> EndpointResult<String> {
        self.read_text()
    }

    async fn compare_and_write(&self, old: &str, edits: &[Edit]) -> EndpointResult<bool> {
        if edits.is_empty() {
            return Ok(true);
        }
        self.swap_with(old, |current| {
            diff::apply(current, edits).map_err(|e| EndpointError::Transport(e.to_string()))
        })
    }
}
