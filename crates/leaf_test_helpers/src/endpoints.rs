//! Fault-injecting endpoint wrapper
//!
//! Wraps a [`MemoryDocument`] and can fail reads, fail or reject writes, or
//! simulate someone typing between a pass's read and its write. It also
//! records how many calls were in flight at once, which the serialization
//! tests use to prove passes never overlap.

use async_trait::async_trait;
use leaf_sync::endpoint::EndpointResult;
use leaf_sync::{Edit, EndpointError, LocalEndpoint, MemoryDocument, RemoteEndpoint};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Default)]
struct Faults {
    read_error: Option<EndpointError>,
    write_error: Option<EndpointError>,
    reject_writes: bool,
    edit_before_write: Option<String>,
}

pub struct FlakyEndpoint {
    document: MemoryDocument,
    delay: Duration,
    faults: Mutex<Faults>,
    reads: AtomicUsize,
    write_attempts: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct CallGuard<'a>(&'a AtomicUsize);

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FlakyEndpoint {
    pub fn new(document: MemoryDocument) -> Self {
        Self {
            document,
            delay: Duration::ZERO,
            faults: Mutex::new(Faults::default()),
            reads: AtomicUsize::new(0),
            write_attempts: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Every call sleeps for `delay` before touching the document
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn document(&self) -> &MemoryDocument {
        &self.document
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn fail_reads(&self, error: EndpointError) {
        self.faults().read_error = Some(error);
    }

    pub fn fail_writes(&self, error: EndpointError) {
        self.faults().write_error = Some(error);
    }

    /// Writes report a CAS mismatch without touching the document
    pub fn reject_writes(&self) {
        self.faults().reject_writes = true;
    }

    /// Replace the document text right before the next write is checked
    pub fn edit_before_next_write(&self, text: impl Into<String>) {
        self.faults().edit_before_write = Some(text.into());
    }

    pub fn clear_faults(&self) {
        *self.faults() = Faults::default();
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at the same time
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> CallGuard<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let guard = CallGuard(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        guard
    }

    /// Calls currently running
    pub fn calls_in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn before_read(&self) -> EndpointResult<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match &self.faults().read_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    /// Ok(false) short-circuits the write as a CAS mismatch
    fn before_write(&self) -> EndpointResult<bool> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        let mut faults = self.faults();
        if let Some(text) = faults.edit_before_write.take() {
            self.document.set_text(text);
        }
        if let Some(error) = &faults.write_error {
            return Err(error.clone());
        }
        Ok(!faults.reject_writes)
    }
}

#[async_trait]
impl LocalEndpoint for FlakyEndpoint {
    async fn read(&self) -> EndpointResult<String> {
        let _call = self.enter().await;
        self.before_read()?;
        LocalEndpoint::read(&self.document).await
    }

    async fn compare_and_write(&self, old: &str, new: &str) -> EndpointResult<bool> {
        let _call = self.enter().await;
        if !self.before_write()? {
            return Ok(false);
        }
        LocalEndpoint::compare_and_write(&self.document, old, new).await
    }
}

#[async_trait]
impl RemoteEndpoint for FlakyEndpoint {
    async fn read(&self) -> EndpointResult<String> {
        let _call = self.enter().await;
        self.before_read()?;
        RemoteEndpoint::read(&self.document).await
    }

    async fn compare_and_write(&self, old: &str, edits: &[Edit]) -> EndpointResult<bool> {
        let _call = self.enter().await;
        if !self.before_write()? {
            return Ok(false);
        }
        RemoteEndpoint::compare_and_write(&self.document, old, edits).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancelled_call_is_not_counted_as_in_flight() {
        let endpoint =
            FlakyEndpoint::new(MemoryDocument::new("text")).with_delay(Duration::from_millis(200));

        let read = LocalEndpoint::read(&endpoint);
        let timed_out = tokio::time::timeout(Duration::from_millis(5), read).await;
        assert!(timed_out.is_err());

        assert_eq!(endpoint.calls_in_flight(), 0);
        assert_eq!(endpoint.max_concurrent_calls(), 1);
        assert_eq!(endpoint.reads(), 0);
    }

    #[tokio::test]
    async fn test_rejected_write_leaves_document_alone() {
        let endpoint = FlakyEndpoint::new(MemoryDocument::new("text"));
        endpoint.reject_writes();

        let applied = LocalEndpoint::compare_and_write(&endpoint, "text", "new")
            .await
            .unwrap();
        assert!(!applied);
        assert_eq!(endpoint.document().text(), "text");
        assert_eq!(endpoint.write_attempts(), 1);
    }
}
