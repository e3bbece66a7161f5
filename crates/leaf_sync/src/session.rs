//! Sync session: one document pair, one lock, one pass at a time
//!
//! Every pass runs to completion while holding the session lock, so the timer
//! driven path and a caller-forced `sync_now()` can never interleave. The same
//! lock protects the connection state and the baseline.

use crate::diff;
use crate::driver;
use crate::endpoint::{EndpointError, LocalEndpoint, RemoteEndpoint};
use crate::merge::{merge_with, Granularity};
use crate::state::{ConnectionState, DisconnectReason, StateMachine};
use crate::{PassError, Result, SyncError};
use leaf_common::LeafError;
use leaf_config::SyncConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

/// Per-session tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Pause between driver passes
    pub interval: Duration,

    /// Merge alignment unit
    pub granularity: Granularity,

    /// Undo the remote write when the local write of the same pass fails
    pub rollback_remote_on_local_failure: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            granularity: Granularity::default(),
            rollback_remote_on_local_failure: true,
        }
    }
}

impl TryFrom<&SyncConfig> for SessionOptions {
    type Error = LeafError;

    fn try_from(config: &SyncConfig) -> std::result::Result<Self, Self::Error> {
        let granularity = config.granularity.parse().map_err(LeafError::ConfigError)?;
        Ok(Self {
            interval: Duration::from_millis(config.interval_ms),
            granularity,
            rollback_remote_on_local_failure: config.rollback_remote_on_local_failure,
        })
    }
}

/// What a successful pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// First pass after connecting (adopts the remote text)
    pub initial: bool,

    /// Conflicting regions resolved in favour of the remote
    pub conflicts: usize,

    pub remote_written: bool,
    pub local_written: bool,
}

/// Observable session transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    PassCompleted(PassReport),
    Disconnected(DisconnectReason),
}

struct SessionState {
    /// Last text confirmed identical on both endpoints
    baseline: Option<String>,
    machine: StateMachine,
    driver: Option<JoinHandle<()>>,
}

/// Synchronizes one local/remote document pair
pub struct SyncSession {
    name: String,
    local: Arc<dyn LocalEndpoint>,
    remote: Arc<dyn RemoteEndpoint>,
    options: SessionOptions,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SyncSession {
    /// Create a disconnected session
    pub fn new(
        name: impl Into<String>,
        local: Arc<dyn LocalEndpoint>,
        remote: Arc<dyn RemoteEndpoint>,
        options: SessionOptions,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            name: name.into(),
            local,
            remote,
            options,
            state: Mutex::new(SessionState {
                baseline: None,
                machine: StateMachine::new(),
                driver: None,
            }),
            events,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Subscribe to connection and pass events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> ConnectionState {
        self.state.lock().await.machine.state()
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.machine.is_connected()
    }

    pub async fn baseline(&self) -> Option<String> {
        self.state.lock().await.baseline.clone()
    }

    pub async fn last_disconnect(&self) -> Option<DisconnectReason> {
        self.state.lock().await.machine.last_disconnect().cloned()
    }

    /// Start periodic syncing.
    ///
    /// Clears the baseline so the next pass adopts the remote text, and spawns
    /// the driver task unless one from a previous connection is still alive.
    /// Call [`SyncSession::sync_now`] afterwards to run the first pass without
    /// waiting a full interval.
    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.machine.connect()?;
        state.baseline = None;

        let driver_alive = state
            .driver
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());
        if !driver_alive {
            state.driver = Some(tokio::spawn(driver::run(Arc::clone(self))));
        }
        drop(state);

        tracing::info!(session = %self.name, "Connected");
        self.emit(SessionEvent::Connected);
        Ok(())
    }

    /// Stop periodic syncing. A pass already in flight completes first.
    pub async fn disconnect(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.machine.disconnect()?;
        drop(state);

        tracing::info!(session = %self.name, "Disconnected");
        self.emit(SessionEvent::Disconnected(DisconnectReason::Requested));
        Ok(())
    }

    /// Run one pass now, outside the timer cadence. No-op while disconnected.
    pub async fn sync_now(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.machine.is_connected() {
            tracing::debug!(session = %self.name, "Not connected, skipping forced sync");
            return Ok(());
        }
        self.run_locked(&mut state).await.map(|_| ())
    }

    /// One driver tick. Returns false once the driver should stop.
    pub(crate) async fn drive_once(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.machine.is_connected() {
            // Failures are logged and force a disconnect inside run_locked
            let _ = self.run_locked(&mut state).await;
        }
        if !state.machine.is_connected() {
            state.driver = None;
            return false;
        }
        true
    }

    async fn run_locked(&self, state: &mut SessionState) -> Result<PassReport> {
        match self.run_pass(state).await {
            Ok(report) => {
                tracing::debug!(
                    session = %self.name,
                    initial = report.initial,
                    conflicts = report.conflicts,
                    remote_written = report.remote_written,
                    local_written = report.local_written,
                    "Sync pass completed"
                );
                self.emit(SessionEvent::PassCompleted(report));
                Ok(report)
            }
            Err(error) => {
                tracing::error!(session = %self.name, %error, "Sync pass failed, disconnecting");
                state.machine.fail(error.clone());
                self.emit(SessionEvent::Disconnected(DisconnectReason::Failed(error.clone())));
                Err(SyncError::Pass(error))
            }
        }
    }

    /// Read, merge, write back. Baseline only advances when every write landed.
    async fn run_pass(&self, state: &mut SessionState) -> std::result::Result<PassReport, PassError> {
        let Some(baseline) = state.baseline.as_deref() else {
            return self.initial_pass(state).await;
        };

        let local_text = self.local.read().await.map_err(local_failure)?;
        let remote_text = self.remote.read().await.map_err(remote_failure)?;

        let outcome = merge_with(self.options.granularity, baseline, &local_text, &remote_text);
        if outcome.conflict() {
            tracing::warn!(
                session = %self.name,
                conflicts = outcome.conflicts,
                "Both sides edited the same region, keeping the remote version"
            );
        }

        let remote_written = outcome.text != remote_text;
        if remote_written {
            let edits = diff::encode(&remote_text, &outcome.text);
            let applied = self
                .remote
                .compare_and_write(&remote_text, &edits)
                .await
                .map_err(remote_failure)?;
            if !applied {
                return Err(PassError::RemoteConflict);
            }
        }

        let local_written = outcome.text != local_text;
        if local_written {
            if let Err(error) = self.write_local(&local_text, &outcome.text).await {
                if remote_written {
                    self.rollback_remote(&outcome.text, &remote_text).await;
                }
                return Err(error);
            }
        }

        let report = PassReport {
            initial: false,
            conflicts: outcome.conflicts,
            remote_written,
            local_written,
        };
        state.baseline = Some(outcome.text);
        Ok(report)
    }

    /// First pass after connecting: the remote text becomes the common ancestor.
    async fn initial_pass(&self, state: &mut SessionState) -> std::result::Result<PassReport, PassError> {
        let remote_text = self.remote.read().await.map_err(remote_failure)?;
        let local_text = self.local.read().await.map_err(local_failure)?;

        let local_written = local_text != remote_text;
        if local_written {
            self.write_local(&local_text, &remote_text).await?;
        }

        state.baseline = Some(remote_text);
        Ok(PassReport {
            initial: true,
            local_written,
            ..PassReport::default()
        })
    }

    async fn write_local(&self, old: &str, new: &str) -> std::result::Result<(), PassError> {
        match self.local.compare_and_write(old, new).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(PassError::LocalConflict),
            Err(e) => Err(local_failure(e)),
        }
    }

    /// Best-effort: put the remote back to the text it had before this pass.
    async fn rollback_remote(&self, merged: &str, original: &str) {
        if !self.options.rollback_remote_on_local_failure {
            return;
        }
        let edits = diff::encode(merged, original);
        match self.remote.compare_and_write(merged, &edits).await {
            Ok(true) => {
                tracing::info!(session = %self.name, "Reverted remote write after local write failed")
            }
            Ok(false) => tracing::warn!(
                session = %self.name,
                "Remote changed again before it could be reverted"
            ),
            Err(e) => tracing::warn!(session = %self.name, error = %e, "Could not revert remote write"),
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

fn local_failure(error: EndpointError) -> PassError {
    match error {
        EndpointError::Unavailable(detail) => PassError::EndpointUnavailable(detail),
        EndpointError::Transport(detail) => {
            tracing::warn!(%detail, "Local endpoint call failed");
            PassError::LocalConflict
        }
    }
}

fn remote_failure(error: EndpointError) -> PassError {
    match error {
        EndpointError::Unavailable(detail) => PassError::EndpointUnavailable(detail),
        EndpointError::Transport(detail) => {
            tracing::warn!(%detail, "Remote endpoint call failed");
            PassError::RemoteConflict
        }
    }
}
