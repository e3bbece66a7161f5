//! Connection state machine

use crate::{PassError, Result, SyncError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

/// How the session last left the `Connected` state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Explicit `disconnect()`
    Requested,

    /// Forced by a failed pass
    Failed(PassError),
}

/// Two-state machine guarding periodic sync
#[derive(Debug, Default)]
pub struct StateMachine {
    state: ConnectionState,
    last_disconnect: Option<DisconnectReason>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn last_disconnect(&self) -> Option<&DisconnectReason> {
        self.last_disconnect.as_ref()
    }

    /// `Disconnected -> Connected`
    pub fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(SyncError::AlreadyConnected);
        }
        self.state = ConnectionState::Connected;
        Ok(())
    }

    /// `Connected -> Disconnected` on request
    pub fn disconnect(&mut self) -> Result<()> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        self.state = ConnectionState::Disconnected;
        self.last_disconnect = Some(DisconnectReason::Requested);
        Ok(())
    }

    /// Error-triggered transition; always lands in `Disconnected`
    pub fn fail(&mut self, error: PassError) {
        self.state = ConnectionState::Disconnected;
        self.last_disconnect = Some(DisconnectReason::Failed(error));
    }
}
