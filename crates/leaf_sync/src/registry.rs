//! Owned mapping from an external document key to its sync session

use crate::session::SyncSession;
use crate::{Result, SyncError};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

/// Command surface over many independent sessions
pub struct SessionRegistry<K> {
    sessions: Mutex<HashMap<K, Arc<SyncSession>>>,
}

impl<K> SessionRegistry<K>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<K, Arc<SyncSession>>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register `session` under `key`, replacing (and disconnecting) any previous pairing
    pub async fn open(&self, key: K, session: Arc<SyncSession>) -> Option<Arc<SyncSession>> {
        let previous = self.sessions().insert(key.clone(), session);
        if let Some(old) = &previous {
            if let Err(e) = old.disconnect().await {
                tracing::debug!(key = ?key, error = %e, "Replaced session was not connected");
            }
        }
        previous
    }

    pub fn get(&self, key: &K) -> Result<Arc<SyncSession>> {
        self.sessions()
            .get(key)
            .cloned()
            .ok_or_else(|| SyncError::SessionNotFound(format!("{:?}", key)))
    }

    pub async fn connect(&self, key: &K) -> Result<()> {
        self.get(key)?.connect().await
    }

    pub async fn disconnect(&self, key: &K) -> Result<()> {
        self.get(key)?.disconnect().await
    }

    /// Force one pass now on the session for `key`
    pub async fn force_sync(&self, key: &K) -> Result<()> {
        self.get(key)?.sync_now().await
    }

    /// Drop the pairing for `key`, disconnecting it if needed
    pub async fn remove(&self, key: &K) -> Result<Arc<SyncSession>> {
        let session = self
            .sessions()
            .remove(key)
            .ok_or_else(|| SyncError::SessionNotFound(format!("{:?}", key)))?;
        if session.is_connected().await {
            // A concurrent failure may have disconnected it already
            let _ = session.disconnect().await;
        }
        Ok(session)
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }
}

impl<K> Default for SessionRegistry<K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}
