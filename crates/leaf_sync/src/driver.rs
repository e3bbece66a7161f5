//! Periodic driver loop
//!
//! One tokio task per connected session. Each tick sleeps for the configured
//! interval, then takes the session lock and runs a pass if still connected.
//! The task exits (and clears its handle) the first time it finds the session
//! disconnected, whether by request or by a failed pass.
//!
//! The pass right after `connect()` is the caller's to trigger with
//! `sync_now()`; the driver only supplies the cadence.

use crate::session::SyncSession;
use std::sync::Arc;

pub(crate) async fn run(session: Arc<SyncSession>) {
    let interval = session.options().interval;
    tracing::debug!(session = %session.name(), ?interval, "Driver started");

    loop {
        tokio::time::sleep(interval).await;
        if !session.drive_once().await {
            break;
        }
    }

    tracing::debug!(session = %session.name(), "Driver stopped");
}
