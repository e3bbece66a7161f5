//! Sync session integration tests: pass protocol, failure policy, serialization

use leaf_sync::{
    DisconnectReason, EndpointError, MemoryDocument, PassError, SessionEvent, SessionOptions,
    SyncError, SyncSession,
};
use leaf_test_helpers::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn options() -> SessionOptions {
    SessionOptions {
        // Passes are driven explicitly with sync_now()
        interval: Duration::from_secs(3600),
        ..SessionOptions::default()
    }
}

/// Session over two flaky endpoints, already connected with a baseline of `base`
async fn synced_pair(base: &str) -> (Arc<FlakyEndpoint>, Arc<FlakyEndpoint>, Arc<SyncSession>) {
    let local = Arc::new(FlakyEndpoint::new(MemoryDocument::new("")));
    let remote = Arc::new(FlakyEndpoint::new(MemoryDocument::new(base)));
    let session = SyncSession::new("main.tex", local.clone(), remote.clone(), options());
    assert_ok!(session.connect().await);
    assert_ok!(session.sync_now().await);
    assert_eq!(session.baseline().await.as_deref(), Some(base));
    (local, remote, session)
}

#[tokio::test]
async fn test_initial_connect_pulls_remote() {
    suppress_logs();
    let local = MemoryDocument::new("");
    let remote = MemoryDocument::new("Hello");
    let session = SyncSession::new(
        "main.tex",
        Arc::new(local.clone()),
        Arc::new(remote.clone()),
        options(),
    );
    let mut events = session.subscribe();

    session.connect().await.unwrap();
    session.sync_now().await.unwrap();

    assert_converged(&local, &remote, "Hello");
    assert_eq!(session.baseline().await.as_deref(), Some("Hello"));
    assert_eq!(remote.write_count(), 0);

    assert_eq!(events.recv().await.unwrap(), SessionEvent::Connected);
    match events.recv().await.unwrap() {
        SessionEvent::PassCompleted(report) => {
            assert!(report.initial);
            assert!(report.local_written);
            assert!(!report.remote_written);
        }
        other => panic!("Expected PassCompleted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_both_sides_merge_and_converge() {
    suppress_logs();
    let (local, remote, session) = synced_pair("intro\nbody\noutro\n").await;

    local.document().set_text("INTRO\nbody\noutro\n");
    remote.document().set_text("intro\nbody\noutro\nappendix\n");
    assert_ok!(session.sync_now().await);

    let expected = "INTRO\nbody\noutro\nappendix\n";
    assert_converged(local.document(), remote.document(), expected);
    assert_eq!(session.baseline().await.as_deref(), Some(expected));
}

#[tokio::test]
async fn test_conflict_keeps_remote_and_stays_connected() {
    suppress_logs();
    let (local, remote, session) = synced_pair("line1").await;
    let mut events = session.subscribe();

    local.document().set_text("line1-local");
    remote.document().set_text("line1-remote");
    assert_ok!(session.sync_now().await);

    assert_converged(local.document(), remote.document(), "line1-remote");
    assert!(session.is_connected().await);
    match events.recv().await.unwrap() {
        SessionEvent::PassCompleted(report) => assert_eq!(report.conflicts, 1),
        other => panic!("Expected PassCompleted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unchanged_pass_makes_no_writes() {
    suppress_logs();
    let (local, remote, session) = synced_pair("steady").await;
    let local_writes = local.write_attempts();

    assert_ok!(session.sync_now().await);
    assert_ok!(session.sync_now().await);

    assert_eq!(local.write_attempts(), local_writes);
    assert_eq!(remote.write_attempts(), 0);
}

#[tokio::test]
async fn test_stale_remote_write_disconnects() {
    suppress_logs();
    let (local, remote, session) = synced_pair("base").await;
    let mut events = session.subscribe();

    local.document().set_text("base plus local");
    // Someone edits the remote between our read and our write
    remote.edit_before_next_write("base plus collaborator");

    let result = session.sync_now().await;
    assert_eq!(result, Err(SyncError::Pass(PassError::RemoteConflict)));

    assert!(!session.is_connected().await);
    assert_eq!(session.baseline().await.as_deref(), Some("base"));
    assert_eq!(local.document().text(), "base plus local");
    assert_eq!(remote.document().text(), "base plus collaborator");
    assert_eq!(
        session.last_disconnect().await,
        Some(DisconnectReason::Failed(PassError::RemoteConflict))
    );
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::Disconnected(DisconnectReason::Failed(PassError::RemoteConflict))
    );
}

#[tokio::test]
async fn test_failed_local_write_reverts_remote() {
    suppress_logs();
    let (local, remote, session) = synced_pair("alpha beta").await;

    local.document().set_text("ALPHA beta");
    remote.document().set_text("alpha BETA");
    local.edit_before_next_write("alpha beta typed");

    let result = session.sync_now().await;
    assert_eq!(result, Err(SyncError::Pass(PassError::LocalConflict)));

    // Remote is back to what this pass read; the local text is the typist's
    assert_eq!(remote.document().text(), "alpha BETA");
    assert_eq!(local.document().text(), "alpha beta typed");
    assert_eq!(session.baseline().await.as_deref(), Some("alpha beta"));
    assert!(!session.is_connected().await);
}

#[tokio::test]
async fn test_rollback_can_be_disabled() {
    suppress_logs();
    let local = Arc::new(FlakyEndpoint::new(MemoryDocument::new("")));
    let remote = Arc::new(FlakyEndpoint::new(MemoryDocument::new("one two")));
    let session = SyncSession::new(
        "main.tex",
        local.clone(),
        remote.clone(),
        SessionOptions {
            rollback_remote_on_local_failure: false,
            ..options()
        },
    );
    session.connect().await.unwrap();
    session.sync_now().await.unwrap();

    local.document().set_text("ONE two");
    remote.document().set_text("one TWO");
    local.reject_writes();

    assert_err!(session.sync_now().await);
    assert_eq!(remote.document().text(), "ONE TWO");
    assert_eq!(session.baseline().await.as_deref(), Some("one two"));
}

#[tokio::test]
async fn test_closed_local_document_is_unavailable() {
    suppress_logs();
    let (local, _remote, session) = synced_pair("text").await;
    local.document().close();

    match session.sync_now().await {
        Err(SyncError::Pass(PassError::EndpointUnavailable(_))) => {}
        other => panic!("Expected EndpointUnavailable, got {:?}", other),
    }
    assert!(!session.is_connected().await);
}

#[tokio::test]
async fn test_transport_errors_map_to_conflicts() {
    suppress_logs();
    let (_local, remote, session) = synced_pair("text").await;
    remote.fail_reads(EndpointError::Transport("script timed out".to_string()));
    assert_eq!(
        session.sync_now().await,
        Err(SyncError::Pass(PassError::RemoteConflict))
    );

    let (local, remote, session) = synced_pair("text").await;
    remote.document().set_text("text from remote");
    local.fail_writes(EndpointError::Transport("buffer locked".to_string()));
    assert_eq!(
        session.sync_now().await,
        Err(SyncError::Pass(PassError::LocalConflict))
    );
}

#[tokio::test]
async fn test_failed_initial_pass_keeps_baseline_absent() {
    suppress_logs();
    let local = Arc::new(FlakyEndpoint::new(MemoryDocument::new("local draft")));
    let remote = Arc::new(FlakyEndpoint::new(MemoryDocument::new("remote copy")));
    let session = SyncSession::new("main.tex", local.clone(), remote.clone(), options());
    local.reject_writes();

    session.connect().await.unwrap();
    assert_eq!(
        session.sync_now().await,
        Err(SyncError::Pass(PassError::LocalConflict))
    );
    assert!(session.baseline().await.is_none());
    assert_eq!(local.document().text(), "local draft");
}

#[tokio::test]
async fn test_reconnect_after_failure_starts_over() {
    suppress_logs();
    let (local, remote, session) = synced_pair("v1").await;
    remote.fail_reads(EndpointError::Unavailable("browser closed".to_string()));
    assert_err!(session.sync_now().await);

    // Disconnected: forced syncs are no-ops and disconnect reports the mismatch
    assert_ok!(session.sync_now().await);
    assert_eq!(session.disconnect().await, Err(SyncError::NotConnected));

    remote.clear_faults();
    remote.document().set_text("v2");
    local.document().set_text("local edits lost on reconnect");
    assert_ok!(session.connect().await);
    assert_ok!(session.sync_now().await);
    assert_converged(local.document(), remote.document(), "v2");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_passes_never_interleave() {
    suppress_logs();
    let local = Arc::new(
        FlakyEndpoint::new(MemoryDocument::new("")).with_delay(Duration::from_millis(5)),
    );
    let remote = Arc::new(
        FlakyEndpoint::new(MemoryDocument::new("shared")).with_delay(Duration::from_millis(5)),
    );
    let session = SyncSession::new(
        "main.tex",
        local.clone(),
        remote.clone(),
        SessionOptions {
            interval: Duration::from_millis(2),
            ..SessionOptions::default()
        },
    );
    session.connect().await.unwrap();
    session.sync_now().await.unwrap();
    local.document().set_text("shared, edited");

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let session = Arc::clone(&session);
        tasks.push(tokio::spawn(async move { session.sync_now().await }));
    }
    for task in tasks {
        assert_ok!(task.await.unwrap());
    }

    assert_eq!(local.max_concurrent_calls(), 1);
    assert_eq!(remote.max_concurrent_calls(), 1);
    assert_converged(local.document(), remote.document(), "shared, edited");
    assert_eq!(session.baseline().await.as_deref(), Some("shared, edited"));
    session.disconnect().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disconnect_waits_for_in_flight_pass() {
    suppress_logs();
    let local = Arc::new(
        FlakyEndpoint::new(MemoryDocument::new("")).with_delay(Duration::from_millis(50)),
    );
    let remote = Arc::new(FlakyEndpoint::new(MemoryDocument::new("remote text")));
    let session = SyncSession::new("main.tex", local.clone(), remote.clone(), options());
    session.connect().await.unwrap();

    let pass = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.sync_now().await })
    };
    // Let the pass take the lock before disconnecting
    while local.reads() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    assert_ok!(session.disconnect().await);
    assert_ok!(pass.await.unwrap());
    assert_eq!(local.document().text(), "remote text");
    assert!(!session.is_connected().await);
}
