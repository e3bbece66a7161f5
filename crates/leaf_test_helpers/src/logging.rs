//! Test logging configuration
//!
//! Tests share one global subscriber per process, so initialization is
//! guarded and later calls are ignored.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

static INIT: Once = Once::new();

/// Route `tracing` output through the test harness at `level`.
///
/// `RUST_LOG` takes precedence when set, e.g.
/// `RUST_LOG=leaf_sync=trace cargo test -p leaf_sync` to watch every merge region.
pub fn init_test_logging(level: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// Only errors, for tests that deliberately break passes
pub fn suppress_logs() {
    init_test_logging("error");
}
