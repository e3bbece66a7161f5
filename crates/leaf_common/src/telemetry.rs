//! Telemetry and logging initialization
//!
//! Provides structured logging with `tracing` and `tracing-subscriber`.
//! Logs always go to stderr; stdout carries command output (merged text, edit JSON).

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber
///
/// # Arguments
/// * `verbose` - If true, sets log level to DEBUG, otherwise INFO
/// * `json_format` - If true, outputs logs in JSON format for machine parsing
///
/// Returns false if a subscriber was already installed.
///
/// # Example
/// ```
/// leaf_common::telemetry::init_tracing(false, false);
/// tracing::info!("Application started");
/// ```
pub fn init_tracing(verbose: bool, json_format: bool) -> bool {
    let filter_level = if verbose {
        "debug,tokio=info"
    } else {
        "info"
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_level));

    if json_format {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .compact(),
            )
            .with(env_filter)
            .try_init()
            .is_ok()
    }
}
