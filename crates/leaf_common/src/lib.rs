//! Common error types and telemetry for LeafSync
//!
//! This crate provides the pieces shared by the sync engine, the config
//! loader and the CLI.

pub mod telemetry;

use thiserror::Error;

/// Errors outside the sync pass itself (configuration, files)
#[derive(Error, Debug)]
pub enum LeafError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, LeafError>;

/// Exit code constants
pub const EXIT_ERROR: i32 = 1;
/// `leaf merge` found conflicting regions (output still written, remote wins)
pub const EXIT_CONFLICT: i32 = 3;
pub const EXIT_CONFIG_ERROR: i32 = 101;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LeafError::FileNotFound {
            path: "main.tex".to_string(),
        };
        assert_eq!(err.to_string(), "File not found: main.tex");

        let err = LeafError::ConfigError("interval_ms must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: interval_ms must be positive"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: LeafError = io.into();
        assert_eq!(err.to_string(), "IO error: gone");
    }
}
