//! Shared test utilities for LeafSync test suites
//!
//! # Modules
//!
//! - [`workspace`]: Temp workspaces holding document files
//! - [`cli`]: Command builders with pre-configured environments
//! - [`logging`]: Test logging configuration
//! - [`assertions`]: Domain-specific assertion helpers
//! - [`endpoints`]: Fault-injecting endpoints for sync pass tests
//!
//! # Example
//!
//! ```rust,no_run
//! use leaf_test_helpers::prelude::*;
//!
//! fn my_test() {
//!     let workspace = workspace_with_documents(&[("local.tex", ""), ("remote.tex", "Hello")]);
//!
//!     leaf_command()
//!         .current_dir(workspace.path())
//!         .args(["diff", "local.tex", "remote.tex"])
//!         .assert()
//!         .success();
//! }
//! ```

pub mod assertions;
pub mod cli;
pub mod endpoints;
pub mod logging;
pub mod workspace;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::assertions::*;
    pub use crate::cli::{command_for, leaf_command};
    pub use crate::endpoints::FlakyEndpoint;
    pub use crate::logging::{init_test_logging, suppress_logs};
    pub use crate::workspace::{init_workspace, read_document, temp_dir, workspace_with_documents};
}
