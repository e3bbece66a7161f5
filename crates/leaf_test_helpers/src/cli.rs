//! Command builders for the `leaf` binary

use assert_cmd::Command;

/// `leaf` with `RUST_LOG=error`
pub fn leaf_command() -> Command {
    command_for("leaf")
}

/// Any workspace binary with the same clean environment
#[allow(deprecated)]
pub fn command_for(bin_name: &str) -> Command {
    let mut cmd = Command::cargo_bin(bin_name)
        .unwrap_or_else(|_| panic!("Failed to find {} binary", bin_name));
    cmd.env("RUST_LOG", "error");
    cmd
}
