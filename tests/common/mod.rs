//! Shared test infrastructure for integration tests.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Captured result of one `provision` invocation.
#[derive(Debug)]
pub struct RunOutput {
    pub status: std::process::ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

fn provision_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_provision"))
}

/// Run the binary with a scrubbed environment so ambient settings cannot leak in.
pub fn provision(args: &[&str]) -> RunOutput {
    let output = Command::new(provision_binary())
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("PROVISION_BASE_URL")
        .env_remove("PROVISION_CACHE")
        .output()
        .expect("spawn provision binary");
    RunOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}

pub fn write_cache_file(path: &Path, document: &serde_json::Value) {
    let text = serde_json::to_string_pretty(document).expect("serialize cache");
    std::fs::write(path, text).expect("write cache file");
}
