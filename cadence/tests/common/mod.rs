//! Shared integration-test harness for running the `cadence` binary.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

/// Runs `cadence` with `args` to completion and captures its output.
///
/// Logging is pinned to errors so stderr only carries failures.
#[allow(clippy::missing_panics_doc)]
pub fn run(args: &[&str]) -> Output {
    command(args)
        .stdin(Stdio::null())
        .output()
        .expect("failed to run cadence")
}

/// A `cadence` command with a clean, deterministic environment.
#[allow(clippy::missing_panics_doc)]
pub fn command(args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cadence"));
    cmd.args(args)
        .env_remove("CADENCE_SEQUENCE")
        .env_remove("CADENCE_EVENTS_FILE")
        .env_remove("CADENCE_LOG_FORMAT")
        .env("CADENCE_LOG_LEVEL", "error")
        .env("CADENCE_COLOR", "never");
    cmd
}

/// Path to a file under `tests/fixtures`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Fixture path as `&str`-friendly `String`.
#[allow(clippy::missing_panics_doc)]
pub fn fixture(name: &str) -> String {
    fixture_path(name)
        .to_str()
        .expect("non-UTF-8 fixture path")
        .to_string()
}

/// Stdout split into lines.
pub fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}

/// Parses every stdout line as JSON.
#[allow(clippy::missing_panics_doc)]
pub fn json_lines(output: &Output) -> Vec<serde_json::Value> {
    stdout_lines(output)
        .iter()
        .map(|line| serde_json::from_str(line).expect("stdout line is not JSON"))
        .collect()
}
