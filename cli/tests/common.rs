//! # Detonator Integration Test Common Helpers
//!
//! File: cli/tests/common.rs
//!
//! ## Overview
//!
//! Shared helpers for the integration test crates in `cli/tests/`. Each test
//! file declares `mod common;` and uses what it needs.
//!

// Different test files use different helpers.
#![allow(dead_code)]

pub use assert_cmd::Command;
use detonator::{CommandRunner, RunnerSettings};
use std::time::Duration;
use tempfile::TempDir;

/// # Get Detonator Command (`detonator_cmd`)
///
/// Creates an `assert_cmd::Command` for the compiled `detonator` binary.
/// The command runs inside a fresh temporary directory containing an empty
/// `.git` marker, so no `.detonator.toml` from the developer's checkout leaks
/// into the test. The returned `TempDir` must outlive the command.
///
/// ## Panics
/// Panics if the binary cannot be found or the temp dir cannot be created.
pub fn detonator_cmd() -> (Command, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    std::fs::create_dir(dir.path().join(".git")).expect("Failed to create .git marker");
    let mut cmd = Command::cargo_bin("detonator").expect("Failed to find detonator binary for testing");
    cmd.current_dir(dir.path());
    (cmd, dir)
}

/// A runner with short windows so tests stay fast, isolated from other tests.
pub fn test_runner() -> CommandRunner {
    CommandRunner::new(RunnerSettings {
        initial_output_window: Duration::from_millis(50),
        drain_timeout: Duration::from_millis(200),
        ..Default::default()
    })
}

/// `true` while `pid` names a live process. Zombies count as gone: an orphan
/// may wait a moment for init to reap it.
#[cfg(unix)]
pub fn process_alive(pid: i32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    if kill(Pid::from_raw(pid), None).is_err() {
        return false;
    }
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        // Format: `pid (comm) state ...`; comm may itself contain spaces.
        Ok(stat) => stat
            .rsplit_once(')')
            .map_or(true, |(_, rest)| !rest.trim_start().starts_with('Z')),
        Err(_) => true,
    }
}

/// Polls until `pid` is gone or `within` elapses; returns whether it is gone.
#[cfg(unix)]
pub fn wait_for_exit(pid: i32, within: Duration) -> bool {
    let deadline = std::time::Instant::now() + within;
    while std::time::Instant::now() < deadline {
        if !process_alive(pid) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    !process_alive(pid)
}
