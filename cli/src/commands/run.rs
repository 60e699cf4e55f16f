//! # Detonator Blocking Run Handler
//!
//! File: cli/src/commands/run.rs
//!
//! ## Overview
//!
//! This module implements the `detonator run` subcommand: launch a program,
//! wait for it to finish and print its cumulative output (stdout and stderr
//! lines in arrival order). It is the terminal counterpart of a tool screen
//! that shows a result only once the scan is complete.
//!
//! ## Architecture
//!
//! 1. Parse `RunArgs` (program plus trailing arguments after `--`).
//! 2. Load the configuration and build a `CommandRunner` from it.
//! 3. Call `CommandRunner::run_blocking_until`, with a stop token tripped by
//!    Ctrl+C so the tool is terminated rather than orphaned.
//! 4. Print the output on success. On a non-zero exit (or after Ctrl+C),
//!    print the partial output and return the `RunnerError::Execution` so
//!    `main` exits with 1.
//!
//! ## Usage
//!
//! ```bash
//! # Port-scan style probe
//! detonator run nc -- -zvn 10.0.0.5 80
//!
//! # Anything on PATH works
//! detonator run uname -- -a
//! ```
//!
use crate::{
    common::process::{CommandRunner, RunnerSettings},
    core::{config, error::Result},
};
use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// # Run Arguments (`RunArgs`)
#[derive(Parser, Debug)]
#[command(about = "Run a program to completion and print its output")]
pub struct RunArgs {
    /// The program to launch (resolved through PATH).
    program: String,

    /// Arguments passed to the program verbatim. Give them after `--`.
    #[arg(last = true)]
    args: Vec<String>,
}

/// # Handle Run Command (`handle_run`)
///
/// Executes the program in blocking mode and prints the cumulative output.
///
/// ## Returns
///
/// * `Ok(())` if the program exited with code 0.
/// * `Err` if the configuration is invalid, the program could not be launched,
///   or it exited non-zero / by signal.
pub async fn handle_run(args: RunArgs) -> Result<()> {
    info!("Handling run command...");
    debug!("Run args: {:?}", args);

    let cfg = config::load_config().context("Failed to load Detonator configuration")?;
    let runner = CommandRunner::new(RunnerSettings::from(&cfg));

    let stop = CancellationToken::new();
    let watcher = tokio::spawn(stop_on_ctrl_c(stop.clone()));
    let result = runner
        .run_blocking_until(args.program.as_str(), args.args.iter().cloned(), stop)
        .await;
    watcher.abort();

    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            Ok(())
        }
        Err(e) => {
            if let Some(partial) = e.partial_output().filter(|p| !p.is_empty()) {
                warn!("'{}' failed after producing output.", args.program);
                println!("{}", partial);
            }
            Err(e.into())
        }
    }
}

/// Trips `stop` on the first Ctrl+C.
async fn stop_on_ctrl_c(stop: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, stopping the running program...");
            stop.cancel();
        }
        Err(e) => warn!("Failed to install Ctrl+C handler: {}", e),
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_parsing() {
        let args = RunArgs::try_parse_from(["run", "nc", "--", "-z", "10.0.0.5", "80"]).unwrap();
        assert_eq!(args.program, "nc");
        assert_eq!(args.args, vec!["-z", "10.0.0.5", "80"]);
    }

    #[test]
    fn test_run_args_without_program_args() {
        let args = RunArgs::try_parse_from(["run", "whoami"]).unwrap();
        assert_eq!(args.program, "whoami");
        assert!(args.args.is_empty());
    }

    #[test]
    fn test_run_args_requires_program() {
        assert!(RunArgs::try_parse_from(["run"]).is_err());
    }
}
