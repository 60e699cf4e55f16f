//! # Detonator Streaming Run Handler
//!
//! File: cli/src/commands/stream.rs
//!
//! ## Overview
//!
//! This module implements the `detonator stream` subcommand: launch a program
//! in streaming mode, print each output line as it arrives, and report how the
//! process ended. It mirrors what a long-running tool screen does (listeners,
//! screenshotters, slow scans) including its "Cancel" button:
//!
//! - Ctrl+C requests cancellation through `CommandRunner::cancel` and then
//!   keeps streaming until the termination event arrives.
//! - `--cancel-after <MS>` does the same on a timer.
//!
//! Output lines go to stdout; the pid banner and the termination message go to
//! stderr, so stdout can be piped into a file untouched.
//!
//! ## Usage
//!
//! ```bash
//! # Follow a listener until Ctrl+C
//! detonator stream nc -- -lvnp 4444
//!
//! # Give a slow tool five seconds
//! detonator stream --cancel-after 5000 nmap -- -sV 10.0.0.0/24
//! ```
//!
use crate::{
    common::process::{CommandRunner, Outcome, ProcessId, RunnerSettings},
    core::{config, error::Result},
};
use anyhow::{anyhow, Context};
use clap::Parser;
use std::time::Duration;
use tracing::{debug, info, warn};

/// # Stream Arguments (`StreamArgs`)
#[derive(Parser, Debug)]
#[command(about = "Run a program and stream its output live (Ctrl+C cancels it)")]
pub struct StreamArgs {
    /// The program to launch (resolved through PATH).
    program: String,

    /// Optional: cancel the program after this many milliseconds.
    #[arg(long, value_name = "MS")]
    cancel_after: Option<u64>,

    /// Arguments passed to the program verbatim. Give them after `--`.
    #[arg(last = true)]
    args: Vec<String>,
}

/// # Handle Stream Command (`handle_stream`)
///
/// ## Returns
///
/// * `Ok(())` when the process completed successfully or was cancelled.
/// * `Err` if the configuration is invalid, the program could not be launched,
///   or it ended abnormally (the error carries the termination message).
pub async fn handle_stream(args: StreamArgs) -> Result<()> {
    info!("Handling stream command...");
    debug!("Stream args: {:?}", args);

    let cfg = config::load_config().context("Failed to load Detonator configuration")?;
    let runner = CommandRunner::new(RunnerSettings::from(&cfg));

    let mut invocation = runner
        .run_streaming(args.program.as_str(), args.args.iter().cloned())
        .await
        .with_context(|| format!("Failed to start '{}'", args.program))?;
    let pid = invocation.id();
    eprintln!("Started '{}' (pid {}).", args.program, pid);

    // Every fragment, including those in the initial snapshot, also arrives as an event.
    let watcher = tokio::spawn(cancel_on_request(runner.clone(), pid, args.cancel_after));
    let termination = invocation
        .drive(
            |fragment| println!("{}", fragment.text),
            |end| eprintln!("{}", end),
        )
        .await;
    watcher.abort();

    match termination {
        Some(end) if matches!(end.outcome, Outcome::Success | Outcome::ManualTermination) => Ok(()),
        Some(end) => Err(anyhow!(end.message())),
        None => Err(anyhow!(
            "Lost track of process {} before it reported termination.",
            pid
        )),
    }
}

/// Waits for Ctrl+C or the optional deadline, then asks the runner to cancel `pid`.
async fn cancel_on_request(runner: CommandRunner, pid: ProcessId, after_ms: Option<u64>) {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, cancelling process {}...", pid),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    let deadline = async {
        match after_ms {
            Some(ms) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                info!("--cancel-after {} ms elapsed, cancelling process {}...", ms, pid);
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        () = ctrl_c => {}
        () = deadline => {}
    }

    // The process may already be gone; that is fine.
    if let Err(e) = runner.cancel(pid) {
        debug!("{}", e);
    }
}
