//! # Detonator Process Supervision (`common::process`)
//!
//! File: cli/src/common/process/mod.rs
//!
//! ## Overview
//!
//! This module is the process lifecycle layer every tool front-end delegates
//! to: it launches an external command-line program, streams its output while
//! it runs, lets the caller cancel it by pid, and classifies how it ended.
//! Argument assembly for a particular tool (nmap, nc, dirb, ...) is the
//! caller's business; this layer is a supervised pass-through to the host's
//! process facility and never interprets tool output.
//!
//! ## Architecture
//!
//! - **`handle`**: `ProcessId`, `ProcessHandle` and its `Running → Terminated` lifecycle.
//! - **`output`**: `OutputFragment` and the append-only `OutputAggregator`.
//! - **`classify`**: `TerminationClassifier` mapping exit code / signal to an `Outcome`.
//! - **`registry`**: `ProcessRegistry`, the per-runner table of running processes.
//! - **`runner`**: `CommandRunner`, tying the above together in blocking and streaming mode.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crate::common::process::{CommandRunner, Outcome, RunnerSettings};
//!
//! # async fn scan() -> anyhow::Result<()> {
//! let runner = CommandRunner::new(RunnerSettings::default());
//! let mut listener = runner.run_streaming("nc", ["-lvp", "4444"]).await?;
//!
//! // Later, from a "Cancel" button:
//! runner.cancel(listener.id())?;
//!
//! let end = listener.wait().await;
//! assert_eq!(end.map(|r| r.outcome), Some(Outcome::ManualTermination));
//! # Ok(())
//! # }
//! ```
//!

/// Process identifiers and lifecycle state.
pub mod handle;
/// Output fragments and the cumulative output buffer.
pub mod output;
/// Exit code / signal classification.
pub mod classify;
/// Per-runner table of running processes.
pub mod registry;
/// Blocking and streaming execution.
pub mod runner;

pub use classify::{Outcome, TerminationClassifier, TerminationResult, SIGTERM};
pub use handle::{ProcessHandle, ProcessId, ProcessInfo, ProcessState};
pub use output::{OutputAggregator, OutputChannel, OutputFragment};
pub use registry::ProcessRegistry;
pub use runner::{
    CommandRunner, ExecutionMode, Invocation, ProcessEvent, RunnerSettings, StreamingInvocation,
    Submitted,
};
