//! # Detonator Error Types
//!
//! File: cli/src/core/error.rs
//!
//! ## Overview
//!
//! This module defines the error types used throughout Detonator. The runner
//! API returns a typed error so tool front-ends can branch on the failure kind
//! (a missing binary is handled differently from a scan that exited non-zero),
//! while the application layer (config loading, CLI handlers) uses `anyhow` for
//! context-rich propagation.
//!
//! ## Architecture
//!
//! The error system consists of two main components:
//! - `RunnerError`: A `thiserror` enum covering launch, execution, cancellation
//!   and configuration failures.
//! - `Result<T>`: A type alias for `anyhow::Result<T>` for application code.
//!
//! Note that an abnormal process exit observed in streaming mode is **not** an
//! error: it is reported through the termination event as
//! `Outcome::AbnormalExit`. Only blocking mode turns a non-zero exit into
//! `RunnerError::Execution`, because its caller asked for the output of a
//! successful run.
//!
//! ## Examples
//!
//! ```rust,ignore
//! match runner.cancel(pid) {
//!     Ok(()) => println!("Termination requested."),
//!     // Already finished or never existed; nothing to do.
//!     Err(RunnerError::UnknownProcess { .. }) => {}
//!     Err(e) => return Err(e.into()),
//! }
//! ```
//!
use crate::common::process::ProcessId;
use thiserror::Error;

/// Custom error type for the runner API.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The external program could not be started (not found, permission denied, ...).
    /// Raised before any process handle is registered.
    #[error("Failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A blocking invocation ended with a non-zero exit code or a signal.
    /// `output` holds everything collected up to that point; it is not part of
    /// the display text, callers print it through `partial_output`.
    #[error(
        "'{program}' exited with code {} and signal {}.",
        display_code(*.exit_code),
        display_code(*.signal)
    )]
    Execution {
        program: String,
        exit_code: Option<i32>,
        signal: Option<i32>,
        output: String,
    },

    /// A cancellation request targeted an id that is not currently running.
    /// Callers usually treat this as a no-op.
    #[error("No running process with id {id}.")]
    UnknownProcess { id: ProcessId },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RunnerError {
    /// Returns the partial output carried by an `Execution` error, if any.
    pub fn partial_output(&self) -> Option<&str> {
        match self {
            RunnerError::Execution { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// Renders an optional exit code or signal the way termination messages show it.
pub(crate) fn display_code(value: Option<i32>) -> String {
    value.map_or_else(|| "none".to_string(), |v| v.to_string())
}

/// Type alias for Result using anyhow::Error for application-level code.
pub type Result<T> = anyhow::Result<T>;
