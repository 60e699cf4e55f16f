//! # Termination Classification (`common::process::classify`)
//!
//! File: cli/src/common/process/classify.rs
//!
//! ## Overview
//!
//! Maps the raw way a process ended (exit code and/or terminating signal) to
//! the three outcomes tool front-ends care about:
//!
//! | Observation                              | Outcome             |
//! |------------------------------------------|---------------------|
//! | exit code `0`, no signal                 | `Success`           |
//! | signal listed in the manual-termination table (default: 15) | `ManualTermination` |
//! | anything else                            | `AbnormalExit`      |
//!
//! The signal table is configurable (`[signals] manual_termination`) because
//! signal numbering is a POSIX convention; on hosts without signals the table
//! simply never matches and a forced kill classifies as `AbnormalExit`.
//!
use crate::core::{config::SignalsConfig, error::display_code};
use std::fmt;

/// Conventional POSIX number for SIGTERM.
pub const SIGTERM: i32 = 15;

/// Semantic outcome of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    ManualTermination,
    AbnormalExit,
}

/// How an invocation ended. Produced exactly once per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationResult {
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub outcome: Outcome,
}

impl TerminationResult {
    /// User-facing summary line for the termination.
    pub fn message(&self) -> String {
        match self.outcome {
            Outcome::Success => "Process completed successfully.".to_string(),
            Outcome::ManualTermination => "Process was manually terminated.".to_string(),
            Outcome::AbnormalExit => format!(
                "Process terminated with exit code: {} and signal code: {}",
                display_code(self.exit_code),
                display_code(self.signal)
            ),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

impl fmt::Display for TerminationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Classifies exit code / signal pairs using a configurable signal table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationClassifier {
    manual_signals: Vec<i32>,
}

impl Default for TerminationClassifier {
    fn default() -> Self {
        Self {
            manual_signals: vec![SIGTERM],
        }
    }
}

impl TerminationClassifier {
    pub fn new(manual_signals: impl Into<Vec<i32>>) -> Self {
        Self {
            manual_signals: manual_signals.into(),
        }
    }

    pub fn from_config(signals: &SignalsConfig) -> Self {
        Self::new(signals.manual_termination.clone())
    }

    pub fn classify(&self, exit_code: Option<i32>, signal: Option<i32>) -> TerminationResult {
        let outcome = match (exit_code, signal) {
            (Some(0), None) => Outcome::Success,
            (_, Some(sig)) if self.manual_signals.contains(&sig) => Outcome::ManualTermination,
            _ => Outcome::AbnormalExit,
        };
        TerminationResult {
            exit_code,
            signal,
            outcome,
        }
    }

    /// Classifies a reaped child's exit status.
    pub fn classify_status(&self, status: &std::process::ExitStatus) -> TerminationResult {
        self.classify(status.code(), exit_signal(status))
    }
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}
