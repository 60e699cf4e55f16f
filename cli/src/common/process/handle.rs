//! # Process Handles (`common::process::handle`)
//!
//! File: cli/src/common/process/handle.rs
//!
//! ## Overview
//!
//! A `ProcessHandle` identifies one supervised external program instance and
//! records its lifecycle state. Handles live inside the `ProcessRegistry`;
//! callers only ever see the `ProcessId` (for cancellation) or a read-only
//! `ProcessInfo` snapshot.
//!
//! The lifecycle is a one-way street: `Running` → `Terminated`, exactly once.
//!
use chrono::{DateTime, Utc};
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Platform-assigned process identifier of a supervised child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(u32);

impl ProcessId {
    pub fn from_raw(pid: u32) -> Self {
        Self(pid)
    }

    pub fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Terminated,
}

/// One supervised process, owned by the registry.
#[derive(Debug)]
pub struct ProcessHandle {
    id: ProcessId,
    program: String,
    state: ProcessState,
    started_at: DateTime<Utc>,
    /// Cancelled to ask the supervisor to send the terminate signal.
    cancel: CancellationToken,
}

impl ProcessHandle {
    pub fn new(id: ProcessId, program: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            id,
            program: program.into(),
            state: ProcessState::Running,
            started_at: Utc::now(),
            cancel,
        }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ProcessState::Running
    }

    /// Signals the supervisor that termination was requested.
    /// Cancelling an already cancelled token is a no-op.
    pub(crate) fn request_termination(&self) {
        self.cancel.cancel();
    }

    /// Moves the handle to `Terminated`. Returns `false` if it already was.
    pub(crate) fn mark_terminated(&mut self) -> bool {
        if self.state == ProcessState::Terminated {
            return false;
        }
        self.state = ProcessState::Terminated;
        true
    }

    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            id: self.id,
            program: self.program.clone(),
            state: self.state,
            started_at: self.started_at,
            cancel_requested: self.cancel.is_cancelled(),
        }
    }
}

/// Read-only view of a `ProcessHandle`, safe to hand to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub id: ProcessId,
    pub program: String,
    pub state: ProcessState,
    pub started_at: DateTime<Utc>,
    pub cancel_requested: bool,
}
