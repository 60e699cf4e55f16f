//! # Process Registry (`common::process::registry`)
//!
//! File: cli/src/common/process/registry.rs
//!
//! ## Overview
//!
//! The registry maps `ProcessId` → `ProcessHandle` for every process a runner
//! is currently supervising. It is the only shared mutable structure in the
//! subsystem: supervisors insert on launch and remove on termination, callers
//! look up entries when they ask for cancellation.
//!
//! ## Architecture
//!
//! - The registry is a cheap-to-clone handle around
//!   `Arc<Mutex<HashMap<..>>>`. Each `CommandRunner` owns its own instance, so
//!   isolated runners (e.g. in tests) never see each other's processes.
//! - Every operation takes the lock once and never holds it across an `.await`.
//! - Cancellation does not signal the OS process directly. It cancels the
//!   handle's token and the supervisor, which owns the `Child`, delivers the
//!   signal. A pid that has already been reaped is never signalled.
//!
use super::handle::{ProcessHandle, ProcessId, ProcessInfo};
use crate::core::error::RunnerError;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, warn};

/// Table of running processes, keyed by pid.
#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    entries: Arc<Mutex<HashMap<ProcessId, ProcessHandle>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ProcessId, ProcessHandle>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a freshly launched handle.
    pub fn register(&self, handle: ProcessHandle) {
        let id = handle.id();
        if let Some(stale) = self.lock().insert(id, handle) {
            // The OS only reuses a pid after the previous owner was reaped, which
            // always deregisters first. Reaching this means bookkeeping drifted.
            warn!("Replaced stale registry entry for pid {} ({:?}).", id, stale.state());
        }
        debug!("Registered process {}.", id);
    }

    /// Removes `id` and returns its handle in the `Terminated` state.
    /// Removing an unknown id is a no-op and returns `None`.
    pub fn deregister(&self, id: ProcessId) -> Option<ProcessHandle> {
        let mut removed = self.lock().remove(&id)?;
        removed.mark_terminated();
        debug!("Deregistered process {}.", id);
        Some(removed)
    }

    /// Asks the supervisor of `id` to terminate it.
    ///
    /// # Errors
    ///
    /// `RunnerError::UnknownProcess` when `id` is not registered or no longer
    /// running. The registry is left untouched in that case.
    pub fn request_cancel(&self, id: ProcessId) -> Result<(), RunnerError> {
        let entries = self.lock();
        match entries.get(&id) {
            Some(handle) if handle.is_running() => {
                handle.request_termination();
                debug!("Termination requested for process {}.", id);
                Ok(())
            }
            _ => Err(RunnerError::UnknownProcess { id }),
        }
    }

    pub fn get(&self, id: ProcessId) -> Option<ProcessInfo> {
        self.lock().get(&id).map(ProcessHandle::info)
    }

    pub fn contains(&self, id: ProcessId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Ids of all running processes, sorted.
    pub fn running_ids(&self) -> Vec<ProcessId> {
        let mut ids: Vec<ProcessId> = self
            .lock()
            .values()
            .filter(|h| h.is_running())
            .map(ProcessHandle::id)
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
