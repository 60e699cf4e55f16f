//! # Detonator Library Root
//!
//! File: cli/src/lib.rs
//!
//! ## Overview
//!
//! Detonator supervises the external tools a security toolkit front-end
//! drives (port scanners, listeners, file-transfer helpers, screenshotters):
//! it launches them, streams their output, cancels them on request and tells
//! the caller how they ended. Tool screens link this library and call
//! `common::process::CommandRunner`; the `detonator` binary is a small
//! command-line caller built on the same API.
//!
//! ## Modules
//!
//! - `common::process`: the runner, registry, output aggregator and classifier
//! - `core`: configuration and error types
//! - `commands`: handlers behind the binary's subcommands
//!
pub mod commands;
pub mod common;
pub mod core;

pub use crate::common::process::{
    CommandRunner, Invocation, Outcome, ProcessEvent, ProcessId, RunnerSettings,
    StreamingInvocation, TerminationResult,
};
pub use crate::core::error::RunnerError;
