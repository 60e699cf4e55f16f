//! # Detonator Command Modules
//!
//! File: cli/src/commands/mod.rs
//!
//! ## Overview
//!
//! This module aggregates the subcommands of the `detonator` binary. Each one
//! is a thin caller of `common::process::CommandRunner`: it turns parsed
//! arguments into an invocation and prints what the runner hands back.
//!
//! ## Commands
//!
//! - `run`: blocking mode, prints the cumulative output once the program exits
//! - `stream`: streaming mode, prints output live and supports cancellation
//!
//! Each command defines its own arguments struct and `handle_*` function.
//!

/// `detonator run`: run to completion, print the cumulative output.
pub mod run;
/// `detonator stream`: live output, Ctrl+C / `--cancel-after` cancellation.
pub mod stream;
