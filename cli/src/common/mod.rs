//! # Detonator Common Utilities (`common`)
//!
//! File: cli/src/common/mod.rs
//!
//! ## Overview
//!
//! This module is the organizational entry point for the shared utilities
//! used by the command handlers and by tool front-ends linking the library.
//! It keeps reusable machinery (`common::`) separate from command-specific
//! logic (`commands::`) and core infrastructure (`core::`).
//!
//! ## Architecture
//!
//! - **`process`**: Launching, streaming, cancelling and classifying external
//!   program runs. See `common::process` for details.
//!

/// Supervised execution of external programs (launch, stream, cancel, classify).
pub mod process;
