// src/exec/mod.rs

//! Process execution layer.
//!
//! External tools (formatter, linter, type-checker, ...) are opaque: we hand
//! them an argument list and read back stdout lines and an exit code.
//!
//! - [`command`] builds argument lists and resolves the CI/local wrapper and
//!   build profile from the environment.
//! - [`process`] spawns one child with `tokio::process`, filters its stdout
//!   incrementally, and enforces an optional timeout.

pub mod command;
pub mod process;

pub use command::{ExecEnv, ProfileSpec, ToolCommand};
pub use process::{ToolOptions, ToolOutput, run_tool};
