// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::config::DEFAULT_BUILD_FILE;

/// Command-line arguments for `buildgate`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "buildgate",
    version,
    about = "Run build tasks in dependency order, skipping unchanged work and gating on analysis results.",
    long_about = None
)]
pub struct CliArgs {
    /// Task to run. Defaults to `[config].default`.
    #[arg(value_name = "TASK")]
    pub task: Option<String>,

    /// Arguments handed to TASK only (not to its prerequisites).
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Path to the build file (TOML).
    ///
    /// Default: `Buildgate.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_BUILD_FILE)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDGATE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print the tasks and their prerequisites, then exit.
    #[arg(long)]
    pub list: bool,

    /// Print the resolved execution order without running anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Run cache-gated tasks even when nothing changed.
    #[arg(long)]
    pub force: bool,

    /// Keep state in memory only; nothing is read from or written to disk.
    #[arg(long)]
    pub no_state: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
