// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Graph errors (`DuplicateTask`, `CyclicDependency`, `NoDefaultTask`,
//! `UnknownTask`) are raised before any task runs. Gate and subprocess errors
//! are raised from inside task actions and travel through `anyhow::Error`; use
//! `downcast_ref::<BuildgateError>()` to recover them.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildgateError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Task already registered: {0}")]
    DuplicateTask(String),

    #[error("Task not found: {0}")]
    UnknownTask(String),

    #[error("Cyclic dependency: {0}")]
    CyclicDependency(String),

    #[error("No task given and no default task configured")]
    NoDefaultTask,

    #[error("{check}: {count} fatal finding(s)")]
    FatalQuality { check: String, count: usize },

    #[error("{check}: too many findings: {count} out of max of {max}")]
    ThresholdExceeded {
        check: String,
        count: usize,
        max: usize,
    },

    #[error("{check} got worse: {current} findings, previously {previous} (margin {margin})")]
    Regression {
        check: String,
        current: usize,
        previous: usize,
        margin: usize,
    },

    #[error("{program}: {reason}")]
    SubprocessFailure { program: String, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BuildgateError {
    /// Whether this error came from a quality gate.
    pub fn is_gate_failure(&self) -> bool {
        matches!(
            self,
            BuildgateError::FatalQuality { .. }
                | BuildgateError::ThresholdExceeded { .. }
                | BuildgateError::Regression { .. }
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildgateError>;
