// src/config/mod.rs

//! Build file loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a build file from disk (`loader.rs`).
//! - Validate invariants like graph acyclicity (`validate.rs`).
//! - Turn a validated file into a task graph and run context (`build.rs`).

pub mod build;
pub mod loader;
pub mod model;
pub mod validate;

pub use build::{StateMode, build_context, build_graph, report_files};
pub use loader::{DEFAULT_BUILD_FILE, load_and_validate, load_from_path, parse_str};
pub use model::{
    BuildFile, CacheConfig, CommandSpec, ConfigSection, GateConfig, ProfileConfig, RawBuildFile,
    TaskConfig,
};
