// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{BuildFile, RawBuildFile};
use crate::errors::Result;

/// Default build file name, looked up in the current working directory.
pub const DEFAULT_BUILD_FILE: &str = "Buildgate.toml";

/// Load a build file and return the raw `RawBuildFile`.
///
/// This only performs TOML deserialization; use [`load_and_validate`] for the
/// semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawBuildFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    parse_str(&contents)
}

pub fn parse_str(contents: &str) -> Result<RawBuildFile> {
    Ok(toml::from_str(contents)?)
}

/// Load a build file from path and validate it.
///
/// Checks unknown or self `after` references, cycles, `cmd`/`builtin`
/// exclusivity, cache/gate/timeout syntax, and that the default task and
/// default profile exist.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<BuildFile> {
    let raw = load_from_path(&path)?;
    BuildFile::try_from(raw)
}
