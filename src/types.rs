use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// Which family a persisted state record belongs to.
///
/// Both families live in the same state directory and are wiped together by
/// `clean-state`, but they never share a key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Change-detection fingerprint, keyed by task name.
    Fingerprint,
    /// Quality-gate finding count, keyed by gate name.
    Baseline,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Fingerprint => f.write_str("fingerprint"),
            RecordKind::Baseline => f.write_str("baseline"),
        }
    }
}

/// Built-in actions selectable with `builtin = "..."` in the build file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuiltinKind {
    /// Delete every persisted state record and declared report file.
    CleanState,
    /// Print the arguments handed to the task.
    Echo,
}

impl FromStr for BuiltinKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "clean-state" | "clean_state" => Ok(BuiltinKind::CleanState),
            "echo" => Ok(BuiltinKind::Echo),
            other => Err(format!(
                "invalid builtin: {other} (expected \"clean-state\" or \"echo\")"
            )),
        }
    }
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
