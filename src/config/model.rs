// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::cache::DEFAULT_STATE_DIR;
use crate::types::BuiltinKind;

/// Top-level build file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// default = "echo"
/// wrapper = ["pipenv", "run"]
///
/// [profile.aws]
/// path_var = "PYTHONPATH"
/// append = ["/opt/build/libs"]
///
/// [task.compile_py]
/// after = ["formatting"]
/// cmd = ["python3", "-m", "compileall", "pkg"]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawBuildFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// Named profiles from `[profile.<name>]`.
    #[serde(default)]
    pub profile: BTreeMap<String, ProfileConfig>,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated build file.
///
/// Can only be obtained through `TryFrom<RawBuildFile>`, so holders may rely
/// on the invariants checked in `config::validate`.
#[derive(Debug, Clone)]
pub struct BuildFile {
    pub config: ConfigSection,
    pub profile: BTreeMap<String, ProfileConfig>,
    pub task: BTreeMap<String, TaskConfig>,
}

impl BuildFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        profile: BTreeMap<String, ProfileConfig>,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self {
            config,
            profile,
            task,
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Task run when none is named on the command line.
    #[serde(default)]
    pub default: Option<String>,

    /// Directory (relative to the build file) holding state records.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// Presence of this variable selects CI mode (tools run directly).
    #[serde(default = "default_ci_env")]
    pub ci_env: String,

    /// Dependency-isolation wrapper prepended to `wrap = true` commands
    /// outside CI, e.g. `["pipenv", "run"]`.
    #[serde(default)]
    pub wrapper: Vec<String>,

    /// Variable naming the active `[profile.<name>]`.
    #[serde(default = "default_profile_env")]
    pub profile_env: String,

    /// Profile used when `profile_env` is unset.
    #[serde(default)]
    pub default_profile: Option<String>,
}

fn default_state_dir() -> String {
    DEFAULT_STATE_DIR.to_string()
}

fn default_ci_env() -> String {
    "GH_ACTIONS".to_string()
}

fn default_profile_env() -> String {
    "BUILDGATE_PROFILE".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            default: None,
            state_dir: default_state_dir(),
            ci_env: default_ci_env(),
            wrapper: Vec::new(),
            profile_env: default_profile_env(),
            default_profile: None,
        }
    }
}

/// `[profile.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    #[serde(default)]
    pub path_var: Option<String>,
    #[serde(default)]
    pub append: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// `cmd` accepts one argv or a list of argvs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    Single(Vec<String>),
    Steps(Vec<Vec<String>>),
}

impl CommandSpec {
    pub fn steps(&self) -> Vec<&[String]> {
        match self {
            CommandSpec::Single(argv) => vec![argv.as_slice()],
            CommandSpec::Steps(steps) => steps.iter().map(Vec::as_slice).collect(),
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Prerequisites, run in this order before the task.
    #[serde(default)]
    pub after: Vec<String>,

    /// Tool command(s). Mutually exclusive with `builtin`.
    #[serde(default)]
    pub cmd: Option<CommandSpec>,

    #[serde(default)]
    pub builtin: Option<BuiltinKind>,

    /// Run `cmd` through `[config].wrapper` outside CI.
    #[serde(default)]
    pub wrap: bool,

    /// Log wall-clock time for this task.
    #[serde(default)]
    pub timed: bool,

    /// Per-command timeout, e.g. `"120s"`.
    #[serde(default)]
    pub timeout: Option<String>,

    /// Skip-if-unchanged behaviour.
    #[serde(default)]
    pub cache: Option<CacheConfig>,

    /// Quality gate over the last command's output.
    #[serde(default)]
    pub gate: Option<GateConfig>,

    /// Override whether a non-zero exit of the last command fails the task.
    /// Defaults to `true` without a gate and `false` with one.
    #[serde(default)]
    pub check_exit: Option<bool>,

    /// Don't echo tool output.
    #[serde(default)]
    pub quiet: bool,
}

impl TaskConfig {
    pub fn effective_check_exit(&self) -> bool {
        self.check_exit.unwrap_or(self.gate.is_none())
    }
}

/// `cache = { ... }` inside a task.
///
/// Exactly one of `track` or `line_count` selects the fingerprint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default)]
    pub track: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub line_count: Option<String>,
    #[serde(default)]
    pub expect_files: Vec<String>,
    /// Record the fingerprint taken after the task ran.
    #[serde(default)]
    pub rehash_after: bool,
}

/// `gate = { ... }` inside a task.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateConfig {
    /// Baseline key; defaults to the task name.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub report: Option<String>,
    #[serde(default)]
    pub drop: Vec<String>,
    #[serde(default)]
    pub fatal: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub max: Option<usize>,
    #[serde(default)]
    pub margin: Option<usize>,
}
