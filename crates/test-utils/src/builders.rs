#![allow(dead_code)]

use std::collections::BTreeMap;

use buildgate::config::{
    BuildFile, CacheConfig, CommandSpec, ConfigSection, GateConfig, ProfileConfig, RawBuildFile,
    TaskConfig,
};
use buildgate::types::BuiltinKind;

/// Builder for `BuildFile` to simplify test setup.
pub struct BuildFileBuilder {
    raw: RawBuildFile,
}

impl BuildFileBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawBuildFile {
                config: ConfigSection::default(),
                profile: BTreeMap::new(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.raw.task.insert(name.to_string(), task);
        self
    }

    pub fn with_default(mut self, name: &str) -> Self {
        self.raw.config.default = Some(name.to_string());
        self
    }

    pub fn with_wrapper(mut self, argv: &[&str]) -> Self {
        self.raw.config.wrapper = argv.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_ci_env(mut self, var: &str) -> Self {
        self.raw.config.ci_env = var.to_string();
        self
    }

    pub fn with_profile(mut self, name: &str, profile: ProfileConfig) -> Self {
        self.raw.profile.insert(name.to_string(), profile);
        self
    }

    pub fn raw(self) -> RawBuildFile {
        self.raw
    }

    pub fn build(self) -> BuildFile {
        BuildFile::try_from(self.raw).expect("Failed to build valid build file from builder")
    }
}

impl Default for BuildFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    /// A tool task running `argv`.
    pub fn cmd(argv: &[&str]) -> Self {
        Self {
            task: TaskConfig {
                cmd: Some(CommandSpec::Single(
                    argv.iter().map(|s| s.to_string()).collect(),
                )),
                ..TaskConfig::default()
            },
        }
    }

    /// A tool task running `sh -c <script>`.
    pub fn sh(script: &str) -> Self {
        Self::cmd(&["sh", "-c", script])
    }

    pub fn builtin(kind: BuiltinKind) -> Self {
        Self {
            task: TaskConfig {
                builtin: Some(kind),
                ..TaskConfig::default()
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn wrap(mut self, val: bool) -> Self {
        self.task.wrap = val;
        self
    }

    pub fn timed(mut self, val: bool) -> Self {
        self.task.timed = val;
        self
    }

    pub fn timeout(mut self, duration: &str) -> Self {
        self.task.timeout = Some(duration.to_string());
        self
    }

    pub fn quiet(mut self, val: bool) -> Self {
        self.task.quiet = val;
        self
    }

    pub fn check_exit(mut self, val: bool) -> Self {
        self.task.check_exit = Some(val);
        self
    }

    pub fn track(mut self, pattern: &str) -> Self {
        self.cache().track.push(pattern.to_string());
        self
    }

    pub fn line_count(mut self, file: &str) -> Self {
        self.cache().line_count = Some(file.to_string());
        self
    }

    pub fn expect_file(mut self, file: &str) -> Self {
        self.cache().expect_files.push(file.to_string());
        self
    }

    pub fn rehash_after(mut self, val: bool) -> Self {
        self.cache().rehash_after = val;
        self
    }

    pub fn gate(mut self, gate: GateConfig) -> Self {
        self.task.gate = Some(gate);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }

    fn cache(&mut self) -> &mut CacheConfig {
        self.task.cache.get_or_insert_with(CacheConfig::default)
    }
}
