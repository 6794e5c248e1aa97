// src/exec/command.rs

use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info};

/// A tool invocation as an explicit argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Run through the local dependency-isolation wrapper (ignored in CI).
    pub wrap: bool,
}

impl ToolCommand {
    pub fn new<P, I, S>(program: P, args: I) -> Self
    where
        P: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            wrap: false,
        }
    }

    /// Build from a full argv (`["black", "-l", "120", "pkg"]`).
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("command must have at least a program name"))?;
        if program.trim().is_empty() {
            return Err(anyhow!("command program name is empty"));
        }
        Ok(Self::new(program.clone(), args.iter().cloned()))
    }

    pub fn wrapped(mut self, wrap: bool) -> Self {
        self.wrap = wrap;
        self
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// `[profile.<name>]` as far as the executor is concerned.
#[derive(Debug, Clone, Default)]
pub struct ProfileSpec {
    /// Search-path style variable to extend, e.g. `PYTHONPATH`.
    pub path_var: Option<String>,
    /// Entries appended to `path_var`.
    pub append: Vec<String>,
    /// Extra variables set for every tool.
    pub env: BTreeMap<String, String>,
}

/// Environment-driven invocation settings, resolved once per process.
#[derive(Debug, Clone, Default)]
pub struct ExecEnv {
    ci: bool,
    wrapper: Vec<String>,
    profile: Option<String>,
    vars: Vec<(String, OsString)>,
}

impl ExecEnv {
    /// Run tools directly with the inherited environment.
    pub fn direct() -> Self {
        Self {
            ci: true,
            ..Self::default()
        }
    }

    /// Resolve invocation settings.
    ///
    /// - CI mode is on when `ci_var` is present in the environment.
    /// - The profile name comes from `profile_var`, falling back to
    ///   `default_profile`; unknown names are an error.
    ///
    /// `lookup` stands in for `std::env::var` so callers (and tests) control
    /// what is visible.
    pub fn resolve<F>(
        ci_var: &str,
        wrapper: &[String],
        profile_var: &str,
        default_profile: Option<&str>,
        profiles: &BTreeMap<String, ProfileSpec>,
        lookup: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ci = lookup(ci_var).is_some();
        let profile = lookup(profile_var)
            .filter(|s| !s.trim().is_empty())
            .or_else(|| default_profile.map(str::to_string));

        let mut vars = Vec::new();
        if let Some(name) = &profile {
            let spec = profiles
                .get(name)
                .ok_or_else(|| anyhow!("unknown build profile '{}' (from {})", name, profile_var))?;

            if let Some(path_var) = &spec.path_var {
                let existing = lookup(path_var).unwrap_or_default();
                let joined = env::join_paths(
                    env::split_paths(&existing)
                        .filter(|p| !p.as_os_str().is_empty())
                        .chain(spec.append.iter().map(PathBuf::from)),
                )
                .with_context(|| format!("building {} for profile '{}'", path_var, name))?;
                debug!(profile = %name, var = %path_var, value = ?joined, "adjusted search path");
                vars.push((path_var.clone(), joined));
            }

            for (key, value) in &spec.env {
                vars.push((key.clone(), OsString::from(value)));
            }
        }

        info!(ci, profile = ?profile, "resolved tool environment");

        Ok(Self {
            ci,
            wrapper: wrapper.to_vec(),
            profile,
            vars,
        })
    }

    pub fn is_ci(&self) -> bool {
        self.ci
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    /// Variables to set on every spawned tool.
    pub fn vars(&self) -> &[(String, OsString)] {
        &self.vars
    }

    /// Final argv for a command, with the local wrapper prepended when the
    /// command asks for it and we are not in CI.
    pub fn argv(&self, cmd: &ToolCommand) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.wrapper.len() + cmd.args.len() + 1);
        if cmd.wrap && !self.ci {
            argv.extend(self.wrapper.iter().cloned());
        }
        argv.push(cmd.program.clone());
        argv.extend(cmd.args.iter().cloned());
        argv
    }
}
