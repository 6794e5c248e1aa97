// src/config/build.rs

//! Turn a validated [`BuildFile`] into a [`TaskGraph`] and a [`RunContext`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::actions::{CleanStateAction, EchoAction, GateSpec, ToolAction};
use crate::cache::{
    CacheSpec, FileStateStore, FingerprintSpec, MemoryStateStore, SourceSet, StateStore,
};
use crate::config::model::{BuildFile, CacheConfig, GateConfig, TaskConfig};
use crate::context::RunContext;
use crate::dag::{Task, TaskAction, TaskGraph, Wrapper};
use crate::exec::{ExecEnv, ProfileSpec, ToolCommand};
use crate::gate::{PatternSet, QualityGate};
use crate::types::{BuiltinKind, parse_duration};

/// Where state lives for this invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMode {
    /// `<root>/<state_dir>`, one file per record.
    File,
    /// In memory; nothing survives the process.
    Memory,
}

/// Register every `[task.<name>]` and the default task.
///
/// Each task's wrappers are `[CacheGate, Timer]` (when configured), so a
/// skipped task is not timed.
pub fn build_graph(cfg: &BuildFile) -> Result<TaskGraph> {
    let mut graph = TaskGraph::new();

    for (name, tc) in cfg.task.iter() {
        let task = build_task(name, tc).with_context(|| format!("building task '{}'", name))?;
        graph.add(task)?;
    }

    if let Some(default) = &cfg.config.default {
        graph.set_default(default)?;
    }

    Ok(graph)
}

/// Build the run context: state store, tool environment, declared reports.
///
/// `lookup` stands in for `std::env::var`.
pub fn build_context<F>(
    cfg: &BuildFile,
    root: &Path,
    mode: StateMode,
    lookup: F,
) -> Result<RunContext>
where
    F: Fn(&str) -> Option<String>,
{
    let store: Box<dyn StateStore> = match mode {
        StateMode::File => Box::new(FileStateStore::new(root.join(&cfg.config.state_dir))),
        StateMode::Memory => Box::new(MemoryStateStore::new()),
    };

    let profiles: BTreeMap<String, ProfileSpec> = cfg
        .profile
        .iter()
        .map(|(name, p)| {
            (
                name.clone(),
                ProfileSpec {
                    path_var: p.path_var.clone(),
                    append: p.append.clone(),
                    env: p.env.clone(),
                },
            )
        })
        .collect();

    let exec = ExecEnv::resolve(
        &cfg.config.ci_env,
        &cfg.config.wrapper,
        &cfg.config.profile_env,
        cfg.config.default_profile.as_deref(),
        &profiles,
        lookup,
    )?;

    Ok(RunContext::new(root, store, exec).with_report_files(report_files(cfg)))
}

/// Report files declared by gated tasks, in task-name order.
pub fn report_files(cfg: &BuildFile) -> Vec<PathBuf> {
    cfg.task
        .values()
        .filter_map(|t| t.gate.as_ref()?.report.as_ref())
        .map(PathBuf::from)
        .collect()
}

fn build_task(name: &str, tc: &TaskConfig) -> Result<Task> {
    let action: Arc<dyn TaskAction> = match (tc.builtin, &tc.cmd) {
        (Some(BuiltinKind::CleanState), _) => Arc::new(CleanStateAction),
        (Some(BuiltinKind::Echo), _) => Arc::new(EchoAction),
        (None, Some(cmd)) => Arc::new(build_tool_action(name, tc, &cmd.steps())?),
        (None, None) => anyhow::bail!("task has neither `cmd` nor `builtin`"),
    };

    let mut task = Task::new(name, tc.after.iter().cloned(), action);

    if let Some(cache) = &tc.cache {
        task = task.with_wrapper(Wrapper::CacheGate(build_cache_spec(cache)?));
    }
    if tc.timed {
        task = task.with_wrapper(Wrapper::Timer);
    }

    Ok(task)
}

fn build_tool_action(name: &str, tc: &TaskConfig, steps: &[&[String]]) -> Result<ToolAction> {
    let commands = steps
        .iter()
        .map(|argv| ToolCommand::from_argv(argv).map(|c| c.wrapped(tc.wrap)))
        .collect::<Result<Vec<_>>>()?;

    let timeout = tc
        .timeout
        .as_deref()
        .map(parse_duration)
        .transpose()
        .map_err(anyhow::Error::msg)?;

    let mut action = ToolAction::new(commands);
    if let Some(gate) = &tc.gate {
        action = action.with_gate(build_gate_spec(name, gate)?);
    }

    Ok(action
        .with_timeout(timeout)
        .with_check_exit(tc.effective_check_exit())
        .with_echo(!tc.quiet))
}

fn build_gate_spec(task_name: &str, gc: &GateConfig) -> Result<GateSpec> {
    let mut gate = QualityGate::new(gc.name.clone().unwrap_or_else(|| task_name.to_string()))
        .with_fatal(PatternSet::parse(&gc.fatal)?)
        .with_exclude(PatternSet::parse(&gc.exclude)?);
    if let Some(max) = gc.max {
        gate = gate.with_max(max);
    }
    if let Some(margin) = gc.margin {
        gate = gate.with_margin(margin);
    }

    Ok(GateSpec {
        gate,
        drop: PatternSet::parse(&gc.drop)?,
        report: gc.report.as_ref().map(PathBuf::from),
    })
}

fn build_cache_spec(cc: &CacheConfig) -> Result<CacheSpec> {
    let fingerprint = match &cc.line_count {
        Some(file) => FingerprintSpec::LineCount(PathBuf::from(file)),
        None => FingerprintSpec::Sources(SourceSet::new(&cc.track, &cc.exclude)?),
    };

    Ok(CacheSpec {
        fingerprint,
        expect_files: cc.expect_files.iter().map(PathBuf::from).collect(),
        rehash_after: cc.rehash_after,
    })
}
