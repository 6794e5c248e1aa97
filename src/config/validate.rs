// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{BuildFile, CacheConfig, GateConfig, RawBuildFile, TaskConfig};
use crate::errors::{BuildgateError, Result};
use crate::gate::PatternSet;
use crate::types::parse_duration;

impl TryFrom<RawBuildFile> for BuildFile {
    type Error = BuildgateError;

    fn try_from(raw: RawBuildFile) -> std::result::Result<Self, Self::Error> {
        validate_raw(&raw)?;
        Ok(BuildFile::new_unchecked(raw.config, raw.profile, raw.task))
    }
}

fn validate_raw(cfg: &RawBuildFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    for (name, task) in cfg.task.iter() {
        validate_task(name, task)?;
    }
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> BuildgateError {
    BuildgateError::ConfigError(msg.into())
}

fn ensure_has_tasks(cfg: &RawBuildFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(config_error(
            "build file must contain at least one [task.<name>] section",
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawBuildFile) -> Result<()> {
    if let Some(default) = &cfg.config.default {
        if !cfg.task.contains_key(default) {
            return Err(config_error(format!(
                "[config].default names unknown task '{}'",
                default
            )));
        }
    }

    if cfg.config.state_dir.trim().is_empty() {
        return Err(config_error("[config].state_dir must not be empty"));
    }

    if let Some(profile) = &cfg.config.default_profile {
        if !cfg.profile.contains_key(profile) {
            return Err(config_error(format!(
                "[config].default_profile names unknown profile '{}'",
                profile
            )));
        }
    }

    if cfg.config.wrapper.iter().any(|a| a.trim().is_empty()) {
        return Err(config_error("[config].wrapper must not contain empty arguments"));
    }

    Ok(())
}

fn validate_task(name: &str, task: &TaskConfig) -> Result<()> {
    match (&task.cmd, &task.builtin) {
        (Some(_), Some(_)) => {
            return Err(config_error(format!(
                "task '{}' sets both `cmd` and `builtin`",
                name
            )));
        }
        (None, None) => {
            return Err(config_error(format!(
                "task '{}' needs either `cmd` or `builtin`",
                name
            )));
        }
        (Some(cmd), None) => {
            let steps = cmd.steps();
            if steps.is_empty() {
                return Err(config_error(format!("task '{}' has an empty `cmd`", name)));
            }
            for argv in steps {
                if argv.first().is_none_or(|p| p.trim().is_empty()) {
                    return Err(config_error(format!(
                        "task '{}' has a command without a program name",
                        name
                    )));
                }
            }
        }
        (None, Some(_)) => {
            if task.gate.is_some() {
                return Err(config_error(format!(
                    "task '{}': `gate` only applies to `cmd` tasks",
                    name
                )));
            }
        }
    }

    if let Some(timeout) = &task.timeout {
        parse_duration(timeout)
            .map_err(|e| config_error(format!("task '{}': invalid timeout: {}", name, e)))?;
    }

    if let Some(cache) = &task.cache {
        validate_cache(name, cache)?;
    }

    if let Some(gate) = &task.gate {
        validate_gate(name, gate)?;
    }

    Ok(())
}

fn validate_cache(name: &str, cache: &CacheConfig) -> Result<()> {
    match (cache.track.is_empty(), &cache.line_count) {
        (false, Some(_)) => Err(config_error(format!(
            "task '{}': cache sets both `track` and `line_count`",
            name
        ))),
        (true, None) => Err(config_error(format!(
            "task '{}': cache needs `track` patterns or a `line_count` file",
            name
        ))),
        _ => Ok(()),
    }
}

fn validate_gate(name: &str, gate: &GateConfig) -> Result<()> {
    for (field, patterns) in [
        ("drop", &gate.drop),
        ("fatal", &gate.fatal),
        ("exclude", &gate.exclude),
    ] {
        PatternSet::parse(patterns).map_err(|e| {
            config_error(format!("task '{}': gate.{}: {:#}", name, field, e))
        })?;
    }
    Ok(())
}

fn validate_task_dependencies(cfg: &RawBuildFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if dep == name {
                return Err(BuildgateError::CyclicDependency(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
            if !cfg.task.contains_key(dep) {
                return Err(config_error(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawBuildFile) -> Result<()> {
    // Edge direction: dep -> task.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(BuildgateError::CyclicDependency(format!(
            "cycle detected in task graph involving task '{}'",
            cycle.node_id()
        ))),
    }
}
