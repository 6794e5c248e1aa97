// src/lib.rs

pub mod actions;
pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod gate;
pub mod logging;
pub mod types;

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::build::{StateMode, build_context, build_graph};
use crate::config::loader::load_and_validate;
use crate::dag::{RunFailure, Runner, TaskReport};
use crate::errors::BuildgateError;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - build file loading and validation
/// - task graph and run context
/// - the sequential runner
/// - the per-task summary
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let root = config_root_dir(&config_path);

    let graph = build_graph(&cfg)?;
    let mode = if args.no_state {
        StateMode::Memory
    } else {
        StateMode::File
    };
    let ctx = build_context(&cfg, &root, mode, |key| std::env::var(key).ok())?
        .with_force(args.force);

    info!(
        root = %root.display(),
        tasks = graph.len(),
        profile = ?ctx.exec().profile(),
        ci = ctx.exec().is_ci(),
        "loaded build file"
    );

    let mut runner = Runner::new(graph, ctx);

    if args.list {
        print_list(&runner);
        return Ok(());
    }

    if args.dry_run {
        let target = match args.task.as_deref() {
            Some(name) => name,
            None => runner
                .graph()
                .default_task()
                .ok_or(BuildgateError::NoDefaultTask)?,
        };
        print_dry_run(&runner, target, &args.args)?;
        return Ok(());
    }

    let outcome = match args.task.as_deref() {
        Some(name) => runner.run(name, &args.args).await,
        None => runner.run_default(&args.args).await,
    };

    match outcome {
        Ok(report) => {
            print_summary(&report.tasks, None);
            println!(
                "{:<24} {:<20} {:>8.2}s",
                "total",
                "",
                report.total_elapsed().as_secs_f64()
            );
            Ok(())
        }
        Err(failure) => {
            print_summary(&failure.completed, Some(&failure));
            Err(failure.into())
        }
    }
}

/// Directory the build file lives in; relative paths resolve against it.
///
/// - If the config path has a non-empty parent (e.g. "ci/Buildgate.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Buildgate.toml" (parent = ""),
///   we fall back to the current working directory "."
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn print_list(runner: &Runner) {
    let default = runner.graph().default_task();
    println!("tasks ({}):", runner.graph().len());
    for (name, prereqs) in runner.list() {
        let marker = if Some(name) == default { " (default)" } else { "" };
        if prereqs.is_empty() {
            println!("  - {name}{marker}");
        } else {
            println!("  - {name}{marker}  after: {}", prereqs.join(", "));
        }
    }
}

fn print_dry_run(runner: &Runner, target: &str, args: &[String]) -> Result<()> {
    let order = runner.graph().resolve(target)?;

    println!("buildgate dry-run: {target}");
    for (i, name) in order.iter().enumerate() {
        println!("  {}. {name}", i + 1);
        let Some(task) = runner.graph().get(name) else {
            continue;
        };
        if let Some(spec) = task.cache_spec() {
            println!("      cache: {:?}", spec.fingerprint);
            if !spec.expect_files.is_empty() {
                println!("      expect_files: {:?}", spec.expect_files);
            }
        }
        if task.is_timed() {
            println!("      timed: true");
        }
        if name == target && !args.is_empty() {
            println!("      args: {:?}", args);
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}

fn print_summary(completed: &[TaskReport], failure: Option<&RunFailure>) {
    for t in completed {
        println!("{:<24} {:<20} {:>8.2}s", t.name, t.status.to_string(), t.elapsed.as_secs_f64());
    }

    if let Some(failure) = failure
        && let Some(task) = &failure.task
    {
        let status = if failure.kind().is_some_and(BuildgateError::is_gate_failure) {
            "FAILED (quality gate)"
        } else {
            "FAILED"
        };
        println!(
            "{:<24} {:<20} {:>8.2}s",
            task,
            status,
            failure.elapsed.as_secs_f64()
        );
    }
}
