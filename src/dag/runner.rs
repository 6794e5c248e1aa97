// src/dag/runner.rs

//! Sequential, fail-fast execution of a task closure.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::cache::{self, CacheDecision};
use crate::context::RunContext;
use crate::dag::graph::TaskGraph;
use crate::dag::task::{Task, Wrapper};
use crate::errors::BuildgateError;
use crate::types::TaskName;

/// How a task ended in a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Executed,
    /// Cache gate found no change.
    Skipped,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Executed => f.write_str("ok"),
            TaskStatus::Skipped => f.write_str("skipped, no change"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub name: TaskName,
    pub status: TaskStatus,
    pub elapsed: Duration,
}

/// Every task of a successful run, in execution order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub tasks: Vec<TaskReport>,
}

impl RunReport {
    pub fn names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn executed(&self) -> impl Iterator<Item = &TaskReport> {
        self.tasks.iter().filter(|t| t.status == TaskStatus::Executed)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &TaskReport> {
        self.tasks.iter().filter(|t| t.status == TaskStatus::Skipped)
    }

    pub fn total_elapsed(&self) -> Duration {
        self.tasks.iter().map(|t| t.elapsed).sum()
    }
}

/// Why a run stopped.
#[derive(Debug)]
pub struct RunFailure {
    /// The task whose action failed; `None` if resolution failed before
    /// anything ran.
    pub task: Option<TaskName>,
    pub error: anyhow::Error,
    /// How long the failing task ran; zero when nothing ran.
    pub elapsed: Duration,
    /// Tasks that finished before the failure.
    pub completed: Vec<TaskReport>,
}

impl RunFailure {
    /// The typed error behind this failure, if it is one of ours.
    pub fn kind(&self) -> Option<&BuildgateError> {
        self.error.downcast_ref::<BuildgateError>()
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.task {
            Some(task) => write!(f, "task '{}' failed: {:#}", task, self.error),
            None => write!(f, "{:#}", self.error),
        }
    }
}

impl std::error::Error for RunFailure {}

/// Owns the task graph and the run context for one invocation.
#[derive(Debug)]
pub struct Runner {
    graph: TaskGraph,
    ctx: RunContext,
}

impl Runner {
    pub fn new(graph: TaskGraph, ctx: RunContext) -> Self {
        Self { graph, ctx }
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut RunContext {
        &mut self.ctx
    }

    /// Task names with their prerequisites, in registration order.
    pub fn list(&self) -> Vec<(&str, &[TaskName])> {
        self.graph
            .tasks()
            .map(|t| (t.name.as_str(), t.prerequisites.as_slice()))
            .collect()
    }

    /// Run the default task.
    pub async fn run_default(&mut self, args: &[String]) -> Result<RunReport, RunFailure> {
        let Some(name) = self.graph.default_task().map(str::to_string) else {
            return Err(RunFailure {
                task: None,
                error: BuildgateError::NoDefaultTask.into(),
                elapsed: Duration::ZERO,
                completed: Vec::new(),
            });
        };
        self.run(&name, args).await
    }

    /// Run `name` and its transitive prerequisites, each exactly once.
    ///
    /// `args` go to `name` only. The first failure stops the run.
    pub async fn run(&mut self, name: &str, args: &[String]) -> Result<RunReport, RunFailure> {
        let order = self.graph.resolve(name).map_err(|e| RunFailure {
            task: None,
            error: e.into(),
            elapsed: Duration::ZERO,
            completed: Vec::new(),
        })?;

        info!(task = %name, order = ?order, "resolved task closure");

        let mut report = RunReport::default();
        for task_name in &order {
            let Some(task) = self.graph.get(task_name).cloned() else {
                // resolve() only returns registered names.
                continue;
            };
            let task_args: &[String] = if task_name == name { args } else { &[] };

            let started = Instant::now();
            match execute_task(&task, &mut self.ctx, task_args).await {
                Ok(task_report) => report.tasks.push(task_report),
                Err(err) => {
                    let elapsed = started.elapsed();
                    error!(
                        task = %task_name,
                        elapsed_ms = elapsed.as_millis() as u64,
                        error = %format!("{err:#}"),
                        "task failed; stopping run"
                    );
                    return Err(RunFailure {
                        task: Some(task_name.clone()),
                        error: err,
                        elapsed,
                        completed: report.tasks,
                    });
                }
            }
        }

        info!(
            task = %name,
            executed = report.executed().count(),
            skipped = report.skipped().count(),
            "run finished"
        );
        Ok(report)
    }
}

/// Apply the task's wrappers (outermost first) around its action.
async fn execute_task(
    task: &Task,
    ctx: &mut RunContext,
    args: &[String],
) -> anyhow::Result<TaskReport> {
    let started = Instant::now();
    // Each entered wrapper keeps its entry time and, for cache gates, the
    // fingerprint taken before the action ran.
    let mut entered: Vec<(&Wrapper, Instant, Option<String>)> =
        Vec::with_capacity(task.wrappers.len());
    let mut status = TaskStatus::Executed;

    for wrapper in &task.wrappers {
        let mut pre_run = None;
        if let Wrapper::CacheGate(spec) = wrapper {
            match cache::decide(&task.name, spec, ctx) {
                CacheDecision::Skip => {
                    info!(task = %task.name, "skipped, no change");
                    status = TaskStatus::Skipped;
                    break;
                }
                CacheDecision::Run {
                    reason,
                    fingerprint,
                } => {
                    debug!(task = %task.name, reason, "cache gate: running");
                    pre_run = fingerprint;
                }
            }
        }
        entered.push((wrapper, Instant::now(), pre_run));
    }

    let result = if status == TaskStatus::Skipped {
        Ok(())
    } else {
        info!(task = %task.name, "running task");
        task.action.invoke(ctx, args).await
    };

    for (wrapper, entered_at, pre_run) in entered.iter().rev() {
        match wrapper {
            Wrapper::Timer => {
                let elapsed = entered_at.elapsed();
                info!(
                    task = %task.name,
                    elapsed_ms = elapsed.as_millis() as u64,
                    ok = result.is_ok(),
                    "timed"
                );
            }
            Wrapper::CacheGate(spec) => {
                if result.is_ok() {
                    cache::record(&task.name, spec, pre_run.as_deref(), ctx);
                }
            }
        }
    }

    result.map(|()| TaskReport {
        name: task.name.clone(),
        status,
        elapsed: started.elapsed(),
    })
}
