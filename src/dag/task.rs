// src/dag/task.rs

//! Task definitions: a name, ordered prerequisites, an action, and the
//! wrapper behaviours applied around that action.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::cache::CacheSpec;
use crate::context::RunContext;
use crate::types::TaskName;

/// Future returned by [`TaskAction::invoke`].
pub type ActionFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// The core work of a task.
///
/// Production actions spawn external tools; tests typically use [`FnAction`]
/// to record what ran.
pub trait TaskAction: Send + Sync {
    fn invoke<'a>(&'a self, ctx: &'a mut RunContext, args: &'a [String]) -> ActionFuture<'a>;
}

/// Adapter turning a synchronous closure into a [`TaskAction`].
pub struct FnAction<F> {
    f: F,
}

impl<F> FnAction<F>
where
    F: Fn(&mut RunContext, &[String]) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> TaskAction for FnAction<F>
where
    F: Fn(&mut RunContext, &[String]) -> anyhow::Result<()> + Send + Sync,
{
    fn invoke<'a>(&'a self, ctx: &'a mut RunContext, args: &'a [String]) -> ActionFuture<'a> {
        Box::pin(async move { (self.f)(ctx, args) })
    }
}

/// Behaviour layered around a task's action.
///
/// Wrappers are listed outermost first: with `[CacheGate, Timer]` a skipped
/// task never starts its timer.
#[derive(Debug, Clone)]
pub enum Wrapper {
    /// Skip the action when the fingerprint is unchanged; record it after a
    /// successful run.
    CacheGate(CacheSpec),
    /// Log the wall-clock time spent inside this wrapper.
    Timer,
}

/// A named unit of work.
#[derive(Clone)]
pub struct Task {
    pub name: TaskName,
    /// Run before this task, in this order.
    pub prerequisites: Vec<TaskName>,
    pub action: Arc<dyn TaskAction>,
    pub wrappers: Vec<Wrapper>,
}

impl Task {
    pub fn new<N, I, S>(name: N, prerequisites: I, action: Arc<dyn TaskAction>) -> Self
    where
        N: Into<TaskName>,
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        Self {
            name: name.into(),
            prerequisites: prerequisites.into_iter().map(Into::into).collect(),
            action,
            wrappers: Vec::new(),
        }
    }

    pub fn with_wrapper(mut self, wrapper: Wrapper) -> Self {
        self.wrappers.push(wrapper);
        self
    }

    pub fn cache_spec(&self) -> Option<&CacheSpec> {
        self.wrappers.iter().find_map(|w| match w {
            Wrapper::CacheGate(spec) => Some(spec),
            Wrapper::Timer => None,
        })
    }

    pub fn is_timed(&self) -> bool {
        self.wrappers.iter().any(|w| matches!(w, Wrapper::Timer))
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("prerequisites", &self.prerequisites)
            .field("wrappers", &self.wrappers)
            .finish_non_exhaustive()
    }
}
