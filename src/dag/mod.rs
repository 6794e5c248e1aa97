// src/dag/mod.rs

//! Task graph representation and execution.
//!
//! - [`task`] defines tasks, their actions and wrapper behaviours.
//! - [`graph`] registers tasks and resolves a task's closure in topological
//!   order, rejecting duplicates and cycles.
//! - [`runner`] executes a closure sequentially, fail-fast.

pub mod graph;
pub mod runner;
pub mod task;

pub use graph::TaskGraph;
pub use runner::{RunFailure, RunReport, Runner, TaskReport, TaskStatus};
pub use task::{ActionFuture, FnAction, Task, TaskAction, Wrapper};
