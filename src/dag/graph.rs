// src/dag/graph.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::dag::task::{Task, TaskAction};
use crate::errors::{BuildgateError, Result};
use crate::types::TaskName;

/// Registry of tasks keyed by name, plus the optional default task.
///
/// Acyclicity is maintained on every registration, and re-checked while
/// resolving a closure so that a bad graph can never recurse forever.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: HashMap<TaskName, Task>,
    /// Registration order, for listings.
    order: Vec<TaskName>,
    default: Option<TaskName>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task.
    ///
    /// Prerequisites need not be registered yet; missing ones surface as
    /// [`BuildgateError::UnknownTask`] when a closure containing them is
    /// resolved.
    pub fn add(&mut self, task: Task) -> Result<()> {
        if self.tasks.contains_key(&task.name) {
            return Err(BuildgateError::DuplicateTask(task.name));
        }

        if let Some(path) = self.cycle_through(&task) {
            return Err(BuildgateError::CyclicDependency(path.join(" -> ")));
        }

        debug!(task = %task.name, prerequisites = ?task.prerequisites, "registered task");
        self.order.push(task.name.clone());
        self.tasks.insert(task.name.clone(), task);
        Ok(())
    }

    /// Register a bare task without wrappers.
    pub fn register<N, I, S>(&mut self, name: N, prerequisites: I, action: Arc<dyn TaskAction>) -> Result<()>
    where
        N: Into<TaskName>,
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        self.add(Task::new(name, prerequisites, action))
    }

    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.tasks.contains_key(name) {
            return Err(BuildgateError::UnknownTask(name.to_string()));
        }
        self.default = Some(name.to_string());
        Ok(())
    }

    pub fn default_task(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks in registration order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|n| self.tasks.get(n))
    }

    /// The closure of `name` in execution order.
    ///
    /// Depth-first post-order over prerequisites in declaration order: every
    /// task appears once, after all of its prerequisites, and the order is
    /// the same on every call.
    pub fn resolve(&self, name: &str) -> Result<Vec<TaskName>> {
        if !self.tasks.contains_key(name) {
            return Err(BuildgateError::UnknownTask(name.to_string()));
        }

        let mut order = Vec::new();
        let mut done = HashSet::new();
        let mut path = Vec::new();
        self.visit(name, &mut path, &mut done, &mut order)?;
        Ok(order)
    }

    fn visit(
        &self,
        name: &str,
        path: &mut Vec<TaskName>,
        done: &mut HashSet<TaskName>,
        order: &mut Vec<TaskName>,
    ) -> Result<()> {
        if done.contains(name) {
            return Ok(());
        }

        if let Some(pos) = path.iter().position(|p| p == name) {
            let mut cycle = path[pos..].to_vec();
            cycle.push(name.to_string());
            return Err(BuildgateError::CyclicDependency(cycle.join(" -> ")));
        }

        let task = self.tasks.get(name).ok_or_else(|| {
            let required_by = path.last().map(String::as_str).unwrap_or("?");
            BuildgateError::UnknownTask(format!("{name} (required by '{required_by}')"))
        })?;

        path.push(name.to_string());
        for prereq in &task.prerequisites {
            self.visit(prereq, path, done, order)?;
        }
        path.pop();

        done.insert(name.to_string());
        order.push(name.to_string());
        Ok(())
    }

    /// If registering `task` would close a cycle, return it as a path that
    /// starts and ends with the new task.
    fn cycle_through(&self, task: &Task) -> Option<Vec<TaskName>> {
        let mut seen = HashSet::new();
        for prereq in &task.prerequisites {
            let mut path = vec![task.name.clone()];
            if self.path_to(prereq, &task.name, &mut path, &mut seen) {
                return Some(path);
            }
        }
        None
    }

    fn path_to(
        &self,
        from: &str,
        target: &str,
        path: &mut Vec<TaskName>,
        seen: &mut HashSet<TaskName>,
    ) -> bool {
        path.push(from.to_string());
        if from == target {
            return true;
        }
        if seen.insert(from.to_string()) {
            if let Some(task) = self.tasks.get(from) {
                for prereq in &task.prerequisites {
                    if self.path_to(prereq, target, path, seen) {
                        return true;
                    }
                }
            }
        }
        path.pop();
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::task::FnAction;

    fn noop() -> Arc<dyn TaskAction> {
        Arc::new(FnAction::new(|_, _| Ok(())))
    }

    fn graph(edges: &[(&str, &[&str])]) -> TaskGraph {
        let mut g = TaskGraph::new();
        for (name, prereqs) in edges {
            g.register(*name, prereqs.iter().copied(), noop()).unwrap();
        }
        g
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut g = graph(&[("lint", &[])]);
        let err = g.register("lint", Vec::<String>::new(), noop()).unwrap_err();
        assert!(matches!(err, BuildgateError::DuplicateTask(name) if name == "lint"));
    }

    #[test]
    fn diamond_resolves_each_task_once_in_declaration_order() {
        let g = graph(&[
            ("formatting", &[]),
            ("compile_py", &["formatting"]),
            ("lint", &["compile_py"]),
            ("mypy", &["formatting"]),
            ("package", &["mypy", "lint", "compile_py"]),
        ]);

        assert_eq!(
            g.resolve("package").unwrap(),
            ["formatting", "mypy", "compile_py", "lint", "package"]
        );
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let mut g = TaskGraph::new();
        let err = g.register("a", ["a"], noop()).unwrap_err();
        assert!(matches!(err, BuildgateError::CyclicDependency(p) if p == "a -> a"));
    }

    #[test]
    fn registration_closing_a_cycle_fails() {
        // b is referenced before it exists; registering b closes a -> b -> c -> a.
        let mut g = graph(&[("a", &["b"]), ("c", &["a"])]);
        let err = g.register("b", ["c"], noop()).unwrap_err();
        match err {
            BuildgateError::CyclicDependency(path) => assert_eq!(path, "b -> c -> a -> b"),
            other => panic!("expected CyclicDependency, got {other:?}"),
        }
        assert!(g.get("b").is_none());
    }

    #[test]
    fn unknown_prerequisite_is_reported_at_resolution() {
        let g = graph(&[("lint", &["compile_py"])]);
        let err = g.resolve("lint").unwrap_err();
        match err {
            BuildgateError::UnknownTask(msg) => {
                assert!(msg.contains("compile_py"));
                assert!(msg.contains("lint"));
            }
            other => panic!("expected UnknownTask, got {other:?}"),
        }
    }

    #[test]
    fn default_must_exist() {
        let mut g = graph(&[("echo", &[])]);
        assert!(g.default_task().is_none());
        assert!(matches!(g.set_default("nope"), Err(BuildgateError::UnknownTask(_))));
        g.set_default("echo").unwrap();
        assert_eq!(g.default_task(), Some("echo"));
    }

    #[test]
    fn listing_keeps_registration_order() {
        let g = graph(&[("z", &[]), ("a", &["z"]), ("m", &[])]);
        let names: Vec<&str> = g.tasks().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["z", "a", "m"]);
    }
}
