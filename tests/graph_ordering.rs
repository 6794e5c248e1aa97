mod common;
use crate::common::{Recorder, init_tracing, memory_runner};
use buildgate_test_utils::with_timeout;

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;

use buildgate::dag::TaskGraph;
use buildgate::errors::BuildgateError;

// Strategy for a random acyclic graph: task N may only depend on tasks
// 0..N-1. Returned as (deps per task, index of the task to run).
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = (Vec<Vec<usize>>, usize)> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        let deps = proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, potential)| {
                    // Keep declaration order, drop duplicates and forward edges.
                    let mut seen = HashSet::new();
                    potential
                        .into_iter()
                        .filter(|_| i > 0)
                        .map(|d| d % i.max(1))
                        .filter(|d| seen.insert(*d))
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>()
        });
        (deps, 0..num_tasks)
    })
}

fn name(i: usize) -> String {
    format!("task_{i}")
}

fn build_graph(deps: &[Vec<usize>], rec: &Recorder) -> TaskGraph {
    let mut graph = TaskGraph::new();
    for (i, task_deps) in deps.iter().enumerate() {
        graph
            .register(name(i), task_deps.iter().map(|d| name(*d)), rec.action(&name(i)))
            .unwrap();
    }
    graph
}

fn closure(deps: &[Vec<usize>], root: usize) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut stack = vec![root];
    while let Some(i) = stack.pop() {
        if seen.insert(name(i)) {
            stack.extend(deps[i].iter().copied());
        }
    }
    seen
}

proptest! {
    #[test]
    fn every_prerequisite_runs_once_and_first((deps, target) in dag_strategy(12)) {
        let rec = Recorder::new();
        let graph = build_graph(&deps, &rec);
        let dir = tempfile::tempdir().unwrap();
        let mut runner = memory_runner(graph, dir.path());

        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let report = rt.block_on(runner.run(&name(target), &[])).unwrap();
        let executed = rec.entries();

        // Exactly the closure, each task once.
        let unique: HashSet<String> = executed.iter().cloned().collect();
        prop_assert_eq!(unique.len(), executed.len());
        prop_assert_eq!(unique, closure(&deps, target));
        prop_assert_eq!(report.names(), executed.iter().map(String::as_str).collect::<Vec<_>>());

        // Nothing runs before its prerequisites.
        let position: HashMap<&str, usize> =
            executed.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
        for (i, task_deps) in deps.iter().enumerate() {
            let Some(&pos) = position.get(name(i).as_str()) else { continue };
            for d in task_deps {
                let dep_pos = position[name(*d).as_str()];
                prop_assert!(dep_pos < pos, "{} ran before its prerequisite {}", name(i), name(*d));
            }
        }

        // The requested task is always last.
        let target_name = name(target);
        prop_assert_eq!(executed.last().map(String::as_str), Some(target_name.as_str()));
    }

    #[test]
    fn resolution_is_deterministic((deps, target) in dag_strategy(12)) {
        let rec = Recorder::new();
        let graph = build_graph(&deps, &rec);
        let first = graph.resolve(&name(target)).unwrap();
        let second = graph.resolve(&name(target)).unwrap();
        prop_assert_eq!(first, second);
    }
}

#[test]
fn declaration_order_decides_sibling_order() {
    init_tracing();

    let rec = Recorder::new();
    let mut graph = TaskGraph::new();
    graph.register("formatting", Vec::<String>::new(), rec.action("formatting")).unwrap();
    graph.register("compile_py", ["formatting"], rec.action("compile_py")).unwrap();
    graph.register("static_analysis", ["compile_py"], rec.action("static_analysis")).unwrap();
    graph.register("lint", ["compile_py"], rec.action("lint")).unwrap();
    graph
        .register("package", ["static_analysis", "lint"], rec.action("package"))
        .unwrap();

    assert_eq!(
        graph.resolve("package").unwrap(),
        ["formatting", "compile_py", "static_analysis", "lint", "package"]
    );
}

#[test]
fn closing_a_cycle_fails_at_registration() {
    init_tracing();

    let rec = Recorder::new();
    let mut graph = TaskGraph::new();
    graph.register("a", ["c"], rec.action("a")).unwrap();
    graph.register("b", ["a"], rec.action("b")).unwrap();

    let err = graph.register("c", ["b"], rec.action("c")).unwrap_err();
    match err {
        BuildgateError::CyclicDependency(path) => {
            assert!(path.contains('a') && path.contains('b') && path.contains('c'), "{path}");
        }
        other => panic!("expected CyclicDependency, got {other:?}"),
    }
    assert!(graph.get("c").is_none());
    assert!(rec.entries().is_empty());

    let err = graph.register("self", ["self"], rec.action("self")).unwrap_err();
    assert!(matches!(err, BuildgateError::CyclicDependency(_)));
}

#[test]
fn duplicate_and_unknown_names() {
    let rec = Recorder::new();
    let mut graph = TaskGraph::new();
    graph.register("a", ["ghost"], rec.action("a")).unwrap();

    let err = graph.register("a", Vec::<String>::new(), rec.action("a")).unwrap_err();
    assert!(matches!(err, BuildgateError::DuplicateTask(n) if n == "a"));

    let err = graph.resolve("a").unwrap_err();
    assert!(matches!(err, BuildgateError::UnknownTask(msg) if msg.contains("ghost")));

    let err = graph.resolve("nope").unwrap_err();
    assert!(matches!(err, BuildgateError::UnknownTask(_)));
}

#[tokio::test]
async fn arguments_reach_only_the_requested_task() {
    init_tracing();

    let rec = Recorder::new();
    let mut graph = TaskGraph::new();
    graph.register("prep", Vec::<String>::new(), rec.action("prep")).unwrap();
    graph.register("echo", ["prep"], rec.action("echo")).unwrap();
    graph.set_default("echo").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let mut runner = memory_runner(graph, dir.path());
    with_timeout(runner.run_default(&["a".to_string(), "b".to_string()]))
        .await
        .unwrap();

    assert_eq!(rec.entries(), ["prep", "echo(a,b)"]);
}

#[tokio::test]
async fn first_failure_stops_the_run() {
    init_tracing();

    let rec = Recorder::new();
    let mut graph = TaskGraph::new();
    graph.register("a", Vec::<String>::new(), rec.action("a")).unwrap();
    graph.register("b", ["a"], rec.failing("b", "quality gate said no")).unwrap();
    graph.register("c", ["b"], rec.action("c")).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let mut runner = memory_runner(graph, dir.path());
    let failure = with_timeout(runner.run("c", &[])).await.unwrap_err();

    assert_eq!(failure.task.as_deref(), Some("b"));
    assert_eq!(rec.entries(), ["a", "b"]);
    assert_eq!(failure.completed.len(), 1);
    assert!(failure.to_string().contains("quality gate said no"));
}
