mod common;
use crate::common::{Recorder, file_runner, init_tracing};

use std::error::Error;
use std::fs;
use std::sync::Arc;

use buildgate::actions::CleanStateAction;
use buildgate::cache::{
    CacheSpec, FileStateStore, FingerprintSpec, SourceSet, StateStore,
};
use buildgate::dag::{Task, TaskGraph, TaskStatus, Wrapper};
use buildgate::errors::BuildgateError;
use buildgate::gate::{PatternSet, QualityGate};
use buildgate::types::RecordKind;

type TestResult = Result<(), Box<dyn Error>>;

fn py_sources() -> FingerprintSpec {
    let track = vec!["pkg/**/*.py".to_string()];
    FingerprintSpec::Sources(SourceSet::new(&track, &[]).unwrap())
}

fn lint_graph(rec: &Recorder) -> TaskGraph {
    let spec = CacheSpec::new(py_sources()).expect_file("lint.txt");
    let mut graph = TaskGraph::new();
    graph
        .add(
            Task::new("lint", Vec::<String>::new(), rec.action("lint"))
                .with_wrapper(Wrapper::CacheGate(spec))
                .with_wrapper(Wrapper::Timer),
        )
        .unwrap();
    graph
        .register("clean_state", Vec::<String>::new(), Arc::new(CleanStateAction))
        .unwrap();
    graph
}

#[tokio::test]
async fn unchanged_sources_skip_the_second_run() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    fs::create_dir_all(dir.path().join("pkg"))?;
    fs::write(dir.path().join("pkg/mod.py"), "x = 1\n")?;
    fs::write(dir.path().join("lint.txt"), "")?;

    let rec = Recorder::new();
    let mut runner = file_runner(lint_graph(&rec), dir.path());

    let first = runner.run("lint", &[]).await?;
    assert_eq!(first.tasks[0].status, TaskStatus::Executed);

    let second = runner.run("lint", &[]).await?;
    assert_eq!(second.tasks[0].status, TaskStatus::Skipped);
    assert_eq!(rec.count("lint"), 1);

    // A fresh runner over the same directory sees the persisted fingerprint.
    let rec2 = Recorder::new();
    let mut runner = file_runner(lint_graph(&rec2), dir.path());
    runner.run("lint", &[]).await?;
    assert_eq!(rec2.count("lint"), 0);
    assert!(dir.path().join(".build_state/last_lint.txt").exists());

    Ok(())
}

#[tokio::test]
async fn changed_source_or_missing_output_reruns() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    fs::create_dir_all(dir.path().join("pkg"))?;
    fs::write(dir.path().join("pkg/mod.py"), "x = 1\n")?;
    fs::write(dir.path().join("lint.txt"), "")?;

    let rec = Recorder::new();
    let mut runner = file_runner(lint_graph(&rec), dir.path());
    runner.run("lint", &[]).await?;

    fs::write(dir.path().join("pkg/mod.py"), "x = 2\n")?;
    runner.run("lint", &[]).await?;
    assert_eq!(rec.count("lint"), 2);

    fs::remove_file(dir.path().join("lint.txt"))?;
    runner.run("lint", &[]).await?;
    assert_eq!(rec.count("lint"), 3);

    // Files outside the tracked set do not matter.
    fs::write(dir.path().join("lint.txt"), "")?;
    runner.run("lint", &[]).await?;
    fs::write(dir.path().join("README.md"), "docs\n")?;
    runner.run("lint", &[]).await?;
    assert_eq!(rec.count("lint"), 4);

    Ok(())
}

#[tokio::test]
async fn force_runs_anyway() -> TestResult {
    let dir = tempfile::tempdir()?;
    fs::create_dir_all(dir.path().join("pkg"))?;
    fs::write(dir.path().join("pkg/mod.py"), "x = 1\n")?;
    fs::write(dir.path().join("lint.txt"), "")?;

    let rec = Recorder::new();
    let mut runner = file_runner(lint_graph(&rec), dir.path());
    runner.run("lint", &[]).await?;

    runner.context_mut().set_force(true);
    let report = runner.run("lint", &[]).await?;
    assert_eq!(report.tasks[0].status, TaskStatus::Executed);
    assert_eq!(rec.count("lint"), 2);

    Ok(())
}

#[tokio::test]
async fn clean_state_twice_then_everything_reruns() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    fs::create_dir_all(dir.path().join("pkg"))?;
    fs::write(dir.path().join("pkg/mod.py"), "x = 1\n")?;
    fs::write(dir.path().join("lint.txt"), "")?;

    let rec = Recorder::new();
    let mut runner = file_runner(lint_graph(&rec), dir.path());
    runner.run("lint", &[]).await?;

    runner.run("clean_state", &[]).await?;
    runner.run("clean_state", &[]).await?;
    assert!(!dir.path().join(".build_state/last_lint.txt").exists());

    runner.run("lint", &[]).await?;
    assert_eq!(rec.count("lint"), 2);

    Ok(())
}

#[test]
fn fatal_pattern_fails_regardless_of_thresholds() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStateStore::new(dir.path().join("state"));
    let gate = QualityGate::new("lint")
        .with_fatal(PatternSet::parse(&["no-member"]).unwrap())
        .with_max(10_000)
        .with_margin(10_000);

    let err = gate
        .check(&["error: no-member X", "warning: unused Y"], &mut store)
        .unwrap_err();
    assert!(matches!(err, BuildgateError::FatalQuality { ref check, count: 1 } if check == "lint"));
    assert_eq!(store.load(RecordKind::Baseline, "lint").unwrap(), None);
}

#[test]
fn regression_beyond_margin_fails_and_keeps_baseline() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStateStore::new(dir.path().join("state"));
    store.save(RecordKind::Baseline, "lint", "25").unwrap();

    let gate = QualityGate::new("lint").with_max(350).with_margin(10);
    let lines: Vec<String> = (0..40).map(|i| format!("warning {i}")).collect();

    let err = gate.check(&lines, &mut store).unwrap_err();
    assert!(matches!(
        err,
        BuildgateError::Regression { current: 40, previous: 25, margin: 10, .. }
    ));
    assert_eq!(store.load(RecordKind::Baseline, "lint").unwrap().as_deref(), Some("25"));
}

#[test]
fn within_margin_passes_and_persists_new_count() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStateStore::new(dir.path().join("state"));
    store.save(RecordKind::Baseline, "lint", "35").unwrap();

    let gate = QualityGate::new("lint").with_max(350).with_margin(10);
    let lines: Vec<String> = (0..40).map(|i| format!("warning {i}")).collect();

    let report = gate.check(&lines, &mut store).unwrap();
    assert_eq!(report.count, 40);
    assert_eq!(report.previous, Some(35));
    assert_eq!(store.load(RecordKind::Baseline, "lint").unwrap().as_deref(), Some("40"));
    assert!(dir.path().join("state/last_lint.count.txt").exists());
}

#[test]
fn ceiling_applies_without_a_baseline() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStateStore::new(dir.path().join("state"));

    let gate = QualityGate::new("docstrings").with_max(3);
    let lines = ["a", "b", "c", "d"];

    let err = gate.check(&lines, &mut store).unwrap_err();
    assert!(matches!(err, BuildgateError::ThresholdExceeded { count: 4, max: 3, .. }));
}
