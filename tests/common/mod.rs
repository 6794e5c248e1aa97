#![allow(dead_code)]

use std::path::Path;

use buildgate::cache::{FileStateStore, MemoryStateStore};
use buildgate::context::RunContext;
use buildgate::dag::{Runner, TaskGraph};
use buildgate::exec::ExecEnv;

pub use buildgate_test_utils::builders;
pub use buildgate_test_utils::init_tracing;
pub use buildgate_test_utils::recording::Recorder;

/// Runner with in-memory state and tools run directly.
pub fn memory_runner(graph: TaskGraph, root: &Path) -> Runner {
    let ctx = RunContext::new(root, Box::new(MemoryStateStore::new()), ExecEnv::direct());
    Runner::new(graph, ctx)
}

/// Runner persisting state under `<root>/.build_state`.
pub fn file_runner(graph: TaskGraph, root: &Path) -> Runner {
    let store = FileStateStore::new(root.join(".build_state"));
    let ctx = RunContext::new(root, Box::new(store), ExecEnv::direct());
    Runner::new(graph, ctx)
}
