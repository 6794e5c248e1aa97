// src/context.rs

//! Explicit run context handed to every task action.

use std::path::{Path, PathBuf};

use crate::cache::StateStore;
use crate::exec::ExecEnv;

/// Everything a task action may touch besides its own arguments.
///
/// One context lives for the whole run and is lent mutably to one task at a
/// time.
pub struct RunContext {
    root: PathBuf,
    store: Box<dyn StateStore>,
    exec: ExecEnv,
    report_files: Vec<PathBuf>,
    force: bool,
}

impl RunContext {
    pub fn new(root: impl Into<PathBuf>, store: Box<dyn StateStore>, exec: ExecEnv) -> Self {
        Self {
            root: root.into(),
            store,
            exec,
            report_files: Vec::new(),
            force: false,
        }
    }

    /// Report files that `clean-state` removes along with the state records.
    pub fn with_report_files(mut self, files: Vec<PathBuf>) -> Self {
        self.report_files = files;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn set_force(&mut self, force: bool) {
        self.force = force;
    }

    /// Project root; working directory for tools and base for relative paths.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    pub fn store(&self) -> &dyn StateStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn StateStore {
        self.store.as_mut()
    }

    pub fn exec(&self) -> &ExecEnv {
        &self.exec
    }

    pub fn report_files(&self) -> &[PathBuf] {
        &self.report_files
    }

    pub fn force(&self) -> bool {
        self.force
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("root", &self.root)
            .field("exec", &self.exec)
            .field("report_files", &self.report_files)
            .field("force", &self.force)
            .finish_non_exhaustive()
    }
}
