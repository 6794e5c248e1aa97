use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use buildgate::context::RunContext;
use buildgate::dag::{ActionFuture, TaskAction};
use tracing::debug;

/// Shared log of action invocations.
///
/// Each entry is the task label, followed by `(a,b)` when the action received
/// arguments.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// An action that appends `label` to the log and succeeds.
    pub fn action(&self, label: &str) -> Arc<dyn TaskAction> {
        Arc::new(RecordingAction {
            label: label.to_string(),
            entries: Arc::clone(&self.entries),
            fail_with: None,
        })
    }

    /// An action that appends `label` to the log and then fails with `msg`.
    pub fn failing(&self, label: &str, msg: &str) -> Arc<dyn TaskAction> {
        Arc::new(RecordingAction {
            label: label.to_string(),
            entries: Arc::clone(&self.entries),
            fail_with: Some(msg.to_string()),
        })
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn count(&self, label: &str) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.as_str() == label || e.starts_with(&format!("{label}(")))
            .count()
    }
}

struct RecordingAction {
    label: String,
    entries: Arc<Mutex<Vec<String>>>,
    fail_with: Option<String>,
}

impl TaskAction for RecordingAction {
    fn invoke<'a>(&'a self, _ctx: &'a mut RunContext, args: &'a [String]) -> ActionFuture<'a> {
        Box::pin(async move {
            let entry = if args.is_empty() {
                self.label.clone()
            } else {
                format!("{}({})", self.label, args.join(","))
            };
            debug!(entry = %entry, failing = self.fail_with.is_some(), "recorded action");
            self.entries.lock().unwrap().push(entry);

            match &self.fail_with {
                Some(msg) => Err(anyhow!("{}", msg)),
                None => Ok(()),
            }
        })
    }
}
