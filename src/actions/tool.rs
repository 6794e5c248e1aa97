// src/actions/tool.rs

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::context::RunContext;
use crate::dag::task::{ActionFuture, TaskAction};
use crate::errors::BuildgateError;
use crate::exec::{ToolCommand, ToolOptions, ToolOutput, run_tool};
use crate::gate::{PatternSet, QualityGate};

/// Quality gate attached to a tool action.
#[derive(Debug, Clone)]
pub struct GateSpec {
    pub gate: QualityGate,
    /// Lines dropped from the tool's stdout before anything else sees them.
    pub drop: PatternSet,
    /// Where the kept lines are written (relative to the project root).
    pub report: Option<PathBuf>,
}

/// Run one or more tool commands in order; optionally gate the output of the
/// last one.
#[derive(Debug, Clone)]
pub struct ToolAction {
    pub steps: Vec<ToolCommand>,
    pub gate: Option<GateSpec>,
    pub timeout: Option<Duration>,
    /// Treat a non-zero exit of the last step as failure. Earlier steps are
    /// always strict.
    pub check_exit: bool,
    pub echo: bool,
}

impl ToolAction {
    pub fn new(steps: Vec<ToolCommand>) -> Self {
        Self {
            steps,
            gate: None,
            timeout: None,
            check_exit: true,
            echo: true,
        }
    }

    /// Attach a gate. Analysis tools exit non-zero whenever they report
    /// anything, so gated actions stop checking the exit code.
    pub fn with_gate(mut self, gate: GateSpec) -> Self {
        self.gate = Some(gate);
        self.check_exit = false;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_check_exit(mut self, check_exit: bool) -> Self {
        self.check_exit = check_exit;
        self
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    async fn run(&self, ctx: &mut RunContext) -> Result<()> {
        if let Some(report) = self.gate.as_ref().and_then(|g| g.report.as_ref()) {
            remove_if_exists(&ctx.resolve_path(report))?;
        }

        let mut last: Option<ToolOutput> = None;
        for (idx, step) in self.steps.iter().enumerate() {
            let is_last = idx + 1 == self.steps.len();
            let opts = ToolOptions {
                drop: if is_last {
                    self.gate.as_ref().map(|g| &g.drop)
                } else {
                    None
                },
                echo: self.echo,
                timeout: self.timeout,
            };

            let output = run_tool(step, ctx.exec(), ctx.root(), &opts).await?;

            if !output.success() {
                if !is_last || self.check_exit {
                    return Err(BuildgateError::SubprocessFailure {
                        program: step.program.clone(),
                        reason: exit_reason(&output),
                    }
                    .into());
                }
                warn!(tool = %step.program, reason = %exit_reason(&output), "tool exit status ignored");
            }
            last = Some(output);
        }

        let (Some(gate), Some(output)) = (&self.gate, last) else {
            return Ok(());
        };

        if let Some(report) = &gate.report {
            let path = ctx.resolve_path(report);
            write_report(&path, &output.lines)?;
            debug!(report = ?path, lines = output.lines.len(), "wrote tool report");
        }

        let report = gate.gate.check(&output.lines, ctx.store_mut())?;
        println!(
            "{}: {} finding(s){}",
            gate.gate.name,
            report.count,
            match report.previous {
                Some(prev) => format!(", previously {prev}"),
                None => String::new(),
            }
        );
        Ok(())
    }
}

impl TaskAction for ToolAction {
    fn invoke<'a>(&'a self, ctx: &'a mut RunContext, _args: &'a [String]) -> ActionFuture<'a> {
        Box::pin(self.run(ctx))
    }
}

fn exit_reason(output: &ToolOutput) -> String {
    match output.code {
        Some(code) => format!("exited with status {code}"),
        None => "terminated by signal".to_string(),
    }
}

fn remove_if_exists(path: &std::path::Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = ?path, "removed stale report");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("removing {:?}", path)),
    }
}

fn write_report(path: &std::path::Path, lines: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;
    }
    let mut contents = lines.join("\n");
    if !contents.is_empty() {
        contents.push('\n');
    }
    fs::write(path, contents).with_context(|| format!("writing report {:?}", path))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cache::{MemoryStateStore, StateStore};
    use crate::exec::ExecEnv;
    use crate::types::RecordKind;

    fn sh(script: &str) -> ToolCommand {
        ToolCommand::new("sh", ["-c", script])
    }

    fn ctx(root: &std::path::Path) -> RunContext {
        RunContext::new(root, Box::new(MemoryStateStore::new()), ExecEnv::direct())
    }

    fn lint_gate() -> GateSpec {
        GateSpec {
            gate: QualityGate::new("lint")
                .with_fatal(PatternSet::parse(&["no-member"]).unwrap())
                .with_exclude(PatternSet::parse(&["*************"]).unwrap())
                .with_max(3),
            drop: PatternSet::parse(&["memoize.py"]).unwrap(),
            report: Some(PathBuf::from("lint.txt")),
        }
    }

    #[tokio::test]
    async fn gated_tool_writes_filtered_report_and_records_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ctx(dir.path());
        let action = ToolAction::new(vec![sh(
            "echo '************* Module pkg'; echo 'a.py:1 W1'; echo 'memoize.py:2 W2'; exit 4",
        )])
        .with_gate(lint_gate())
        .with_echo(false);

        action.invoke(&mut ctx, &[]).await.unwrap();

        let report = fs::read_to_string(dir.path().join("lint.txt")).unwrap();
        assert_eq!(report, "************* Module pkg\na.py:1 W1\n");
        assert_eq!(
            ctx.store().load(RecordKind::Baseline, "lint").unwrap().as_deref(),
            Some("1")
        );
    }

    #[tokio::test]
    async fn fatal_finding_fails_the_action() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ctx(dir.path());
        let action = ToolAction::new(vec![sh("echo 'a.py:1 E1101 no-member'")])
            .with_gate(lint_gate())
            .with_echo(false);

        let err = action.invoke(&mut ctx, &[]).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildgateError>(),
            Some(BuildgateError::FatalQuality { .. })
        ));
    }

    #[tokio::test]
    async fn earlier_steps_are_always_strict() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ctx(dir.path());
        let action = ToolAction::new(vec![sh("exit 2"), sh("echo never")])
            .with_gate(lint_gate())
            .with_echo(false);

        let err = action.invoke(&mut ctx, &[]).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildgateError>(),
            Some(BuildgateError::SubprocessFailure { .. })
        ));
        assert!(!dir.path().join("lint.txt").exists());
    }

    #[tokio::test]
    async fn plain_tool_fails_on_non_zero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ctx(dir.path());
        let action = ToolAction::new(vec![sh("exit 1")]).with_echo(false);

        assert!(action.invoke(&mut ctx, &[]).await.is_err());

        let ok = ToolAction::new(vec![sh("true")]).with_echo(false);
        ok.invoke(&mut ctx, &[]).await.unwrap();
    }
}
