// src/exec/process.rs

//! Blocking, single-child tool runner.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::errors::BuildgateError;
use crate::exec::command::{ExecEnv, ToolCommand};
use crate::gate::PatternSet;

/// Per-invocation options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolOptions<'a> {
    /// Lines containing any of these are discarded as they are read.
    pub drop: Option<&'a PatternSet>,
    /// Echo kept stdout lines to our own stdout.
    pub echo: bool,
    /// Kill the child and fail if it runs longer than this.
    pub timeout: Option<Duration>,
}

/// What a finished tool handed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    /// Kept stdout lines, in order.
    pub lines: Vec<String>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Spawn `cmd` in `cwd`, read its stdout line by line and wait for it.
///
/// A non-zero exit is *not* an error here; callers decide. Failing to launch,
/// losing the pipe, or hitting the timeout are
/// [`BuildgateError::SubprocessFailure`].
pub async fn run_tool(
    cmd: &ToolCommand,
    env: &ExecEnv,
    cwd: &Path,
    opts: &ToolOptions<'_>,
) -> Result<ToolOutput> {
    let argv = env.argv(cmd);
    let Some((program, rest)) = argv.split_first() else {
        return Err(failure(&cmd.program, "empty command line").into());
    };

    info!(cmd = %argv.join(" "), cwd = ?cwd, "starting tool");

    let mut command = Command::new(program);
    command
        .args(rest)
        .current_dir(cwd)
        .envs(env.vars().iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|e| failure(program, format!("failed to launch: {e}")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| failure(program, "stdout not captured"))?;

    // Always consume stderr so buffers don't fill; log at debug.
    if let Some(stderr) = child.stderr.take() {
        let name = program.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::new();
            while matches!(reader.read_until(b'\n', &mut buf).await, Ok(n) if n > 0) {
                debug!(tool = %name, "stderr: {}", decode_line(&buf));
                buf.clear();
            }
        });
    }

    let (status, lines) = match opts.timeout {
        Some(limit) => {
            let waited = tokio::time::timeout(limit, read_and_wait(&mut child, stdout, opts)).await;
            match waited {
                Ok(res) => res?,
                Err(_) => {
                    if let Err(e) = child.kill().await {
                        warn!(tool = %program, error = %e, "failed to kill timed-out tool");
                    }
                    return Err(failure(program, format!("timed out after {limit:?}")).into());
                }
            }
        }
        None => read_and_wait(&mut child, stdout, opts).await?,
    };

    let code = status.code();
    info!(
        tool = %program,
        exit_code = ?code,
        success = status.success(),
        kept_lines = lines.len(),
        "tool exited"
    );

    Ok(ToolOutput { code, lines })
}

async fn read_and_wait(
    child: &mut Child,
    stdout: ChildStdout,
    opts: &ToolOptions<'_>,
) -> Result<(ExitStatus, Vec<String>)> {
    let mut kept = Vec::new();
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .context("reading tool stdout")?;
        if read == 0 {
            break;
        }
        let line = decode_line(&buf);
        if opts.drop.is_some_and(|d| d.matches_any(&line)) {
            continue;
        }
        if opts.echo {
            println!("{line}");
        }
        kept.push(line);
    }

    let status = child.wait().await.context("waiting for tool to exit")?;
    Ok((status, kept))
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

fn failure(program: &str, reason: impl Into<String>) -> BuildgateError {
    BuildgateError::SubprocessFailure {
        program: program.to_string(),
        reason: reason.into(),
    }
}
