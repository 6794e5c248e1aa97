// src/actions/builtin.rs

use std::fs;
use std::io::ErrorKind;

use anyhow::Context;
use tracing::info;

use crate::context::RunContext;
use crate::dag::task::{ActionFuture, TaskAction};

/// Delete every persisted fingerprint and baseline, and every report file
/// declared by a gated task. Safe to run when there is nothing to delete.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanStateAction;

impl CleanStateAction {
    fn clean(ctx: &mut RunContext) -> anyhow::Result<()> {
        let records = ctx.store_mut().clear()?;

        let mut reports = 0;
        for file in ctx.report_files().to_vec() {
            let path = ctx.resolve_path(&file);
            match fs::remove_file(&path) {
                Ok(()) => reports += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("removing report {:?}", path));
                }
            }
        }

        info!(records, reports, "cleaned build state");
        println!("removed {records} state record(s) and {reports} report(s)");
        Ok(())
    }
}

impl TaskAction for CleanStateAction {
    fn invoke<'a>(&'a self, ctx: &'a mut RunContext, _args: &'a [String]) -> ActionFuture<'a> {
        Box::pin(async move { Self::clean(ctx) })
    }
}

/// Diagnostic task: print whatever arguments it was given.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoAction;

impl TaskAction for EchoAction {
    fn invoke<'a>(&'a self, _ctx: &'a mut RunContext, args: &'a [String]) -> ActionFuture<'a> {
        Box::pin(async move {
            println!("{args:?}");
            Ok(())
        })
    }
}
