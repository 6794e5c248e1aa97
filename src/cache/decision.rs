// src/cache/decision.rs

//! Skip-if-unchanged decision for cache-gated tasks.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::cache::fingerprint::FingerprintSpec;
use crate::context::RunContext;
use crate::types::RecordKind;

/// Cache behaviour attached to a task.
#[derive(Debug, Clone)]
pub struct CacheSpec {
    pub fingerprint: FingerprintSpec,
    /// Output files that must still exist for a skip to be allowed.
    pub expect_files: Vec<PathBuf>,
    /// Record the fingerprint as it is after the task ran instead of the one
    /// taken before it. For tasks that rewrite their own inputs (formatters).
    pub rehash_after: bool,
}

impl CacheSpec {
    pub fn new(fingerprint: FingerprintSpec) -> Self {
        Self {
            fingerprint,
            expect_files: Vec::new(),
            rehash_after: false,
        }
    }

    pub fn expect_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.expect_files.push(path.into());
        self
    }

    pub fn rehash_after(mut self, val: bool) -> Self {
        self.rehash_after = val;
        self
    }
}

/// Result of consulting the cache before running a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheDecision {
    /// Fingerprint unchanged and expected outputs present.
    Skip,
    /// Something changed (or we could not tell); run the task.
    ///
    /// `fingerprint` is the state the task is about to see; it is what gets
    /// recorded if the task succeeds. `None` when it could not be computed.
    Run {
        reason: &'static str,
        fingerprint: Option<String>,
    },
}

impl CacheDecision {
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            CacheDecision::Skip => None,
            CacheDecision::Run { reason, .. } => Some(reason),
        }
    }
}

/// Decide whether `task` can be skipped.
///
/// Any failure (fingerprint unreadable, store unreadable) resolves to
/// [`CacheDecision::Run`]; we never skip on uncertainty.
pub fn decide(task: &str, spec: &CacheSpec, ctx: &RunContext) -> CacheDecision {
    let current = match spec.fingerprint.compute(ctx.root()) {
        Ok(fp) => fp,
        Err(err) => {
            warn!(task = %task, error = %err, "could not compute fingerprint; treating as changed");
            return CacheDecision::Run {
                reason: "fingerprint unavailable",
                fingerprint: None,
            };
        }
    };

    let run = |reason| CacheDecision::Run {
        reason,
        fingerprint: Some(current.clone()),
    };

    if ctx.force() {
        return run("forced");
    }

    let stored = match ctx.store().load(RecordKind::Fingerprint, task) {
        Ok(Some(stored)) => stored,
        Ok(None) => return run("first run"),
        Err(err) => {
            warn!(task = %task, error = %err, "could not read stored fingerprint; treating as changed");
            return run("state unreadable");
        }
    };

    if stored != current {
        debug!(task = %task, %stored, %current, "fingerprint changed");
        return run("fingerprint changed");
    }

    if let Some(missing) = spec
        .expect_files
        .iter()
        .find(|p| !ctx.resolve_path(p).exists())
    {
        debug!(task = %task, missing = ?missing, "expected output missing");
        return run("expected output missing");
    }

    CacheDecision::Skip
}

/// Persist the fingerprint of a task that just succeeded.
///
/// `pre_run` is the fingerprint [`decide`] handed out. Changes made while the
/// task ran are therefore seen as changes next time, unless the spec asks for
/// [`CacheSpec::rehash_after`].
pub fn record(task: &str, spec: &CacheSpec, pre_run: Option<&str>, ctx: &mut RunContext) {
    let fingerprint = if spec.rehash_after {
        match spec.fingerprint.compute(ctx.root()) {
            Ok(fp) => fp,
            Err(err) => {
                warn!(task = %task, error = %err, "could not compute post-run fingerprint; not recording");
                return;
            }
        }
    } else {
        match pre_run {
            Some(fp) => fp.to_string(),
            None => {
                debug!(task = %task, "no pre-run fingerprint; not recording");
                return;
            }
        }
    };

    match ctx
        .store_mut()
        .save(RecordKind::Fingerprint, task, &fingerprint)
    {
        Ok(()) => info!(task = %task, fingerprint = %fingerprint, "recorded fingerprint"),
        Err(err) => warn!(task = %task, error = %err, "could not persist fingerprint"),
    }
}
