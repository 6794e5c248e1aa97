// src/cache/mod.rs

//! Change detection and persisted run state.
//!
//! - [`patterns`] selects tracked source files with globs.
//! - [`fingerprint`] turns sources (or a report's line count) into a
//!   comparable string.
//! - [`store`] persists fingerprints and quality-gate baselines.
//! - [`decision`] implements skip-if-unchanged on top of the above.

pub mod decision;
pub mod fingerprint;
pub mod patterns;
pub mod store;

pub use decision::{CacheDecision, CacheSpec, decide, record};
pub use fingerprint::{FingerprintSpec, compute_file_hash, compute_hash_for_paths, count_lines};
pub use patterns::SourceSet;
pub use store::{DEFAULT_STATE_DIR, FileStateStore, MemoryStateStore, StateStore};
