// src/gate/mod.rs

//! Quality gates over static-analysis tool output.
//!
//! - [`matcher`] holds substring/regex line patterns.
//! - [`evaluator`] turns tool output into pass/fail with regression tracking.

pub mod evaluator;
pub mod matcher;

pub use evaluator::{GateReport, QualityGate};
pub use matcher::{LinePattern, PatternSet};
