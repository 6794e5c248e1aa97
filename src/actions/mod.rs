// src/actions/mod.rs

//! Concrete task actions.
//!
//! - [`tool`] runs external tools, optionally feeding the last one's output
//!   through a quality gate.
//! - [`builtin`] holds `clean-state` and `echo`.

pub mod builtin;
pub mod tool;

pub use builtin::{CleanStateAction, EchoAction};
pub use tool::{GateSpec, ToolAction};
