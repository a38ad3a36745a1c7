//! Deterministic, pure logic shared by the runner.
//!
//! Core modules are free of I/O side effects: they parse, decide and assemble
//! in-memory values, leaving filesystem and process work to [`crate::io`].

pub mod decision;
pub mod hints;
pub mod invocation;
pub mod lockfile;
pub mod ruby;
pub mod types;
