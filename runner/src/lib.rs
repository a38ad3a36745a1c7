//! CI step that prepares a Ruby toolchain and runs a fastlane lane.
//!
//! A run moves through fixed stages: validate inputs, inspect the lockfile,
//! install dependencies (through Bundler or straight into the gem environment),
//! assemble the lane command, and run it once. The crate keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (lockfile parsing, routing
//!   decisions, command assembly). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem, process execution).
//!   Subprocesses go through [`io::process::CommandRunner`] so tests can script them.
//!
//! [`pipeline`] wires the two together; [`telemetry`] records what happened
//! without ever affecting the outcome.

pub mod config;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod telemetry;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
