//! Side-effecting stages: filesystem inspection, settings, and subprocesses.

pub mod inspector;
pub mod installer;
pub mod lane;
pub mod process;
pub mod settings;
