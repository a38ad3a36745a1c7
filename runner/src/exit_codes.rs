//! Process exit codes.

/// The lane ran and exited zero.
pub const OK: i32 = 0;
/// Any stage failed: inputs, dependency installation or the lane itself.
pub const FAILURE: i32 = 1;
