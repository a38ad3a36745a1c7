//! Runs the assembled lane invocation exactly once.

use tracing::{error, info, instrument, warn};

use crate::core::hints::failure_hint;
use crate::core::invocation::Invocation;
use crate::core::types::ExecutionResult;
use crate::io::process::CommandRunner;

/// Execute the lane and map its exit status. Never retries: lanes are not
/// assumed idempotent.
#[instrument(skip_all, fields(program = %invocation.program))]
pub fn run_lane<R: CommandRunner>(runner: &R, invocation: &Invocation) -> ExecutionResult {
    info!(command = %invocation, "running lane");
    match runner.run(invocation) {
        Ok(outcome) => {
            let mut result = ExecutionResult::from_exit_code(outcome.exit_code);
            if result.success {
                info!("lane succeeded");
            } else {
                result.hint = failure_hint(&outcome.tail_lossy()).map(str::to_string);
                warn!(exit_code = ?outcome.exit_code, "lane failed");
            }
            result
        }
        Err(e) => {
            error!(err = %format!("{e:#}"), "lane could not be started");
            ExecutionResult::spawn_failed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedCommandRunner;

    fn fastlane_beta() -> Invocation {
        Invocation::new("fastlane", "/work").arg("beta")
    }

    #[test]
    fn zero_exit_is_success() {
        let runner = ScriptedCommandRunner::new();
        let result = run_lane(&runner, &fastlane_beta());
        assert_eq!(result, ExecutionResult::from_exit_code(Some(0)));
        assert_eq!(runner.command_lines(), vec!["fastlane beta"]);
    }

    #[test]
    fn non_zero_exit_carries_code_and_hint() {
        let runner = ScriptedCommandRunner::new().output_when(
            "fastlane",
            1,
            "[!] Could not find lane 'beta'. Available lanes: release",
        );
        let result = run_lane(&runner, &fastlane_beta());
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(1));
        assert!(result.hint.is_some());
        assert_eq!(runner.command_lines().len(), 1, "lanes must not be retried");
    }

    #[test]
    fn spawn_failure_is_failure_without_code() {
        let runner = ScriptedCommandRunner::new().spawn_error_when("fastlane");
        let result = run_lane(&runner, &fastlane_beta());
        assert!(!result.success);
        assert_eq!(result.exit_code, None);
    }
}
