//! Stage errors surfaced to the binary.
//!
//! Every variant is fatal and maps to [`crate::exit_codes::FAILURE`]; the
//! stages are distinguished only by the message.

use thiserror::Error;

use crate::core::types::InstallPath;

#[derive(Debug, Error)]
pub enum StepError {
    #[error("Failed to process Step inputs: {cause:#}")]
    Configuration { cause: anyhow::Error },

    #[error("Failed to install Step dependencies ({path} path): {cause:#}")]
    DependencyInstall {
        path: InstallPath,
        cause: anyhow::Error,
    },

    #[error("Failed to execute Step: {}", lane_failure_message(.command, .exit_code, .hint))]
    LaneExecution {
        command: String,
        exit_code: Option<i32>,
        hint: Option<String>,
    },
}

impl StepError {
    pub fn configuration(cause: anyhow::Error) -> Self {
        StepError::Configuration { cause }
    }

    /// Short stage name for logs and telemetry.
    pub fn stage(&self) -> &'static str {
        match self {
            StepError::Configuration { .. } => "configuration",
            StepError::DependencyInstall { .. } => "dependency_install",
            StepError::LaneExecution { .. } => "lane_execution",
        }
    }
}

fn lane_failure_message(command: &str, exit_code: &Option<i32>, hint: &Option<String>) -> String {
    let mut message = match exit_code {
        Some(code) => format!("`{command}` exited with status {code}"),
        None => format!("`{command}` failed to start or was terminated by a signal"),
    };
    if let Some(hint) = hint {
        message.push_str("\nHint: ");
        message.push_str(hint);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn dependency_error_names_path_and_cause_chain() {
        let err = StepError::DependencyInstall {
            path: InstallPath::Managed,
            cause: anyhow!("exit 1").context("run `bundle install`"),
        };
        let msg = err.to_string();
        assert!(msg.contains("managed (bundler) path"));
        assert!(msg.contains("run `bundle install`: exit 1"));
        assert_eq!(err.stage(), "dependency_install");
    }

    #[test]
    fn lane_error_includes_exit_code_and_hint() {
        let err = StepError::LaneExecution {
            command: "fastlane beta".to_string(),
            exit_code: Some(1),
            hint: Some("check the lane".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to execute Step: `fastlane beta` exited with status 1"));
        assert!(msg.ends_with("Hint: check the lane"));
    }

    #[test]
    fn lane_error_without_exit_code() {
        let err = StepError::LaneExecution {
            command: "fastlane beta".to_string(),
            exit_code: None,
            hint: None,
        };
        assert!(err.to_string().contains("failed to start"));
    }
}
