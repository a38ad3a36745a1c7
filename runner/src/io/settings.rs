//! Runner tunables stored in an optional TOML file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Runner settings (TOML).
///
/// Missing fields default to values that suit hosted CI machines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerSettings {
    /// `bundle install --jobs`.
    pub bundle_install_jobs: u32,

    /// `bundle install --retry`.
    pub bundle_install_retry: u32,

    /// Bytes of lane output kept in memory for failure diagnostics.
    pub output_tail_bytes: usize,

    pub telemetry: TelemetrySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetrySettings {
    pub enabled: bool,
    /// JSONL file to append events to. Events are only logged when unset.
    pub path: Option<PathBuf>,
    /// Events buffered before new ones are dropped.
    pub queue_capacity: usize,
    /// Upper bound on the final flush.
    pub flush_timeout_secs: u64,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            queue_capacity: 64,
            flush_timeout_secs: 10,
        }
    }
}

impl TelemetrySettings {
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_secs(self.flush_timeout_secs)
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            bundle_install_jobs: 20,
            bundle_install_retry: 5,
            output_tail_bytes: 64 * 1024,
            telemetry: TelemetrySettings::default(),
        }
    }
}

impl RunnerSettings {
    pub fn validate(&self) -> Result<()> {
        if self.bundle_install_jobs == 0 {
            return Err(anyhow!("bundle_install_jobs must be > 0"));
        }
        if self.output_tail_bytes == 0 {
            return Err(anyhow!("output_tail_bytes must be > 0"));
        }
        if self.telemetry.queue_capacity == 0 {
            return Err(anyhow!("telemetry.queue_capacity must be > 0"));
        }
        if self.telemetry.flush_timeout_secs == 0 {
            return Err(anyhow!("telemetry.flush_timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// Load settings from a TOML file.
///
/// If `path` is `None`, returns `RunnerSettings::default()`. A path that was
/// given explicitly must exist.
pub fn load_settings(path: Option<&Path>) -> Result<RunnerSettings> {
    let Some(path) = path else {
        let settings = RunnerSettings::default();
        settings.validate()?;
        return Ok(settings);
    };
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let settings: RunnerSettings =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    settings
        .validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(settings)
}
