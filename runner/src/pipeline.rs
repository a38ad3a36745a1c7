//! Orchestration for a single step run: inspect, install, assemble, execute.

use std::time::Instant;

use tracing::{info, instrument, warn};

use crate::config::StepConfig;
use crate::core::decision::resolve_use_bundler;
use crate::core::invocation::assemble;
use crate::core::ruby::RubyEnv;
use crate::core::types::{
    BundlerPreference, DependencyInstallOptions, ExecutionResult, InstallPath, RunOptions,
};
use crate::error::StepError;
use crate::io::inspector::inspect;
use crate::io::installer::install_dependencies;
use crate::io::lane::run_lane;
use crate::io::process::CommandRunner;
use crate::io::settings::RunnerSettings;
use crate::telemetry::{Event, Recorder};

/// Run every stage in order. The first failing stage ends the run.
///
/// Telemetry is recorded along the way but never affects the result.
#[instrument(skip_all, fields(lane = %config.lane.lane))]
pub fn run_pipeline<R: CommandRunner>(
    config: &StepConfig,
    settings: &RunnerSettings,
    runner: &R,
    recorder: &Recorder,
) -> Result<ExecutionResult, StepError> {
    let gem_versions = inspect(&config.work_dir);
    let use_bundler = resolve_use_bundler(&gem_versions, config.bundler);
    info!(
        fastlane = gem_versions.fastlane.as_pinned().unwrap_or("-"),
        bundler = gem_versions.bundler.as_pinned().unwrap_or("-"),
        use_bundler,
        "dependencies resolved"
    );
    recorder.record(
        Event::new("dependencies_resolved")
            .with("fastlane_pinned", gem_versions.fastlane.found)
            .with("bundler_pinned", gem_versions.bundler.found)
            .with("use_bundler", use_bundler)
            .with("update_fastlane", config.update_fastlane),
    );

    let ruby = RubyEnv::from_ruby_path(runner.locate("ruby"));
    match &ruby.ruby_path {
        Some(path) => info!(kind = ?ruby.kind, path = %path.display(), "ruby located"),
        None => warn!("ruby not found on PATH"),
    }

    let install_opts = DependencyInstallOptions {
        gem_versions: gem_versions.clone(),
        use_bundler,
        force_bundler: config.bundler == BundlerPreference::Always,
        work_dir: config.work_dir.clone(),
        update_fastlane: config.update_fastlane,
    };
    let started = Instant::now();
    let installed = install_dependencies(&install_opts, &ruby, settings, runner);
    recorder.record(
        Event::new("dependencies_installed")
            .with("success", installed.is_ok())
            .with("duration_ms", elapsed_ms(started)),
    );
    let path = installed?;

    let run_opts = RunOptions {
        work_dir: config.work_dir.clone(),
        credentials: config.credentials.clone(),
        lane: config.lane.clone(),
        use_bundler: path == InstallPath::Managed,
        gem_versions,
        enable_cache: config.enable_cache,
    };
    let invocation = assemble(&run_opts);

    let started = Instant::now();
    let result = run_lane(runner, &invocation);
    recorder.record(
        Event::new("lane_finished")
            .with("success", result.success)
            .with("exit_code", result.exit_code)
            .with("install_path", serde_json::to_value(path).unwrap_or_default())
            .with("duration_ms", elapsed_ms(started)),
    );

    if !result.success {
        return Err(StepError::LaneExecution {
            command: invocation.command_line(),
            exit_code: result.exit_code,
            hint: result.hint,
        });
    }
    Ok(result)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
