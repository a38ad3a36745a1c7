//! Materializes the fastlane toolchain for the chosen install path.
//!
//! Gem installs mutate the machine-wide Ruby environment. Concurrent runs on
//! one machine are not isolated from each other; callers must serialize them.

use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{info, instrument, warn};

use crate::core::decision::{FastlaneRequest, InstallPlan, plan_install};
use crate::core::invocation::{BUNDLE, FASTLANE, Invocation};
use crate::core::ruby::RubyEnv;
use crate::core::types::{DependencyInstallOptions, InstallPath};
use crate::error::StepError;
use crate::io::inspector::{MANIFEST_NAMES, find_manifest};
use crate::io::process::CommandRunner;
use crate::io::settings::RunnerSettings;

/// Install dependencies according to [`plan_install`].
///
/// A failing managed install is surfaced as-is; it never falls back to the
/// direct path.
#[instrument(skip_all, fields(work_dir = %opts.work_dir.display()))]
pub fn install_dependencies<R: CommandRunner>(
    opts: &DependencyInstallOptions,
    ruby: &RubyEnv,
    settings: &RunnerSettings,
    runner: &R,
) -> Result<InstallPath, StepError> {
    let plan = plan_install(opts);
    let path = plan.path();
    info!(path = %path, "installing dependencies");

    let result = match &plan {
        InstallPlan::Managed { bundler_version } => install_managed(
            &opts.work_dir,
            bundler_version.as_deref(),
            ruby,
            settings,
            runner,
        ),
        InstallPlan::Direct { fastlane } => install_direct(&opts.work_dir, *fastlane, ruby, runner),
    };

    result
        .map(|()| path)
        .map_err(|cause| StepError::DependencyInstall { path, cause })
}

fn install_managed<R: CommandRunner>(
    work_dir: &Path,
    bundler_version: Option<&str>,
    ruby: &RubyEnv,
    settings: &RunnerSettings,
    runner: &R,
) -> Result<()> {
    if find_manifest(work_dir).is_none() {
        bail!(
            "no {} found in {}",
            MANIFEST_NAMES.join(" or "),
            work_dir.display()
        );
    }

    match bundler_version {
        Some(version) => ensure_bundler_version(work_dir, version, ruby, runner)?,
        None => {
            if runner.locate(BUNDLE).is_none() {
                bail!(
                    "`{BUNDLE}` is not on PATH and the lockfile does not pin a Bundler version to install"
                );
            }
        }
    }

    let mut install = Invocation::new(BUNDLE, work_dir);
    if let Some(version) = bundler_version {
        install = install.arg(format!("_{version}_"));
    }
    install = install.args([
        "install".to_string(),
        "--jobs".to_string(),
        settings.bundle_install_jobs.to_string(),
        "--retry".to_string(),
        settings.bundle_install_retry.to_string(),
    ]);
    run_checked(runner, &install)
}

fn ensure_bundler_version<R: CommandRunner>(
    work_dir: &Path,
    version: &str,
    ruby: &RubyEnv,
    runner: &R,
) -> Result<()> {
    let check = ruby.gem_installed_check(work_dir, "bundler", version);
    let installed = runner
        .run(&check)
        .with_context(|| format!("run `{check}`"))?
        .success();
    if installed {
        info!(version, "bundler already installed");
        return Ok(());
    }

    info!(version, "installing bundler");
    run_checked(runner, &ruby.gem_install(work_dir, "bundler", Some(version), true))?;
    refresh_shims(work_dir, ruby, runner);
    Ok(())
}

fn install_direct<R: CommandRunner>(
    work_dir: &Path,
    request: FastlaneRequest,
    ruby: &RubyEnv,
    runner: &R,
) -> Result<()> {
    if request == FastlaneRequest::Existing {
        if let Some(path) = runner.locate(FASTLANE) {
            info!(path = %path.display(), "using preinstalled fastlane");
            return Ok(());
        }
        info!("fastlane not found on PATH, installing latest");
    } else {
        info!("updating fastlane to latest");
    }

    run_checked(runner, &ruby.gem_install(work_dir, FASTLANE, None, false))?;
    refresh_shims(work_dir, ruby, runner);
    Ok(())
}

fn refresh_shims<R: CommandRunner>(work_dir: &Path, ruby: &RubyEnv, runner: &R) {
    let Some(reshim) = ruby.reshim(work_dir) else {
        return;
    };
    match runner.run(&reshim) {
        Ok(outcome) if outcome.success() => {}
        Ok(outcome) => warn!(
            command = %reshim,
            exit_code = ?outcome.exit_code,
            "shim refresh failed"
        ),
        Err(e) => warn!(command = %reshim, err = %e, "shim refresh failed"),
    }
}

/// Run `invocation` and turn a non-zero exit into an error naming the command.
fn run_checked<R: CommandRunner>(runner: &R, invocation: &Invocation) -> Result<()> {
    info!(command = %invocation, "running");
    let outcome = runner
        .run(invocation)
        .with_context(|| format!("run `{invocation}`"))?;
    if !outcome.success() {
        return Err(anyhow!(
            "`{invocation}` exited with status {}",
            outcome
                .exit_code
                .map_or_else(|| "unknown (signal)".to_string(), |c| c.to_string())
        ));
    }
    Ok(())
}
