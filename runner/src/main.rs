//! `fastlane-runner`: prepare the Ruby toolchain and run one fastlane lane.
//!
//! Exits 0 when the lane succeeds and 1 when any stage fails.

use clap::Parser;
use clap::error::ErrorKind;
use tracing::{error, info};

use fastlane_runner::config::{StepConfig, StepInputs};
use fastlane_runner::error::StepError;
use fastlane_runner::exit_codes;
use fastlane_runner::io::process::SystemCommandRunner;
use fastlane_runner::io::settings::{RunnerSettings, load_settings};
use fastlane_runner::logging;
use fastlane_runner::pipeline::run_pipeline;
use fastlane_runner::telemetry::{Event, Recorder};

fn main() {
    let inputs = match StepInputs::try_parse() {
        Ok(inputs) => inputs,
        Err(err) => {
            let _ = err.print();
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit_codes::OK,
                _ => exit_codes::FAILURE,
            };
            std::process::exit(code);
        }
    };
    logging::init(inputs.verbose_log);

    let settings = match load_settings(inputs.settings.as_deref()) {
        Ok(settings) => settings,
        Err(cause) => {
            error!("{}", StepError::configuration(cause));
            std::process::exit(exit_codes::FAILURE);
        }
    };

    let recorder = Recorder::from_settings(&settings.telemetry);
    let outcome = run(inputs, &settings, &recorder);

    let mut finished = Event::new("run_finished").with("success", outcome.is_ok());
    if let Err(err) = &outcome {
        finished = finished.with("failed_stage", err.stage());
    }
    recorder.record(finished);
    recorder.flush_and_wait(settings.telemetry.flush_timeout());

    let code = match outcome {
        Ok(()) => {
            info!("lane completed successfully");
            exit_codes::OK
        }
        Err(err) => {
            error!("{err}");
            exit_codes::FAILURE
        }
    };
    std::process::exit(code);
}

fn run(
    inputs: StepInputs,
    settings: &RunnerSettings,
    recorder: &Recorder,
) -> Result<(), StepError> {
    let config = StepConfig::from_inputs(inputs).map_err(StepError::configuration)?;
    info!(
        lane = %config.lane.lane,
        work_dir = %config.work_dir.display(),
        bundler = ?config.bundler,
        update_fastlane = config.update_fastlane,
        enable_cache = config.enable_cache,
        credentials = ?config.credentials,
        "configuration"
    );

    let runner = SystemCommandRunner::new(settings.output_tail_bytes);
    run_pipeline(&config, settings, &runner, recorder).map(|_| ())
}
