//! Diagnostic tracing for the runner.
//!
//! Logs go to stderr so the lane's own output on stdout stays untouched.
//! `RUST_LOG` overrides the default level; `verbose_log` lowers it to `debug`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global subscriber. Later calls are ignored.
///
/// # Example
/// ```bash
/// RUST_LOG=fastlane_runner=trace fastlane-runner --lane beta
/// ```
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
