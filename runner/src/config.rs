//! Step inputs and their validation.
//!
//! Inputs come from flags or from the environment variables a CI step
//! receives them in. [`StepConfig::from_inputs`] validates them once; the rest
//! of the runner only sees the resulting immutable [`StepConfig`].

use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow, bail};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use regex::Regex;

use crate::core::types::{BundlerPreference, Credentials, LaneOptions};

pub const FASTLANE_USER: &str = "FASTLANE_USER";
pub const FASTLANE_PASSWORD: &str = "FASTLANE_PASSWORD";
pub const FASTLANE_APP_PASSWORD: &str = "FASTLANE_APPLE_APPLICATION_SPECIFIC_PASSWORD";
pub const FASTLANE_SESSION: &str = "FASTLANE_SESSION";
pub const API_KEY_PATH: &str = "APP_STORE_CONNECT_API_KEY_PATH";

static ENV_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

#[derive(Debug, Parser)]
#[command(
    name = "fastlane-runner",
    version,
    about = "Prepare the Ruby toolchain and run a fastlane lane"
)]
pub struct StepInputs {
    /// Lane to run, optionally followed by parameters (e.g. "ios beta key:value").
    #[arg(long, env = "lane")]
    pub lane: Option<String>,

    /// Extra lane parameters, appended in order.
    #[arg(last = true, value_name = "PARAM")]
    pub params: Vec<String>,

    /// Directory containing the Fastfile and Gemfile.
    #[arg(long, env = "work_dir", default_value = ".")]
    pub work_dir: PathBuf,

    /// Install the latest fastlane when not running through Bundler.
    #[arg(
        long,
        env = "update_fastlane",
        default_value = "no",
        default_missing_value = "yes",
        num_args = 0..=1,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub update_fastlane: bool,

    /// Route through Bundler: auto (when Gemfile.lock pins fastlane), true or false.
    #[arg(long, env = "use_bundler", value_enum, default_value_t = BundlerPreference::Auto)]
    pub use_bundler: BundlerPreference,

    /// Tell the lane that dependency caching is enabled.
    #[arg(
        long,
        env = "enable_cache",
        default_value = "yes",
        default_missing_value = "yes",
        num_args = 0..=1,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub enable_cache: bool,

    /// Pass `--verbose` to fastlane and log at debug level.
    #[arg(
        long,
        env = "verbose_log",
        default_value = "no",
        default_missing_value = "yes",
        num_args = 0..=1,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub verbose_log: bool,

    /// Apple ID for fastlane's Apple Developer Portal login.
    #[arg(long, env = "apple_id", hide_env_values = true)]
    pub apple_id: Option<String>,

    /// Apple ID password.
    #[arg(long, env = "password", hide_env_values = true)]
    pub password: Option<String>,

    /// Apple application-specific password.
    #[arg(long, env = "app_password", hide_env_values = true)]
    pub app_password: Option<String>,

    /// Pre-generated fastlane session (`fastlane spaceauth`).
    #[arg(long, env = "fastlane_session", hide_env_values = true)]
    pub session: Option<String>,

    /// App Store Connect API key JSON file.
    #[arg(long, env = "api_key_path")]
    pub api_key_path: Option<PathBuf>,

    /// Additional secret environment variable for the lane.
    #[arg(long = "credential", value_name = "KEY=VALUE", value_parser = parse_credential)]
    pub credentials: Vec<(String, String)>,

    /// Runner settings TOML file.
    #[arg(long, env = "FASTLANE_RUNNER_SETTINGS")]
    pub settings: Option<PathBuf>,
}

fn parse_credential(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| "expected KEY=VALUE".to_string())?;
    if !ENV_KEY_RE.is_match(key) {
        return Err(format!("invalid environment variable name '{key}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Validated, immutable step configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepConfig {
    pub work_dir: PathBuf,
    pub lane: LaneOptions,
    pub credentials: Credentials,
    pub update_fastlane: bool,
    pub bundler: BundlerPreference,
    pub enable_cache: bool,
}

impl StepConfig {
    pub fn from_inputs(inputs: StepInputs) -> Result<Self> {
        let lane = parse_lane(
            inputs.lane.as_deref(),
            &inputs.params,
            inputs.verbose_log,
        )?;

        if !inputs.work_dir.is_dir() {
            bail!(
                "work_dir {} does not exist or is not a directory",
                inputs.work_dir.display()
            );
        }
        let work_dir = inputs
            .work_dir
            .canonicalize()
            .with_context(|| format!("resolve work_dir {}", inputs.work_dir.display()))?;

        let credentials = collect_credentials(&inputs)?;

        Ok(Self {
            work_dir,
            lane,
            credentials,
            update_fastlane: inputs.update_fastlane,
            bundler: inputs.use_bundler,
            enable_cache: inputs.enable_cache,
        })
    }
}

/// Split the lane input on whitespace: first token is the lane, the rest are
/// parameters, followed by `extra` and finally `--verbose` when requested.
fn parse_lane(raw: Option<&str>, extra: &[String], verbose: bool) -> Result<LaneOptions> {
    let raw = raw.map(str::trim).unwrap_or_default();
    let mut tokens = raw.split_whitespace();
    let lane = tokens
        .next()
        .ok_or_else(|| anyhow!("lane is required"))?
        .to_string();
    let mut params: Vec<String> = tokens.map(str::to_string).collect();
    params.extend(extra.iter().cloned());
    if verbose {
        params.push("--verbose".to_string());
    }
    Ok(LaneOptions { lane, params })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn collect_credentials(inputs: &StepInputs) -> Result<Credentials> {
    let mut credentials = Credentials::new();

    let apple_id = non_blank(inputs.apple_id.as_deref());
    let password = non_blank(inputs.password.as_deref());
    let app_password = non_blank(inputs.app_password.as_deref());
    let session = non_blank(inputs.session.as_deref());

    if apple_id.is_none() && (password.is_some() || app_password.is_some() || session.is_some()) {
        bail!("apple_id is required when password, app_password or session is set");
    }
    for (key, value) in [
        (FASTLANE_USER, apple_id),
        (FASTLANE_PASSWORD, password),
        (FASTLANE_APP_PASSWORD, app_password),
        (FASTLANE_SESSION, session),
    ] {
        if let Some(value) = value {
            credentials.insert(key, value);
        }
    }

    // The lane runs inside work_dir, so relative paths must be resolved here.
    if let Some(path) = &inputs.api_key_path {
        if !path.is_file() {
            bail!("api_key_path {} is not a file", path.display());
        }
        let path = path
            .canonicalize()
            .with_context(|| format!("resolve api_key_path {}", path.display()))?;
        credentials.insert(API_KEY_PATH, path.to_string_lossy());
    }

    for (key, value) in &inputs.credentials {
        if !value.trim().is_empty() {
            credentials.insert(key.as_str(), value.as_str());
        }
    }

    Ok(credentials)
}
