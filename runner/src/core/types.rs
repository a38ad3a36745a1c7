//! Shared deterministic types for the runner core.
//!
//! Each record is produced by exactly one stage and read by the next. None of
//! them depend on external state.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::Serialize;

/// A gem version pinned by the lockfile.
///
/// `found` is true iff the lockfile records the gem; `version` is empty otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GemVersion {
    pub version: String,
    pub found: bool,
}

impl GemVersion {
    pub fn pinned(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            found: true,
        }
    }

    pub fn not_found() -> Self {
        Self::default()
    }

    /// The pinned version, if any.
    pub fn as_pinned(&self) -> Option<&str> {
        self.found.then_some(self.version.as_str())
    }
}

/// Versions of fastlane and Bundler recorded in the working directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GemVersions {
    pub fastlane: GemVersion,
    pub bundler: GemVersion,
}

/// User override for routing through Bundler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BundlerPreference {
    /// Use Bundler iff the lockfile pins fastlane.
    #[default]
    Auto,
    /// Always use Bundler.
    #[value(name = "true", alias = "yes")]
    Always,
    /// Never use Bundler.
    #[value(name = "false", alias = "no")]
    Never,
}

/// Input to the dependency installer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyInstallOptions {
    pub gem_versions: GemVersions,
    /// Resolved: the lockfile pins fastlane and the user did not opt out.
    pub use_bundler: bool,
    /// The user explicitly asked for Bundler.
    pub force_bundler: bool,
    pub work_dir: PathBuf,
    pub update_fastlane: bool,
}

/// Which installation route was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallPath {
    /// Bundler resolves the lockfile and wraps the lane invocation.
    Managed,
    /// fastlane is installed into the ambient gem environment.
    Direct,
}

impl fmt::Display for InstallPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallPath::Managed => f.write_str("managed (bundler)"),
            InstallPath::Direct => f.write_str("direct (gem)"),
        }
    }
}

/// Lane identifier plus its positional parameters, in caller order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneOptions {
    pub lane: String,
    pub params: Vec<String>,
}

/// Secret environment variables for the lane process.
///
/// Values never appear in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials(BTreeMap<String, String>);

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.keys().map(|k| (k, "<redacted>")))
            .finish()
    }
}

/// Input to the invocation assembler. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub work_dir: PathBuf,
    pub credentials: Credentials,
    pub lane: LaneOptions,
    pub use_bundler: bool,
    pub gem_versions: GemVersions,
    pub enable_cache: bool,
}

/// Terminal result of the lane process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    /// `None` when the process could not be spawned or was killed by a signal.
    pub exit_code: Option<i32>,
    /// Remediation hint matched from the lane output, if any.
    pub hint: Option<String>,
}

impl ExecutionResult {
    pub fn from_exit_code(exit_code: Option<i32>) -> Self {
        Self {
            success: exit_code == Some(0),
            exit_code,
            hint: None,
        }
    }

    pub fn spawn_failed() -> Self {
        Self::from_exit_code(None)
    }
}
