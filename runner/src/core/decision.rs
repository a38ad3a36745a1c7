//! Managed-vs-direct routing decisions.
//!
//! Precedence: an explicit `true` override or a lockfile that pins fastlane
//! selects Bundler; everything else installs fastlane directly.

use crate::core::types::{BundlerPreference, DependencyInstallOptions, GemVersions, InstallPath};

/// Whether the lane should run through `bundle exec`.
pub fn resolve_use_bundler(gem_versions: &GemVersions, preference: BundlerPreference) -> bool {
    match preference {
        BundlerPreference::Always => true,
        BundlerPreference::Never => false,
        BundlerPreference::Auto => gem_versions.fastlane.found,
    }
}

/// How the direct path obtains fastlane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastlaneRequest {
    /// Install the newest release.
    Latest,
    /// Keep whatever `fastlane` is on `PATH`; install the newest only if absent.
    Existing,
}

/// Installation steps chosen for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallPlan {
    Managed { bundler_version: Option<String> },
    Direct { fastlane: FastlaneRequest },
}

impl InstallPlan {
    pub fn path(&self) -> InstallPath {
        match self {
            InstallPlan::Managed { .. } => InstallPath::Managed,
            InstallPlan::Direct { .. } => InstallPath::Direct,
        }
    }
}

/// Decide the installation route. `update_fastlane` only affects the direct path.
pub fn plan_install(opts: &DependencyInstallOptions) -> InstallPlan {
    if opts.use_bundler || opts.force_bundler {
        return InstallPlan::Managed {
            bundler_version: opts.gem_versions.bundler.as_pinned().map(str::to_string),
        };
    }
    let fastlane = if opts.update_fastlane {
        FastlaneRequest::Latest
    } else {
        FastlaneRequest::Existing
    };
    InstallPlan::Direct { fastlane }
}
