//! Reads the lockfile in the working directory.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::lockfile::parse_gem_versions;
use crate::core::types::GemVersions;

/// Lockfile names, in lookup order.
pub const LOCKFILE_NAMES: [&str; 2] = ["Gemfile.lock", "gems.locked"];
/// Manifest names, in lookup order.
pub const MANIFEST_NAMES: [&str; 2] = ["Gemfile", "gems.rb"];

pub fn find_lockfile(work_dir: &Path) -> Option<PathBuf> {
    find_first(work_dir, &LOCKFILE_NAMES)
}

pub fn find_manifest(work_dir: &Path) -> Option<PathBuf> {
    find_first(work_dir, &MANIFEST_NAMES)
}

fn find_first(work_dir: &Path, names: &[&str]) -> Option<PathBuf> {
    names
        .iter()
        .map(|name| work_dir.join(name))
        .find(|path| path.is_file())
}

/// Inspect `work_dir` for pinned fastlane and Bundler versions.
///
/// Absence or an unreadable lockfile is reported as not found, never as an error.
pub fn inspect(work_dir: &Path) -> GemVersions {
    let Some(lockfile) = find_lockfile(work_dir) else {
        debug!(work_dir = %work_dir.display(), "no lockfile found");
        return GemVersions::default();
    };

    match fs::read_to_string(&lockfile) {
        Ok(contents) => {
            let versions = parse_gem_versions(&contents);
            debug!(
                lockfile = %lockfile.display(),
                fastlane = ?versions.fastlane.as_pinned(),
                bundler = ?versions.bundler.as_pinned(),
                "parsed lockfile"
            );
            versions
        }
        Err(e) => {
            warn!(lockfile = %lockfile.display(), err = %e, "failed to read lockfile, ignoring it");
            GemVersions::default()
        }
    }
}
