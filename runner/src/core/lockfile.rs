//! Gemfile.lock parsing.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::{GemVersion, GemVersions};

/// Resolved spec lines sit at four spaces under `specs:`; dependency lines of
/// a spec are indented further and are not matched.
static FASTLANE_SPEC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^ {4}fastlane \(([^)\s]+)\)\s*$").unwrap());

/// Extract the fastlane and Bundler versions pinned by lockfile `contents`.
///
/// Missing entries yield `found: false`; this never fails.
pub fn parse_gem_versions(contents: &str) -> GemVersions {
    let fastlane = FASTLANE_SPEC_RE
        .captures(contents)
        .and_then(|caps| caps.get(1))
        .map(|m| GemVersion::pinned(m.as_str()))
        .unwrap_or_default();

    GemVersions {
        fastlane,
        bundler: parse_bundled_with(contents),
    }
}

fn parse_bundled_with(contents: &str) -> GemVersion {
    let mut lines = contents.lines();
    if !lines.any(|line| line.trim_end() == "BUNDLED WITH") {
        return GemVersion::not_found();
    }
    lines
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(GemVersion::pinned)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCKFILE: &str = "\
GEM
  remote: https://rubygems.org/
  specs:
    CFPropertyList (3.0.6)
      rexml
    fastlane (2.219.0)
      CFPropertyList (>= 2.3, < 4.0.0)
      addressable (>= 2.8, < 3.0.0)
    rexml (3.2.6)

PLATFORMS
  arm64-darwin-22

DEPENDENCIES
  fastlane

BUNDLED WITH
   2.4.10
";

    #[test]
    fn parses_fastlane_and_bundler() {
        let versions = parse_gem_versions(LOCKFILE);
        assert_eq!(versions.fastlane, GemVersion::pinned("2.219.0"));
        assert_eq!(versions.bundler, GemVersion::pinned("2.4.10"));
    }

    #[test]
    fn dependency_lines_are_not_specs() {
        let contents = "\
GEM
  specs:
    fastlane-plugin-foo (0.1.0)
      fastlane (>= 2.0)

DEPENDENCIES
  fastlane
";
        let versions = parse_gem_versions(contents);
        assert!(!versions.fastlane.found);
        assert!(versions.fastlane.version.is_empty());
    }

    #[test]
    fn missing_bundled_with_is_not_found() {
        let contents = "GEM\n  specs:\n    fastlane (2.100.0)\n";
        let versions = parse_gem_versions(contents);
        assert_eq!(versions.fastlane.as_pinned(), Some("2.100.0"));
        assert_eq!(versions.bundler, GemVersion::not_found());
    }

    #[test]
    fn empty_contents_find_nothing() {
        assert_eq!(parse_gem_versions(""), GemVersions::default());
    }

    #[test]
    fn platform_suffixed_versions_are_kept_verbatim() {
        let contents = "GEM\n  specs:\n    fastlane (2.219.0-x86_64-linux)\n";
        assert_eq!(
            parse_gem_versions(contents).fastlane.as_pinned(),
            Some("2.219.0-x86_64-linux")
        );
    }
}
