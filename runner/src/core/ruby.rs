//! Ruby installation classification and the gem commands that depend on it.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::invocation::Invocation;

/// How the active `ruby` was installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RubyInstallKind {
    System,
    Homebrew,
    Rbenv,
    Rvm,
    Asdf,
    Unknown,
}

/// Classify a resolved `ruby` executable path.
pub fn classify_ruby_path(path: &Path) -> RubyInstallKind {
    let path = path.to_string_lossy();
    if path.contains("/.rbenv/") {
        RubyInstallKind::Rbenv
    } else if path.contains("/.asdf/") {
        RubyInstallKind::Asdf
    } else if path.contains("/.rvm/") {
        RubyInstallKind::Rvm
    } else if path.contains("/homebrew/")
        || path.contains("/Cellar/")
        || path.starts_with("/usr/local/opt/ruby")
    {
        RubyInstallKind::Homebrew
    } else if path == "/usr/bin/ruby" || path.starts_with("/System/Library/") {
        RubyInstallKind::System
    } else {
        RubyInstallKind::Unknown
    }
}

/// The Ruby environment gem commands run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RubyEnv {
    pub kind: RubyInstallKind,
    pub ruby_path: Option<PathBuf>,
}

impl RubyEnv {
    pub fn from_ruby_path(ruby_path: Option<PathBuf>) -> Self {
        let kind = ruby_path
            .as_deref()
            .map_or(RubyInstallKind::Unknown, classify_ruby_path);
        Self { kind, ruby_path }
    }

    /// `gem install <name> [--version <v>] [--force] --no-document`, via `sudo`
    /// for the system ruby.
    pub fn gem_install(
        &self,
        work_dir: &Path,
        name: &str,
        version: Option<&str>,
        force: bool,
    ) -> Invocation {
        let mut inv = if self.kind == RubyInstallKind::System {
            Invocation::new("sudo", work_dir).arg("gem")
        } else {
            Invocation::new("gem", work_dir)
        };
        inv = inv.arg("install").arg(name);
        if let Some(version) = version {
            inv = inv.arg("--version").arg(version);
        }
        if force {
            inv = inv.arg("--force");
        }
        inv.arg("--no-document")
    }

    /// `gem list -i <name> --version <v>`; exits 0 iff that version is installed.
    pub fn gem_installed_check(&self, work_dir: &Path, name: &str, version: &str) -> Invocation {
        Invocation::new("gem", work_dir).args(["list", "-i", name, "--version", version])
    }

    /// Command that refreshes executable shims after a gem install, if the
    /// version manager needs one.
    pub fn reshim(&self, work_dir: &Path) -> Option<Invocation> {
        match self.kind {
            RubyInstallKind::Rbenv => Some(Invocation::new("rbenv", work_dir).arg("rehash")),
            RubyInstallKind::Asdf => {
                Some(Invocation::new("asdf", work_dir).args(["reshim", "ruby"]))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_common_install_locations() {
        let cases = [
            ("/Users/ci/.rbenv/shims/ruby", RubyInstallKind::Rbenv),
            ("/Users/ci/.asdf/shims/ruby", RubyInstallKind::Asdf),
            ("/Users/ci/.rvm/rubies/ruby-3.2.2/bin/ruby", RubyInstallKind::Rvm),
            ("/opt/homebrew/opt/ruby/bin/ruby", RubyInstallKind::Homebrew),
            ("/usr/local/opt/ruby/bin/ruby", RubyInstallKind::Homebrew),
            ("/usr/bin/ruby", RubyInstallKind::System),
            ("/opt/custom/bin/ruby", RubyInstallKind::Unknown),
        ];
        for (path, expected) in cases {
            assert_eq!(classify_ruby_path(Path::new(path)), expected, "{path}");
        }
    }

    #[test]
    fn system_ruby_installs_with_sudo() {
        let env = RubyEnv::from_ruby_path(Some(PathBuf::from("/usr/bin/ruby")));
        let inv = env.gem_install(Path::new("/work"), "bundler", Some("2.4.10"), true);
        assert_eq!(
            inv.command_line(),
            "sudo gem install bundler --version 2.4.10 --force --no-document"
        );
    }

    #[test]
    fn rbenv_installs_without_sudo_and_rehashes() {
        let env = RubyEnv::from_ruby_path(Some(PathBuf::from("/home/ci/.rbenv/shims/ruby")));
        let inv = env.gem_install(Path::new("/work"), "fastlane", None, false);
        assert_eq!(inv.command_line(), "gem install fastlane --no-document");
        let reshim = env.reshim(Path::new("/work")).expect("rbenv reshim");
        assert_eq!(reshim.command_line(), "rbenv rehash");
    }

    #[test]
    fn missing_ruby_is_unknown_without_reshim() {
        let env = RubyEnv::from_ruby_path(None);
        assert_eq!(env.kind, RubyInstallKind::Unknown);
        assert!(env.reshim(Path::new("/work")).is_none());
    }
}
