//! Assembles the fastlane command line from [`RunOptions`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::core::types::RunOptions;

pub const FASTLANE: &str = "fastlane";
pub const BUNDLE: &str = "bundle";
/// Tells the lane whether dependency caching is enabled for this run.
pub const CACHE_ENV_KEY: &str = "FASTLANE_RUNNER_CACHE_ENABLED";

/// A fully resolved process invocation.
///
/// Environment values may be secrets: they are excluded from `Debug` and
/// from [`Invocation::command_line`].
#[derive(Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub envs: BTreeMap<String, String>,
    pub work_dir: PathBuf,
}

impl Invocation {
    pub fn new(program: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: BTreeMap::new(),
            work_dir: work_dir.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.insert(key.into(), value.into());
        self
    }

    /// Program and arguments as a shell-like string, for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env_keys", &self.envs.keys().collect::<Vec<_>>())
            .field("work_dir", &self.work_dir)
            .finish()
    }
}

fn quote(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    if arg.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
        format!("'{}'", arg.replace('\'', r"'\''"))
    } else {
        arg.to_string()
    }
}

/// Build the lane invocation.
///
/// With Bundler: `bundle [_<version>_] exec fastlane <lane> <params...>`.
/// Without: `fastlane <lane> <params...>`. Params keep caller order.
pub fn assemble(opts: &RunOptions) -> Invocation {
    let mut invocation = if opts.use_bundler {
        let mut inv = Invocation::new(BUNDLE, opts.work_dir.clone());
        if let Some(version) = opts.gem_versions.bundler.as_pinned() {
            inv = inv.arg(format!("_{version}_"));
        }
        inv.arg("exec").arg(FASTLANE)
    } else {
        Invocation::new(FASTLANE, opts.work_dir.clone())
    };

    invocation = invocation
        .arg(opts.lane.lane.as_str())
        .args(opts.lane.params.iter().map(String::as_str));

    for (key, value) in opts.credentials.iter() {
        invocation = invocation.env(key, value);
    }
    invocation.env(CACHE_ENV_KEY, opts.enable_cache.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Credentials, GemVersion, GemVersions, LaneOptions};

    fn run_options(use_bundler: bool, lane: &str, params: &[&str]) -> RunOptions {
        RunOptions {
            work_dir: PathBuf::from("/work"),
            credentials: Credentials::new(),
            lane: LaneOptions {
                lane: lane.to_string(),
                params: params.iter().map(|p| p.to_string()).collect(),
            },
            use_bundler,
            gem_versions: GemVersions::default(),
            enable_cache: true,
        }
    }

    #[test]
    fn direct_invocation_has_no_bundler_prefix() {
        let inv = assemble(&run_options(false, "beta", &[]));
        assert_eq!(inv.command_line(), "fastlane beta");
        assert_eq!(inv.program, "fastlane");
    }

    #[test]
    fn managed_invocation_wraps_with_bundle_exec() {
        let inv = assemble(&run_options(true, "release", &["skip_upload:true"]));
        assert_eq!(
            inv.command_line(),
            "bundle exec fastlane release skip_upload:true"
        );
    }

    #[test]
    fn pinned_bundler_version_is_selected() {
        let mut opts = run_options(true, "beta", &[]);
        opts.gem_versions.bundler = GemVersion::pinned("2.4.10");
        let inv = assemble(&opts);
        assert_eq!(
            inv.args,
            vec!["_2.4.10_", "exec", "fastlane", "beta"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn params_keep_order_and_duplicates() {
        let inv = assemble(&run_options(false, "ios", &["beta", "a:1", "b:2", "a:1"]));
        assert_eq!(inv.args, vec!["ios", "beta", "a:1", "b:2", "a:1"]);
    }

    #[test]
    fn credentials_go_to_env_not_args() {
        let mut opts = run_options(false, "beta", &[]);
        opts.credentials.insert("FASTLANE_PASSWORD", "s3cret value");
        let inv = assemble(&opts);
        assert_eq!(
            inv.envs.get("FASTLANE_PASSWORD").map(String::as_str),
            Some("s3cret value")
        );
        assert!(!inv.command_line().contains("s3cret"));
        assert!(!format!("{inv:?}").contains("s3cret"));
        assert_eq!(inv.envs.get(CACHE_ENV_KEY).map(String::as_str), Some("true"));
    }

    #[test]
    fn equal_options_assemble_identically() {
        let mut a = run_options(true, "release", &["x:1", "y:2"]);
        a.credentials.insert("B", "2");
        a.credentials.insert("A", "1");
        let mut b = run_options(true, "release", &["x:1", "y:2"]);
        b.credentials.insert("A", "1");
        b.credentials.insert("B", "2");
        assert_eq!(a, b);
        assert_eq!(assemble(&a), assemble(&b));
        assert_eq!(assemble(&a).command_line(), assemble(&b).command_line());
    }

    #[test]
    fn command_line_quotes_whitespace() {
        let inv = assemble(&run_options(false, "beta", &["message:hello world"]));
        assert_eq!(inv.command_line(), "fastlane beta 'message:hello world'");
    }
}
