//! Test-only helpers: a scripted command runner, an in-memory telemetry sink,
//! and working-directory fixtures.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::core::invocation::Invocation;
use crate::io::process::{CommandOutcome, CommandRunner};
use crate::telemetry::{Event, TelemetrySink};

/// Lockfile pinning fastlane 2.219.0 and Bundler 2.4.10.
pub const PINNED_LOCKFILE: &str = "\
GEM
  remote: https://rubygems.org/
  specs:
    fastlane (2.219.0)
      xcpretty (~> 0.3.0)
    xcpretty (0.3.0)

PLATFORMS
  ruby

DEPENDENCIES
  fastlane

BUNDLED WITH
   2.4.10
";

struct Rule {
    prefix: String,
    exit_code: Option<i32>,
    output: String,
    spawn_error: bool,
}

/// Records invocations instead of spawning processes.
///
/// Commands succeed with empty output unless a rule registered through
/// [`fail_when`](Self::fail_when), [`output_when`](Self::output_when) or
/// [`spawn_error_when`](Self::spawn_error_when) matches the start of their
/// command line. The first matching rule wins.
#[derive(Default)]
pub struct ScriptedCommandRunner {
    rules: Vec<Rule>,
    located: HashSet<String>,
    calls: RefCell<Vec<Invocation>>,
}

impl ScriptedCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `program` resolvable through [`CommandRunner::locate`].
    pub fn with_located(mut self, program: &str) -> Self {
        self.located.insert(program.to_string());
        self
    }

    pub fn fail_when(mut self, prefix: &str, exit_code: i32) -> Self {
        self.rules.push(Rule {
            prefix: prefix.to_string(),
            exit_code: Some(exit_code),
            output: String::new(),
            spawn_error: false,
        });
        self
    }

    pub fn output_when(mut self, prefix: &str, exit_code: i32, output: &str) -> Self {
        self.rules.push(Rule {
            prefix: prefix.to_string(),
            exit_code: Some(exit_code),
            output: output.to_string(),
            spawn_error: false,
        });
        self
    }

    pub fn spawn_error_when(mut self, prefix: &str) -> Self {
        self.rules.push(Rule {
            prefix: prefix.to_string(),
            exit_code: None,
            output: String::new(),
            spawn_error: true,
        });
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(Invocation::command_line)
            .collect()
    }

    /// Return recorded command lines and forget them.
    pub fn take_command_lines(&self) -> Vec<String> {
        let lines = self.command_lines();
        self.calls.borrow_mut().clear();
        lines
    }
}

impl CommandRunner for ScriptedCommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutcome> {
        self.calls.borrow_mut().push(invocation.clone());
        let line = invocation.command_line();
        match self.rules.iter().find(|rule| line.starts_with(&rule.prefix)) {
            Some(rule) if rule.spawn_error => Err(anyhow!("scripted spawn failure for `{line}`")),
            Some(rule) => Ok(CommandOutcome {
                exit_code: rule.exit_code,
                output_tail: rule.output.clone().into_bytes(),
            }),
            None => Ok(CommandOutcome {
                exit_code: Some(0),
                output_tail: Vec::new(),
            }),
        }
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        self.located
            .contains(program)
            .then(|| PathBuf::from(format!("/usr/local/bin/{program}")))
    }
}

/// Telemetry sink that keeps events in memory.
#[derive(Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.name).collect()
    }
}

impl TelemetrySink for MemorySink {
    fn send(&mut self, event: &Event) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow!("memory sink poisoned"))?
            .push(event.clone());
        Ok(())
    }
}

/// Empty working directory with a `Gemfile` only.
pub fn work_dir_with_gemfile() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("Gemfile"),
        "source \"https://rubygems.org\"\ngem \"fastlane\"\n",
    )
    .expect("write Gemfile");
    dir
}

/// Working directory with a `Gemfile` and the given `Gemfile.lock` contents.
pub fn work_dir_with_lockfile(lockfile: &str) -> TempDir {
    let dir = work_dir_with_gemfile();
    fs::write(dir.path().join("Gemfile.lock"), lockfile).expect("write Gemfile.lock");
    dir
}
