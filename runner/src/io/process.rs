//! Child process execution with live pass-through output.
//!
//! There are no timeouts: Bundler installs and lanes may legitimately run for
//! many minutes, and they end only when the child exits or the process group
//! is killed from outside. Once the child has exited, output is drained for a
//! short grace period only.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};

use crate::core::invocation::Invocation;

/// Exit status plus the last bytes the child wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    /// Bounded tail of combined stdout/stderr, for diagnostics.
    pub output_tail: Vec<u8>,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn tail_lossy(&self) -> String {
        String::from_utf8_lossy(&self.output_tail).into_owned()
    }
}

/// Abstraction over process spawning and `PATH` lookup.
///
/// Tests substitute a scripted implementation that records invocations.
pub trait CommandRunner {
    /// Run to completion, streaming output. `Err` only when the process
    /// could not be spawned or waited on.
    fn run(&self, invocation: &Invocation) -> Result<CommandOutcome>;

    /// Resolve an executable on `PATH`.
    fn locate(&self, program: &str) -> Option<PathBuf>;
}

/// How long output readers may keep draining after the child has exited.
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Spawns real processes.
#[derive(Debug, Clone)]
pub struct SystemCommandRunner {
    tail_limit_bytes: usize,
    drain_grace: Duration,
}

impl SystemCommandRunner {
    pub fn new(tail_limit_bytes: usize) -> Self {
        Self {
            tail_limit_bytes,
            drain_grace: DEFAULT_DRAIN_GRACE,
        }
    }

    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }
}

impl CommandRunner for SystemCommandRunner {
    #[instrument(skip_all, fields(program = %invocation.program))]
    fn run(&self, invocation: &Invocation) -> Result<CommandOutcome> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .envs(&invocation.envs)
            .current_dir(&invocation.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(command = %invocation, "spawning child process");
        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                error!(err = %e, command = %invocation, "failed to spawn command");
                return Err(e).with_context(|| format!("spawn `{invocation}`"));
            }
        };

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("stderr was not piped"))?;

        // Each stream keeps half the budget so a noisy stderr cannot push
        // stdout diagnostics out of the tail.
        let per_stream = (self.tail_limit_bytes / 2).max(1);
        let stdout_tail = TailBuffer::default();
        let stderr_tail = TailBuffer::default();
        let (done_tx, done_rx) = mpsc::channel();
        spawn_reader(
            stdout,
            std::io::stdout(),
            stdout_tail.clone(),
            per_stream,
            done_tx.clone(),
        );
        spawn_reader(
            stderr,
            std::io::stderr(),
            stderr_tail.clone(),
            per_stream,
            done_tx,
        );

        let status = child.wait().context("wait for command")?;
        wait_for_readers(&done_rx, 2, self.drain_grace);

        let mut output_tail = stdout_tail.snapshot();
        output_tail.extend(stderr_tail.snapshot());

        debug!(exit_code = ?status.code(), "command finished");
        Ok(CommandOutcome {
            exit_code: status.code(),
            output_tail,
        })
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

/// Bounded output tail shared between a reader thread and the runner.
#[derive(Clone, Default)]
struct TailBuffer(Arc<Mutex<Vec<u8>>>);

impl TailBuffer {
    fn push(&self, data: &[u8], limit: usize) {
        if let Ok(mut buf) = self.0.lock() {
            buf.extend_from_slice(data);
            trim_to_tail(&mut buf, limit);
        }
    }

    fn snapshot(&self) -> Vec<u8> {
        self.0.lock().map(|buf| buf.clone()).unwrap_or_default()
    }
}

fn spawn_reader<R, W>(reader: R, sink: W, tail: TailBuffer, limit: usize, done: Sender<()>)
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    thread::spawn(move || {
        if let Err(e) = tee_stream(reader, sink, &tail, limit) {
            debug!(err = %format!("{e:#}"), "output reader stopped");
        }
        let _ = done.send(());
    });
}

/// Wait for `readers` completion signals, at most `grace` in total.
///
/// Background processes started by the child inherit its pipes and can keep
/// them open indefinitely; past the grace period the readers are detached and
/// whatever tail they collected so far is used.
fn wait_for_readers(done: &Receiver<()>, readers: usize, grace: Duration) {
    let deadline = Instant::now() + grace;
    for _ in 0..readers {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match done.recv_timeout(remaining) {
            Ok(()) => {}
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
                    "output still open after the command exited, detaching readers"
                );
                return;
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// Forward every chunk to `sink` as soon as it arrives, keeping the last
/// `limit` bytes in `tail`.
fn tee_stream<R: Read, W: Write>(
    mut reader: R,
    mut sink: W,
    tail: &TailBuffer,
    limit: usize,
) -> Result<()> {
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let data = &chunk[..n];
        // A closed parent stream must not stop us from draining the child.
        if sink.write_all(data).and_then(|()| sink.flush()).is_err() {
            debug!("parent stream closed, output dropped");
        }
        tail.push(data, limit);
    }

    Ok(())
}

fn trim_to_tail(buf: &mut Vec<u8>, limit: usize) {
    if buf.len() > limit {
        let excess = buf.len() - limit;
        buf.drain(..excess);
    }
}
