//! Fire-and-forget run telemetry.
//!
//! Events go through a bounded queue to a background thread that owns the
//! sink. [`Recorder::record`] never blocks; [`Recorder::flush_and_wait`] is the
//! single join point at process end and gives up after a timeout. Telemetry
//! failures are logged and never change the run's outcome.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::io::settings::TelemetrySettings;

/// A single coarse-grained fact about the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub properties: Map<String, Value>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp: Utc::now(),
            properties: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// Destination for telemetry events. Runs on the recorder's worker thread.
pub trait TelemetrySink: Send + 'static {
    fn send(&mut self, event: &Event) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Appends one JSON object per line.
pub struct JsonlSink {
    writer: BufWriter<File>,
}

impl JsonlSink {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create telemetry dir {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open telemetry file {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl TelemetrySink for JsonlSink {
    fn send(&mut self, event: &Event) -> Result<()> {
        let line = serde_json::to_string(event).context("serialize telemetry event")?;
        self.writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.write_all(b"\n"))
            .context("write telemetry event")
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("flush telemetry file")
    }
}

/// Emits each event as a `debug!` line.
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn send(&mut self, event: &Event) -> Result<()> {
        debug!(
            event = %event.name,
            properties = %serde_json::Value::Object(event.properties.clone()),
            "telemetry"
        );
        Ok(())
    }
}

struct Worker {
    tx: SyncSender<Event>,
    done: Receiver<()>,
    handle: JoinHandle<()>,
}

/// Owns the telemetry queue.
pub struct Recorder {
    worker: Option<Worker>,
}

impl Recorder {
    /// Spawn the worker thread with a queue of `capacity` events.
    pub fn start<S: TelemetrySink>(mut sink: S, capacity: usize) -> Self {
        let (tx, rx) = mpsc::sync_channel::<Event>(capacity);
        let (done_tx, done) = mpsc::channel();
        let handle = thread::spawn(move || {
            for event in rx {
                if let Err(e) = sink.send(&event) {
                    debug!(err = %e, event = %event.name, "telemetry send failed");
                }
            }
            if let Err(e) = sink.flush() {
                debug!(err = %e, "telemetry flush failed");
            }
            let _ = done_tx.send(());
        });
        Self {
            worker: Some(Worker { tx, done, handle }),
        }
    }

    /// A recorder that drops everything.
    pub fn disabled() -> Self {
        Self { worker: None }
    }

    /// Build the recorder described by `settings`.
    ///
    /// A JSONL sink that cannot be opened degrades to the tracing sink.
    pub fn from_settings(settings: &TelemetrySettings) -> Self {
        if !settings.enabled {
            return Self::disabled();
        }
        match settings.path.as_deref() {
            Some(path) => match JsonlSink::open(path) {
                Ok(sink) => Self::start(sink, settings.queue_capacity),
                Err(e) => {
                    warn!(
                        err = %format!("{e:#}"),
                        "telemetry file unavailable, logging events instead"
                    );
                    Self::start(TracingSink, settings.queue_capacity)
                }
            },
            None => Self::start(TracingSink, settings.queue_capacity),
        }
    }

    /// Queue `event` without blocking. Dropped when the queue is full.
    pub fn record(&self, event: Event) {
        let Some(worker) = &self.worker else {
            return;
        };
        match worker.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                debug!(event = %event.name, "telemetry queue full, dropping event");
            }
            Err(TrySendError::Disconnected(event)) => {
                debug!(event = %event.name, "telemetry worker gone, dropping event");
            }
        }
    }

    /// Close the queue and wait up to `timeout` for buffered events to be sent.
    ///
    /// Returns `true` if everything was delivered to the sink in time.
    pub fn flush_and_wait(self, timeout: Duration) -> bool {
        let Some(Worker { tx, done, handle }) = self.worker else {
            return true;
        };
        drop(tx);
        match done.recv_timeout(timeout) {
            Ok(()) => {
                let _ = handle.join();
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "telemetry flush timed out, abandoning pending events"
                );
                false
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("telemetry worker exited unexpectedly");
                false
            }
        }
    }
}
