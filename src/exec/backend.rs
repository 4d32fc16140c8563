// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! The runtime talks to a `ProcessBackend` instead of `tokio::process`
//! directly. Production uses [`RealProcessBackend`]; tests provide a fake
//! backend that hands out in-memory stdin pipes and records signals, and
//! then injects output/exit events themselves.

use std::fmt;
use std::path::PathBuf;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::engine::SupervisorEvent;
use crate::errors::{BotvisorError, Result};
use crate::types::StopSignal;

use super::process_runner::spawn_supervised;

/// Everything needed to start one run of a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnSpec {
    pub project: String,
    pub run_id: u64,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

/// Writable standard input of a managed process.
pub type StdinPipe = Box<dyn AsyncWrite + Send + Unpin>;

/// Handle to one live subprocess.
///
/// Output and exit are reported asynchronously as [`SupervisorEvent`]s; the
/// handle itself only carries the input pipe and the signal channel.
pub struct ProcessHandle {
    run_id: u64,
    pid: Option<u32>,
    stdin: Option<StdinPipe>,
    control: mpsc::UnboundedSender<StopSignal>,
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("run_id", &self.run_id)
            .field("pid", &self.pid)
            .field("stdin_open", &self.stdin.is_some())
            .finish()
    }
}

impl ProcessHandle {
    pub fn new(
        run_id: u64,
        pid: Option<u32>,
        stdin: Option<StdinPipe>,
        control: mpsc::UnboundedSender<StopSignal>,
    ) -> Self {
        Self {
            run_id,
            pid,
            stdin,
            control,
        }
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Ask the process owner to deliver `signal`.
    ///
    /// Returns `false` when the process has already been reaped; its exit
    /// event is then already on its way.
    pub fn signal(&self, signal: StopSignal) -> bool {
        self.control.send(signal).is_ok()
    }

    /// Write `text` plus a newline to the process's standard input.
    pub async fn write_line(&mut self, text: &str) -> Result<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(BotvisorError::InputRoutingFailure(
                "the process input stream is closed".to_string(),
            ));
        };

        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');

        let res = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await
        }
        .await;

        if let Err(e) = res {
            debug!(run_id = self.run_id, error = %e, "stdin write failed; closing pipe");
            self.stdin = None;
            return Err(BotvisorError::InputRoutingFailure(e.to_string()));
        }
        Ok(())
    }
}

/// Trait abstracting how managed processes are started.
pub trait ProcessBackend: Send {
    /// Start the process described by `spec`.
    ///
    /// Output chunks and the final exit are reported on the runtime event
    /// channel as `ProcessOutput` / `ProcessExited`, with every output event
    /// for a run delivered before its exit event.
    fn spawn(&mut self, spec: SpawnSpec) -> Result<ProcessHandle>;
}

/// Real process backend used in production, built on `tokio::process`.
pub struct RealProcessBackend {
    events: mpsc::Sender<SupervisorEvent>,
}

impl RealProcessBackend {
    pub fn new(events: mpsc::Sender<SupervisorEvent>) -> Self {
        Self { events }
    }
}

impl ProcessBackend for RealProcessBackend {
    fn spawn(&mut self, spec: SpawnSpec) -> Result<ProcessHandle> {
        spawn_supervised(spec, self.events.clone())
    }
}
