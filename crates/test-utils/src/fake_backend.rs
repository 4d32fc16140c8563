use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::AsyncWrite;
use tokio::sync::mpsc;

use botvisor::errors::{BotvisorError, Result};
use botvisor::exec::{ProcessBackend, ProcessHandle, SpawnSpec, StdinPipe};
use botvisor::types::StopSignal;

/// Stdin that records everything written to it.
struct RecordingStdin {
    written: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
}

impl AsyncWrite for RecordingStdin {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        if self.closed.load(Ordering::SeqCst) {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin closed")));
        }
        self.written.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

struct FakeRun {
    spec: SpawnSpec,
    stdin: Arc<Mutex<Vec<u8>>>,
    stdin_closed: Arc<AtomicBool>,
    control: mpsc::UnboundedReceiver<StopSignal>,
    signals: Vec<StopSignal>,
}

#[derive(Default)]
struct FakeState {
    runs: Vec<FakeRun>,
    fail_next: Option<String>,
}

/// A fake process backend that:
/// - records every spawn request
/// - hands out in-memory stdin pipes
/// - records signals sent through the handle
///
/// It never reports output or exits; tests inject those events themselves.
/// Clones share state, so a test can keep one while the runtime owns another.
#[derive(Clone, Default)]
pub struct FakeProcessBackend {
    state: Arc<Mutex<FakeState>>,
}

impl std::fmt::Debug for FakeProcessBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeProcessBackend").finish_non_exhaustive()
    }
}

impl FakeProcessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next spawn fail with `message`.
    pub fn fail_next_spawn(&self, message: &str) {
        self.state.lock().unwrap().fail_next = Some(message.to_string());
    }

    pub fn spawned(&self) -> Vec<SpawnSpec> {
        self.state.lock().unwrap().runs.iter().map(|r| r.spec.clone()).collect()
    }

    pub fn spawn_count(&self) -> usize {
        self.state.lock().unwrap().runs.len()
    }

    pub fn last_run_id(&self) -> Option<u64> {
        self.state.lock().unwrap().runs.last().map(|r| r.spec.run_id)
    }

    /// Everything written to the stdin of `run_id`.
    pub fn stdin_text(&self, run_id: u64) -> String {
        let state = self.state.lock().unwrap();
        state
            .runs
            .iter()
            .find(|r| r.spec.run_id == run_id)
            .map(|r| String::from_utf8_lossy(&r.stdin.lock().unwrap()).into_owned())
            .unwrap_or_default()
    }

    /// Make further writes to the stdin of `run_id` fail.
    pub fn close_stdin(&self, run_id: u64) {
        let state = self.state.lock().unwrap();
        if let Some(run) = state.runs.iter().find(|r| r.spec.run_id == run_id) {
            run.stdin_closed.store(true, Ordering::SeqCst);
        }
    }

    /// Signals delivered to `run_id` so far, in order.
    pub fn signals(&self, run_id: u64) -> Vec<StopSignal> {
        let mut state = self.state.lock().unwrap();
        let Some(run) = state.runs.iter_mut().find(|r| r.spec.run_id == run_id) else {
            return Vec::new();
        };
        while let Ok(sig) = run.control.try_recv() {
            run.signals.push(sig);
        }
        run.signals.clone()
    }
}

impl ProcessBackend for FakeProcessBackend {
    fn spawn(&mut self, spec: SpawnSpec) -> Result<ProcessHandle> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.fail_next.take() {
            return Err(BotvisorError::SpawnFailure(message));
        }

        let stdin = Arc::new(Mutex::new(Vec::new()));
        let stdin_closed = Arc::new(AtomicBool::new(false));
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let pipe: StdinPipe = Box::new(RecordingStdin {
            written: stdin.clone(),
            closed: stdin_closed.clone(),
        });

        let run_id = spec.run_id;
        let pid = 1000 + state.runs.len() as u32;
        state.runs.push(FakeRun {
            spec,
            stdin,
            stdin_closed,
            control: control_rx,
            signals: Vec::new(),
        });

        Ok(ProcessHandle::new(run_id, Some(pid), Some(pipe), control_tx))
    }
}
