// src/registry/project.rs

use std::path::{Path, PathBuf};

use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::bridge::LineAssembler;
use crate::exec::ProcessHandle;
use crate::registry::log_buffer::LogBuffer;
use crate::store::ProjectPaths;
use crate::supervisor::outcome::ExitReport;
use crate::types::{ChatId, MessageId, ProjectStatus, StopSignal};

/// Bytes of stderr kept per run for exit diagnostics.
const STDERR_TAIL_BYTES: usize = 8 * 1024;

/// An in-flight provisioning attempt.
#[derive(Debug)]
pub struct InstallTicket {
    pub id: u64,
    pub chat: ChatId,
    /// "Installing..." message edited with the result.
    pub status_message: Option<MessageId>,
    abort: Option<AbortHandle>,
}

impl InstallTicket {
    pub fn new(id: u64, chat: ChatId, status_message: Option<MessageId>) -> Self {
        Self {
            id,
            chat,
            status_message,
            abort: None,
        }
    }

    pub fn set_abort(&mut self, abort: AbortHandle) {
        self.abort = Some(abort);
    }

    /// Abort the provisioning task (and with it any running installer).
    pub fn cancel(&mut self) {
        if let Some(abort) = self.abort.take() {
            abort.abort();
        }
    }
}

/// A live run of a project.
#[derive(Debug)]
pub struct RunningProcess {
    pub handle: ProcessHandle,
    /// Conversation receiving this run's output.
    pub chat: ChatId,
    pub assembler: LineAssembler,
    /// Partial stderr line carried between chunks.
    pub stderr_lines: LineAssembler,
    /// Signal delivered by `stop`, used to classify the exit.
    pub stop_requested: Option<StopSignal>,
    stderr_tail: String,
    exit_tx: watch::Sender<Option<ExitReport>>,
}

impl RunningProcess {
    pub fn new(handle: ProcessHandle, chat: ChatId) -> Self {
        let (exit_tx, _) = watch::channel(None);
        Self {
            handle,
            chat,
            assembler: LineAssembler::new(),
            stderr_lines: LineAssembler::new(),
            stop_requested: None,
            stderr_tail: String::new(),
            exit_tx,
        }
    }

    pub fn run_id(&self) -> u64 {
        self.handle.run_id()
    }

    pub fn push_stderr(&mut self, text: &str) {
        self.stderr_tail.push_str(text);
        if self.stderr_tail.len() > STDERR_TAIL_BYTES {
            let mut cut = self.stderr_tail.len() - STDERR_TAIL_BYTES;
            while !self.stderr_tail.is_char_boundary(cut) {
                cut += 1;
            }
            self.stderr_tail.drain(..cut);
        }
    }

    pub fn stderr_tail(&self) -> &str {
        &self.stderr_tail
    }

    pub fn exit_waiter(&self) -> ExitWaiter {
        ExitWaiter(self.exit_tx.subscribe())
    }

    /// Publish the final report to every waiter.
    pub fn publish_exit(&self, report: ExitReport) {
        self.exit_tx.send_replace(Some(report));
    }
}

/// Completion handle for a run; resolves once the exit has been processed.
#[derive(Debug, Clone)]
pub struct ExitWaiter(watch::Receiver<Option<ExitReport>>);

impl ExitWaiter {
    /// Wait for the exit report. `None` if the run was discarded without
    /// ever reporting an exit.
    pub async fn wait(mut self) -> Option<ExitReport> {
        match self.0.wait_for(|r| r.is_some()).await {
            Ok(report) => report.clone(),
            Err(_) => None,
        }
    }
}

/// Process ownership of a project. Exactly one variant holds a process, so a
/// process exists if and only if the status is `Running`.
#[derive(Debug, Default)]
pub enum ProcessSlot {
    #[default]
    Stopped,
    Installing(InstallTicket),
    Running(Box<RunningProcess>),
}

/// One user-named unit of work.
#[derive(Debug)]
pub struct ManagedProject {
    name: String,
    paths: ProjectPaths,
    entry_point: PathBuf,
    pub slot: ProcessSlot,
    pub logs: LogBuffer,
    /// Conversation to notify once a deletion waiting for exit completes.
    pub pending_delete: Option<ChatId>,
}

impl ManagedProject {
    pub fn new(
        name: impl Into<String>,
        paths: ProjectPaths,
        entry_point: PathBuf,
        log_capacity: usize,
    ) -> Self {
        Self {
            name: name.into(),
            paths,
            entry_point,
            slot: ProcessSlot::Stopped,
            logs: LogBuffer::new(log_capacity),
            pending_delete: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    pub fn entry_point(&self) -> &Path {
        &self.entry_point
    }

    /// Replace the source location after a successful edit.
    pub fn update_source(&mut self, paths: ProjectPaths, entry_point: PathBuf) {
        self.paths = paths;
        self.entry_point = entry_point;
    }

    pub fn status(&self) -> ProjectStatus {
        match self.slot {
            ProcessSlot::Stopped => ProjectStatus::Stopped,
            ProcessSlot::Installing(_) => ProjectStatus::Installing,
            ProcessSlot::Running(_) => ProjectStatus::Running,
        }
    }

    pub fn process(&self) -> Option<&ProcessHandle> {
        match &self.slot {
            ProcessSlot::Running(running) => Some(&running.handle),
            _ => None,
        }
    }

    pub fn running(&self) -> Option<&RunningProcess> {
        match &self.slot {
            ProcessSlot::Running(running) => Some(running),
            _ => None,
        }
    }

    pub fn running_mut(&mut self) -> Option<&mut RunningProcess> {
        match &mut self.slot {
            ProcessSlot::Running(running) => Some(running),
            _ => None,
        }
    }

    /// The running process, if it belongs to run `run_id`.
    pub fn run_mut(&mut self, run_id: u64) -> Option<&mut RunningProcess> {
        self.running_mut().filter(|r| r.run_id() == run_id)
    }

    pub fn install_ticket(&self) -> Option<&InstallTicket> {
        match &self.slot {
            ProcessSlot::Installing(ticket) => Some(ticket),
            _ => None,
        }
    }

    pub fn install_ticket_mut(&mut self) -> Option<&mut InstallTicket> {
        match &mut self.slot {
            ProcessSlot::Installing(ticket) => Some(ticket),
            _ => None,
        }
    }

    /// Move to `Stopped`, returning whatever the slot held.
    pub fn take_slot(&mut self) -> ProcessSlot {
        std::mem::take(&mut self.slot)
    }
}
