// src/supervisor/mod.rs

//! Process supervisor: lifecycle of the single live process a project may
//! own.
//!
//! ```text
//! stopped --start--> installing --provisioned+spawned--> running --exit--> stopped
//!                        |                                  |
//!                        +--provision/spawn failure--> stopped
//! ```
//!
//! Every transition is applied to the [`Registry`] from the runtime's event
//! loop. Provisioning runs in a background task that reports back with
//! `ProvisionFinished`; process exit is only ever observed through
//! `ProcessExited`, never assumed after `stop`.

pub mod outcome;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bridge::InputBridge;
use crate::engine::SupervisorEvent;
use crate::errors::{BotvisorError, Result};
use crate::exec::{ProcessBackend, SpawnSpec};
use crate::provision::{ProvisionReport, Provisioner};
use crate::registry::{
    ExitWaiter, InstallTicket, LogEntry, ProcessSlot, Registry, RunningProcess,
};
use crate::store::ArtifactStore;
use crate::types::{ChatId, LogStream, MessageId, ProjectStatus, StopSignal};

use self::outcome::{diagnostics_for, has_error_markers, ExitOutcome, ExitReport, ExitStatusInfo};

/// How a finished provisioning attempt resolved.
#[derive(Debug)]
pub enum ProvisionResolution {
    /// Process spawned; the project is running.
    Started {
        chat: ChatId,
        status_message: Option<MessageId>,
        report: ProvisionReport,
        pid: Option<u32>,
    },
    /// Provisioning or spawning failed; the project is stopped again.
    Failed {
        chat: ChatId,
        status_message: Option<MessageId>,
        error: BotvisorError,
    },
    /// Result for an attempt that was cancelled or superseded.
    Stale,
}

/// Output to forward to a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedOutput {
    pub chat: ChatId,
    pub lines: Vec<String>,
    pub prompt: Option<String>,
}

/// What the runtime should report after a process exit.
#[derive(Debug, Clone)]
pub struct ExitNotice {
    pub chat: ChatId,
    pub report: ExitReport,
    /// Held stdout flushed at exit.
    pub flushed: Option<String>,
    /// Chats whose input request was dropped by the exit.
    pub cleared_requests: Vec<ChatId>,
    /// Conversation that asked to delete this project once stopped.
    pub pending_delete: Option<ChatId>,
}

/// Result of a delete request.
#[derive(Debug)]
pub enum DeleteOutcome {
    Deleted,
    /// The project was running; it has been sent SIGTERM and is deleted when
    /// its exit is processed.
    AwaitingExit(ExitWaiter),
}

#[derive(Debug)]
pub struct Supervisor<B: ProcessBackend> {
    backend: B,
    provisioner: Provisioner,
    store: ArtifactStore,
    events: mpsc::Sender<SupervisorEvent>,
    diagnostic_chars: usize,
    next_run_id: u64,
    next_ticket: u64,
}

impl<B: ProcessBackend> Supervisor<B> {
    pub fn new(
        backend: B,
        provisioner: Provisioner,
        store: ArtifactStore,
        events: mpsc::Sender<SupervisorEvent>,
        diagnostic_chars: usize,
    ) -> Self {
        Self {
            backend,
            provisioner,
            store,
            events,
            diagnostic_chars,
            next_run_id: 1,
            next_ticket: 1,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Begin starting `name`: validate, move to `installing` and launch
    /// provisioning in the background. Returns the install ticket id.
    ///
    /// The log buffer is reset here, so install output stays visible for the
    /// run that follows.
    pub fn start(&mut self, registry: &mut Registry, name: &str, chat: ChatId) -> Result<u64> {
        let project = registry.require_mut(name)?;
        match &project.slot {
            ProcessSlot::Running(_) => return Err(BotvisorError::AlreadyRunning(name.to_string())),
            ProcessSlot::Installing(_) => {
                return Err(BotvisorError::InstallInProgress(name.to_string()));
            }
            ProcessSlot::Stopped => {}
        }
        if !self.store.fs().is_file(project.entry_point()) {
            return Err(BotvisorError::EntryPointMissing(
                project.entry_point().to_path_buf(),
            ));
        }

        let ticket_id = self.next_ticket;
        self.next_ticket += 1;

        project.logs.clear();
        let mut ticket = InstallTicket::new(ticket_id, chat, None);

        let provisioner = self.provisioner.clone();
        let events = self.events.clone();
        let paths = project.paths().clone();
        let project_name = name.to_string();
        let task = tokio::spawn(async move {
            let (sink, mut lines) = mpsc::unbounded_channel::<LogEntry>();
            let forward = async {
                while let Some(line) = lines.recv().await {
                    let _ = events
                        .send(SupervisorEvent::ProvisionOutput {
                            project: project_name.clone(),
                            ticket: ticket_id,
                            line,
                        })
                        .await;
                }
            };
            let (result, ()) = tokio::join!(provisioner.ensure(&project_name, &paths, sink), forward);
            let _ = events
                .send(SupervisorEvent::ProvisionFinished {
                    project: project_name,
                    ticket: ticket_id,
                    result,
                })
                .await;
        });
        ticket.set_abort(task.abort_handle());
        project.slot = ProcessSlot::Installing(ticket);

        info!(project = %name, ticket = ticket_id, chat, "provisioning started");
        Ok(ticket_id)
    }

    /// Record install output for the current attempt.
    pub fn on_provision_output(&self, registry: &mut Registry, name: &str, ticket: u64, line: LogEntry) {
        let Some(project) = registry.get_mut(name) else {
            return;
        };
        if project.install_ticket().is_some_and(|t| t.id == ticket) {
            project.logs.push(line.stream, line.text);
        }
    }

    /// Apply a finished provisioning attempt: spawn the process on success,
    /// fall back to `stopped` on any failure.
    pub fn on_provision_finished(
        &mut self,
        registry: &mut Registry,
        name: &str,
        ticket: u64,
        result: Result<ProvisionReport>,
    ) -> ProvisionResolution {
        let Some(project) = registry.get_mut(name) else {
            return ProvisionResolution::Stale;
        };
        if !project.install_ticket().is_some_and(|t| t.id == ticket) {
            debug!(project = %name, ticket, "ignoring stale provisioning result");
            return ProvisionResolution::Stale;
        }
        let ProcessSlot::Installing(ticket) = project.take_slot() else {
            return ProvisionResolution::Stale;
        };
        let chat = ticket.chat;
        let status_message = ticket.status_message;

        let report = match result {
            Ok(report) => report,
            Err(error) => {
                warn!(project = %name, error = %error, "provisioning failed");
                project.logs.push(LogStream::Install, error.to_string());
                return ProvisionResolution::Failed {
                    chat,
                    status_message,
                    error,
                };
            }
        };

        let run_id = self.next_run_id;
        self.next_run_id += 1;
        let command = self
            .provisioner
            .run_command(project.paths(), project.entry_point());
        let spec = SpawnSpec {
            project: name.to_string(),
            run_id,
            program: command.program,
            args: command.args,
            cwd: project.paths().dir.clone(),
        };

        match self.backend.spawn(spec) {
            Ok(handle) => {
                let pid = handle.pid();
                project.slot = ProcessSlot::Running(Box::new(RunningProcess::new(handle, chat)));
                info!(project = %name, run_id, ?pid, "project running");
                ProvisionResolution::Started {
                    chat,
                    status_message,
                    report,
                    pid,
                }
            }
            Err(error) => {
                warn!(project = %name, error = %error, "spawn failed");
                project.logs.push(LogStream::Exit, error.to_string());
                ProvisionResolution::Failed {
                    chat,
                    status_message,
                    error,
                }
            }
        }
    }

    /// Send `signal` to the running process of `name`.
    ///
    /// Does not wait for the process to die; the returned waiter resolves
    /// once the exit has been processed.
    pub fn stop(
        &mut self,
        registry: &mut Registry,
        bridge: &mut InputBridge,
        name: &str,
        signal: StopSignal,
    ) -> Result<ExitWaiter> {
        let project = registry.require_mut(name)?;
        let Some(running) = project.running_mut() else {
            return Err(BotvisorError::NotRunning(name.to_string()));
        };

        if !running.handle.signal(signal) {
            debug!(project = %name, "process already reaped; exit event pending");
        }
        // Keep the first signal for classification; a later SIGKILL still
        // counts as a requested stop.
        running.stop_requested.get_or_insert(signal);
        let waiter = running.exit_waiter();

        let cleared = bridge.clear_project(name);
        info!(project = %name, %signal, cleared = cleared.len(), "stop requested");
        Ok(waiter)
    }

    /// Capture one output chunk. Returns what should be forwarded to the
    /// conversation, if anything.
    pub fn on_output(
        &mut self,
        registry: &mut Registry,
        bridge: &mut InputBridge,
        name: &str,
        run_id: u64,
        stream: LogStream,
        text: &str,
    ) -> Option<ForwardedOutput> {
        let Some(project) = registry.get_mut(name) else {
            debug!(project = %name, run_id, "output for unknown project");
            return None;
        };
        let Some(running) = project.run_mut(run_id) else {
            debug!(project = %name, run_id, "output for stale run");
            return None;
        };

        match stream {
            LogStream::Stdout => {
                let decision = bridge.process_stdout(&mut running.assembler, text);
                let chat = running.chat;
                for line in &decision.lines {
                    project.logs.push(LogStream::Stdout, line.clone());
                }
                if let Some(prompt) = &decision.prompt {
                    project.logs.push(LogStream::Stdout, prompt.clone());
                    bridge.open_request(chat, name, run_id, prompt);
                }
                if decision.lines.is_empty() && decision.prompt.is_none() {
                    return None;
                }
                Some(ForwardedOutput {
                    chat,
                    lines: decision.lines,
                    prompt: decision.prompt,
                })
            }
            _ => {
                running.push_stderr(text);
                let lines = running.stderr_lines.push(text);
                for line in lines.into_iter().filter(|l| !l.trim().is_empty()) {
                    project.logs.push(stream, line);
                }
                None
            }
        }
    }

    /// Final transition of a run. Stale exits (a run that is no longer the
    /// project's current one) are ignored.
    pub fn on_exit(
        &mut self,
        registry: &mut Registry,
        bridge: &mut InputBridge,
        name: &str,
        run_id: u64,
        status: ExitStatusInfo,
    ) -> Option<ExitNotice> {
        let project = registry.get_mut(name)?;
        if project.run_mut(run_id).is_none() {
            debug!(project = %name, run_id, "ignoring exit of stale run");
            return None;
        }
        let ProcessSlot::Running(mut running) = project.take_slot() else {
            return None;
        };

        let flushed = Some(running.assembler.take_held()).filter(|h| !h.is_empty());
        if let Some(held) = &flushed {
            project.logs.push(LogStream::Stdout, held.clone());
        }
        let stderr_rest = running.stderr_lines.take_held();
        if !stderr_rest.trim().is_empty() {
            project.logs.push(LogStream::Stderr, stderr_rest);
        }

        let outcome = ExitOutcome::classify(status, running.stop_requested);
        let diagnostics = diagnostics_for(outcome, running.stderr_tail(), self.diagnostic_chars);
        if outcome == ExitOutcome::Clean && has_error_markers(running.stderr_tail()) {
            warn!(project = %name, run_id, "clean exit, but stderr reported errors");
        }
        project.logs.push(LogStream::Exit, status.to_string());

        let report = ExitReport {
            project: name.to_string(),
            run_id,
            status,
            outcome,
            diagnostics,
        };
        running.publish_exit(report.clone());

        let cleared_requests = bridge.clear_project(name);
        info!(project = %name, run_id, ?outcome, "project stopped");

        Some(ExitNotice {
            chat: running.chat,
            report,
            flushed,
            cleared_requests,
            pending_delete: project.pending_delete.take(),
        })
    }

    /// Delete `name`, stopping it first if it is running.
    pub fn delete(
        &mut self,
        registry: &mut Registry,
        bridge: &mut InputBridge,
        name: &str,
        chat: ChatId,
    ) -> Result<DeleteOutcome> {
        let project = registry.require_mut(name)?;
        match project.status() {
            ProjectStatus::Running => {
                project.pending_delete = Some(chat);
                let waiter = self.stop(registry, bridge, name, StopSignal::Terminate)?;
                Ok(DeleteOutcome::AwaitingExit(waiter))
            }
            ProjectStatus::Installing => {
                if let Some(ticket) = project.install_ticket_mut() {
                    ticket.cancel();
                }
                project.slot = ProcessSlot::Stopped;
                self.remove_stopped(registry, name)?;
                Ok(DeleteOutcome::Deleted)
            }
            ProjectStatus::Stopped => {
                self.remove_stopped(registry, name)?;
                Ok(DeleteOutcome::Deleted)
            }
        }
    }

    /// Remove a stopped project's files and registry entry.
    pub fn remove_stopped(&mut self, registry: &mut Registry, name: &str) -> Result<()> {
        let project = registry.require_mut(name)?;
        if project.status() != ProjectStatus::Stopped {
            return Err(BotvisorError::AlreadyRunning(name.to_string()));
        }
        self.store
            .remove_project(project.paths(), project.entry_point())?;
        registry.remove(name);
        info!(project = %name, "project deleted");
        Ok(())
    }

    /// Terminate everything: SIGTERM to running projects, abort installs.
    pub fn shutdown(&mut self, registry: &mut Registry, bridge: &mut InputBridge) -> Vec<ExitWaiter> {
        let mut waiters = Vec::new();
        let names: Vec<String> = registry.names().map(str::to_string).collect();
        for name in names {
            let Some(project) = registry.get_mut(&name) else {
                continue;
            };
            if let Some(ticket) = project.install_ticket_mut() {
                ticket.cancel();
                project.slot = ProcessSlot::Stopped;
                continue;
            }
            if project.running().is_some() {
                match self.stop(registry, bridge, &name, StopSignal::Terminate) {
                    Ok(waiter) => waiters.push(waiter),
                    Err(e) => warn!(project = %name, error = %e, "failed to stop on shutdown"),
                }
            }
        }
        waiters
    }
}
