// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bridge::InputBridge;
use crate::config::{ConfigFile, LogsSection};
use crate::errors::{BotvisorError, Result};
use crate::exec::ProcessBackend;
use crate::fs::FileSystem;
use crate::ingest::{Conversations, Ingestor};
use crate::provision::{Provisioner, ToolRunner};
use crate::registry::{ManagedProject, Registry};
use crate::store::{ArtifactStore, DiscoveredProject};
use crate::supervisor::Supervisor;
use crate::transport::{ChatTransport, InboundEvent, InboundPayload, OutgoingMessage};
use crate::types::{ChatId, MessageId};

use super::format;
use super::SupervisorEvent;

/// How long shutdown waits for stopped processes to report their exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Drives the supervisor in response to `SupervisorEvent`s and talks to the
/// conversation through a `ChatTransport`.
pub struct Runtime<B: ProcessBackend, T: ChatTransport> {
    pub(super) registry: Registry,
    pub(super) supervisor: Supervisor<B>,
    pub(super) bridge: InputBridge,
    pub(super) conversations: Conversations,
    pub(super) ingestor: Ingestor,
    pub(super) transport: T,
    pub(super) logs: LogsSection,
    pub(super) shutting_down: bool,
}

impl<B: ProcessBackend, T: ChatTransport> fmt::Debug for Runtime<B, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("registry", &self.registry)
            .field("bridge", &self.bridge)
            .field("conversations", &self.conversations)
            .finish_non_exhaustive()
    }
}

impl<B: ProcessBackend, T: ChatTransport> Runtime<B, T> {
    /// Wire up every component from validated configuration.
    ///
    /// `events` is the sender half of the channel later passed to
    /// [`Runtime::run`]; background tasks report through it.
    pub fn new(
        cfg: &ConfigFile,
        fs: Arc<dyn FileSystem>,
        tools: Arc<dyn ToolRunner>,
        backend: B,
        transport: T,
        events: mpsc::Sender<SupervisorEvent>,
    ) -> Result<Self> {
        let store = ArtifactStore::from_config(fs.clone(), cfg)?;
        let provisioner = Provisioner::new(fs, tools, cfg);
        let supervisor = Supervisor::new(
            backend,
            provisioner,
            store.clone(),
            events.clone(),
            cfg.logs.diagnostic_chars,
        );
        let bridge = InputBridge::from_config(cfg, events)?;
        let ingestor = Ingestor::new(store, cfg.ingest.paste_terminator.clone());

        Ok(Self {
            registry: Registry::new(),
            supervisor,
            bridge,
            conversations: Conversations::new(),
            ingestor,
            transport,
            logs: cfg.logs.clone(),
            shutting_down: false,
        })
    }

    /// Register projects found on disk as stopped.
    pub fn adopt(&mut self, discovered: Vec<DiscoveredProject>) {
        for found in discovered {
            info!(project = %found.name, entry = ?found.entry_point, "adopting existing project");
            self.registry.insert(ManagedProject::new(
                found.name,
                found.paths,
                found.entry_point,
                self.logs.capacity,
            ));
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn bridge(&self) -> &InputBridge {
        &self.bridge
    }

    pub fn conversations(&self) -> &Conversations {
        &self.conversations
    }

    pub fn supervisor(&self) -> &Supervisor<B> {
        &self.supervisor
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Main event loop. Returns once shutdown has completed or the channel
    /// closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<SupervisorEvent>) -> Result<()> {
        info!("botvisor runtime started");

        loop {
            let next = if self.shutting_down {
                match tokio::time::timeout(SHUTDOWN_GRACE, events.recv()).await {
                    Ok(event) => event,
                    Err(_) => {
                        warn!("processes did not exit within the shutdown grace period");
                        break;
                    }
                }
            } else {
                events.recv().await
            };

            let Some(event) = next else {
                info!("runtime event channel closed; exiting");
                break;
            };

            if !self.handle_event(event).await? {
                break;
            }
        }

        info!("runtime exiting");
        Ok(())
    }

    /// Handle one event. Returns whether the loop should keep running.
    ///
    /// Failures inside handlers are reported to the conversation and never
    /// end the loop.
    pub async fn handle_event(&mut self, event: SupervisorEvent) -> Result<bool> {
        match event {
            SupervisorEvent::Inbound(inbound) => {
                self.on_inbound(inbound).await;
            }
            SupervisorEvent::ProcessOutput {
                project,
                run_id,
                stream,
                text,
            } => {
                self.on_process_output(&project, run_id, stream, &text).await;
            }
            SupervisorEvent::ProcessExited {
                project,
                run_id,
                status,
            } => {
                self.on_process_exited(&project, run_id, status).await;
            }
            SupervisorEvent::ProvisionOutput {
                project,
                ticket,
                line,
            } => {
                self.supervisor
                    .on_provision_output(&mut self.registry, &project, ticket, line);
            }
            SupervisorEvent::ProvisionFinished {
                project,
                ticket,
                result,
            } => {
                self.on_provision_finished(&project, ticket, result).await;
            }
            SupervisorEvent::InputTimeout { chat, request_id } => {
                self.on_input_timeout(chat, request_id).await;
            }
            SupervisorEvent::ShutdownRequested => {
                info!("shutdown requested");
                self.shutting_down = true;
                let waiters = self
                    .supervisor
                    .shutdown(&mut self.registry, &mut self.bridge);
                debug!(stopping = waiters.len(), "waiting for running projects to exit");
            }
        }

        Ok(!(self.shutting_down && self.all_stopped()))
    }

    fn all_stopped(&self) -> bool {
        self.registry.iter().all(|p| p.process().is_none())
    }

    async fn on_inbound(&mut self, inbound: InboundEvent) {
        let InboundEvent {
            chat,
            user,
            payload,
        } = inbound;
        debug!(chat, user, ?payload, "inbound");

        if self.shutting_down {
            self.say(chat, "Shutting down; try again later.").await;
            return;
        }

        match payload {
            InboundPayload::Text(text) => self.on_text(chat, user, &text).await,
            InboundPayload::Choice(data) => self.on_choice(chat, user, &data).await,
            InboundPayload::Document { file, file_name } => {
                self.on_document(chat, user, &file, &file_name).await
            }
        }
    }

    /// Send a message, logging (not propagating) transport failures.
    pub(super) async fn say(
        &self,
        chat: ChatId,
        message: impl Into<OutgoingMessage>,
    ) -> Option<MessageId> {
        match self.transport.send_text(chat, message.into()).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(chat, error = %e, "failed to send message");
                None
            }
        }
    }

    /// Edit `message` if there is one, otherwise send a new message.
    pub(super) async fn edit_or_say(&self, chat: ChatId, message: Option<MessageId>, text: String) {
        if let Some(id) = message {
            match self.transport.edit_text(chat, id, text.clone()).await {
                Ok(()) => return,
                Err(e) => debug!(chat, message = id, error = %e, "edit failed; sending instead"),
            }
        }
        self.say(chat, text).await;
    }

    pub(super) async fn report_error(&self, chat: ChatId, err: &BotvisorError) {
        debug!(chat, error = %err, "reporting error");
        self.say(chat, format::error_message(err, self.logs.diagnostic_chars))
            .await;
    }
}
