// src/engine/handlers.rs

//! Conversation handlers: routing of inbound messages, chat commands and
//! ingestion steps.
//!
//! Text routing precedence:
//! 1. a pending input request takes the message, whatever it says;
//! 2. the paste terminator finishes an active paste;
//! 3. `/commands` (which drop any unfinished ingestion flow);
//! 4. the active ingestion step;
//! 5. otherwise the message is not understood.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::errors::{BotvisorError, Result};
use crate::exec::ProcessBackend;
use crate::ingest::{CompletedProject, ConversationState, IngestInput, Transition};
use crate::registry::ManagedProject;
use crate::store::LayoutKind;
use crate::supervisor::DeleteOutcome;
use crate::transport::{ChatTransport, FileRef};
use crate::types::{ChatId, ProjectStatus, StopSignal, UserId};

use super::commands::{parse_command, Command};
use super::format;
use super::runtime::Runtime;

impl<B: ProcessBackend, T: ChatTransport> Runtime<B, T> {
    pub(super) async fn on_text(&mut self, chat: ChatId, user: UserId, text: &str) {
        if let Some(result) = self.bridge.deliver(chat, text, &mut self.registry).await {
            match result {
                Ok(delivered) => {
                    debug!(chat, project = %delivered.project, "message routed to process input");
                }
                Err(e) => self.report_error(chat, &e).await,
            }
            return;
        }

        let finishing_paste = matches!(
            self.conversations.get(user),
            Some(ConversationState::AwaitingPaste { .. })
        ) && text.trim() == self.ingestor.terminator();

        if !finishing_paste {
            if let Some(command) = parse_command(text) {
                self.dispatch(chat, user, command).await;
                return;
            }
        }

        if self.conversations.get(user).is_some() {
            self.advance(chat, user, IngestInput::Text(text)).await;
        } else {
            self.say(chat, "🤔 I don't understand that. Use /help to see the commands.")
                .await;
        }
    }

    pub(super) async fn on_choice(&mut self, chat: ChatId, user: UserId, data: &str) {
        if self.conversations.get(user).is_some() {
            self.advance(chat, user, IngestInput::Choice(data)).await;
        } else {
            self.say(chat, "This choice has expired. Start again from /help.")
                .await;
        }
    }

    pub(super) async fn on_document(
        &mut self,
        chat: ChatId,
        user: UserId,
        file: &FileRef,
        file_name: &str,
    ) {
        if self.conversations.get(user).is_none() {
            // Unsolicited uploads start a flow of their own.
            match self.unsolicited_state(file_name) {
                Ok(state) => self.conversations.set(user, state),
                Err(e) => {
                    self.report_error(chat, &e).await;
                    return;
                }
            }
        }

        let accepts = self
            .conversations
            .get(user)
            .is_some_and(ConversationState::accepts_document);
        if !accepts {
            self.advance(chat, user, IngestInput::Document { file_name, bytes: &[] })
                .await;
            return;
        }

        let names_itself = matches!(
            self.conversations.get(user),
            Some(ConversationState::AwaitingFile { target: None })
        ) && self.ingestor.store().is_script_name(file_name);
        if names_itself
            && let Err(e) = self
                .ingestor
                .name_from_file(file_name)
                .and_then(|name| self.ensure_new_name(&name))
        {
            self.abandon_flow(user);
            self.report_error(chat, &e).await;
            return;
        }

        let bytes = match self.transport.fetch_file(file).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.abandon_flow(user);
                self.report_error(chat, &e).await;
                return;
            }
        };
        self.advance(
            chat,
            user,
            IngestInput::Document {
                file_name,
                bytes: &bytes,
            },
        )
        .await;
    }

    /// A script upload is `/upload`; a zip creates a project named after
    /// the archive.
    fn unsolicited_state(&self, file_name: &str) -> Result<ConversationState> {
        let store = self.ingestor.store();
        if store.is_script_name(file_name) {
            return Ok(ConversationState::AwaitingFile { target: None });
        }

        let path = Path::new(file_name);
        let is_zip = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
        if !is_zip {
            return Err(BotvisorError::IngestionFailure(format!(
                "Unsupported file \"{file_name}\". Send a .{} script or a .zip archive.",
                store.script_extension()
            )));
        }

        let name = self.ingestor.name_from_file(file_name)?;
        self.ensure_new_name(&name)?;
        Ok(ConversationState::AwaitingZip {
            target: self.ingestor.target(&name, false),
        })
    }

    /// Uploads that name themselves never replace an existing bot.
    fn ensure_new_name(&self, name: &str) -> Result<()> {
        if self.registry.contains(name) {
            return Err(BotvisorError::IngestionFailure(format!(
                "Bot \"{name}\" already exists. Use /edit {name} to replace its code."
            )));
        }
        Ok(())
    }

    async fn advance(&mut self, chat: ChatId, user: UserId, input: IngestInput<'_>) {
        let Some(state) = self.conversations.take(user) else {
            return;
        };
        let step = state.step_name();

        match self.ingestor.advance(state, input) {
            Ok(Transition::Stay { state, reply }) => {
                self.conversations.set(user, state);
                self.say(chat, reply).await;
            }
            Ok(Transition::Completed(project)) => {
                let name = project.name.clone();
                let entry = project
                    .entry_point
                    .strip_prefix(&project.paths.dir)
                    .unwrap_or(&project.entry_point)
                    .display()
                    .to_string();
                match self.register(project) {
                    Ok(()) => {
                        self.say(
                            chat,
                            format!(
                                "✅ Bot \"{name}\" saved (entry point: {entry}).\n\
                                 Add requirements with /uploadreq {name}, start it with /startbot {name}."
                            ),
                        )
                        .await;
                    }
                    Err(e) => self.report_error(chat, &e).await,
                }
            }
            Ok(Transition::ManifestSaved { project, bytes }) => {
                debug!(project = %project, bytes, "manifest saved");
                self.say(
                    chat,
                    format!("📦 Requirements saved for \"{project}\". They are installed on the next start."),
                )
                .await;
            }
            Err(e) => {
                warn!(user, step, error = %e, "ingestion failed");
                self.report_error(chat, &e).await;
            }
        }
    }

    /// Create or update the registry entry for a finished ingestion.
    fn register(&mut self, done: CompletedProject) -> Result<()> {
        let Some(existing) = self.registry.get_mut(&done.name) else {
            self.registry.insert(ManagedProject::new(
                done.name,
                done.paths,
                done.entry_point,
                self.logs.capacity,
            ));
            return Ok(());
        };

        let old_paths = existing.paths().clone();
        let old_entry = existing.entry_point().to_path_buf();
        let migrating = old_paths.kind == LayoutKind::Legacy && done.paths.kind == LayoutKind::Consolidated;

        if migrating && existing.status() == ProjectStatus::Stopped {
            let store = self.ingestor.store();
            let fs = store.fs();
            if fs.is_file(&old_paths.manifest) && !fs.exists(&done.paths.manifest) {
                let manifest = fs.read(&old_paths.manifest)?;
                store.write_manifest(&done.paths, &manifest)?;
            }
            store.remove_project(&old_paths, &old_entry)?;
            info!(project = %done.name, "moved legacy project to its own directory");
        }

        existing.update_source(done.paths, done.entry_point);
        info!(project = %done.name, replace = done.replace, "project updated");
        Ok(())
    }

    /// Drop `user`'s flow, removing files extracted for a project that was
    /// never registered. Returns whether a flow existed.
    fn abandon_flow(&mut self, user: UserId) -> bool {
        let Some(state) = self.conversations.take(user) else {
            return false;
        };
        if let Some(target) = state.target()
            && !target.replace
            && !self.registry.contains(&target.name)
            && let Err(e) = self.ingestor.store().discard_dir(&target.paths)
        {
            warn!(project = %target.name, "could not discard abandoned files: {e:#}");
        }
        true
    }

    pub(super) async fn dispatch(&mut self, chat: ChatId, user: UserId, command: Command) {
        debug!(chat, user, ?command, "command");

        if command != Command::Cancel && self.abandon_flow(user) {
            debug!(user, "unfinished ingestion dropped by a new command");
        }

        let result = match command {
            Command::Help => {
                self.say(chat, format::help_text(self.ingestor.terminator()))
                    .await;
                Ok(())
            }
            Command::New(name) => self.cmd_new(chat, user, &name).await,
            Command::Edit(name) => self.cmd_edit(chat, user, &name).await,
            Command::Upload => {
                self.conversations
                    .set(user, ConversationState::AwaitingFile { target: None });
                self.say(chat, self.ingestor.file_prompt()).await;
                Ok(())
            }
            Command::UploadRequirements(name) => self.cmd_upload_requirements(chat, user, &name).await,
            Command::List => {
                self.say(chat, format::project_list(&self.registry)).await;
                Ok(())
            }
            Command::Start(name) => self.cmd_start(chat, &name).await,
            Command::Stop { name, signal } => self.cmd_stop(chat, &name, signal).await,
            Command::Logs(name) => self.cmd_logs(chat, &name).await,
            Command::Delete(name) => self.cmd_delete(chat, &name).await,
            Command::Cancel => {
                let text = if self.abandon_flow(user) {
                    "Cancelled."
                } else {
                    "Nothing to cancel."
                };
                self.say(chat, text).await;
                Ok(())
            }
            Command::MissingName { usage } => {
                self.say(chat, format!("Usage: {usage}")).await;
                Ok(())
            }
            Command::Unknown(cmd) => {
                self.say(chat, format!("Unknown command {cmd}. Use /help to see the commands."))
                    .await;
                Ok(())
            }
        };

        if let Err(e) = result {
            self.report_error(chat, &e).await;
        }
    }

    async fn cmd_new(&mut self, chat: ChatId, user: UserId, name: &str) -> Result<()> {
        if self.registry.contains(name) {
            return Err(BotvisorError::IngestionFailure(format!(
                "Bot \"{name}\" already exists. Use /edit {name} to replace its code."
            )));
        }
        let target = self.ingestor.target(name, false);
        let prompt = self.ingestor.method_prompt(&target);
        self.conversations
            .set(user, ConversationState::ChooseMethod { target });
        self.say(chat, prompt).await;
        Ok(())
    }

    async fn cmd_edit(&mut self, chat: ChatId, user: UserId, name: &str) -> Result<()> {
        let project = self
            .registry
            .get(name)
            .ok_or_else(|| BotvisorError::NotFound(name.to_string()))?;
        if project.status() != ProjectStatus::Stopped {
            return Err(BotvisorError::IngestionFailure(format!(
                "Bot \"{name}\" is {}. Stop it with /stopbot {name} before editing.",
                project.status()
            )));
        }
        let target = self.ingestor.target(name, true);
        let prompt = self.ingestor.method_prompt(&target);
        self.conversations
            .set(user, ConversationState::ChooseMethod { target });
        self.say(chat, prompt).await;
        Ok(())
    }

    async fn cmd_upload_requirements(&mut self, chat: ChatId, user: UserId, name: &str) -> Result<()> {
        let project = self
            .registry
            .get(name)
            .ok_or_else(|| BotvisorError::NotFound(name.to_string()))?;
        let state = ConversationState::AwaitingManifest {
            project: name.to_string(),
            paths: project.paths().clone(),
        };
        self.conversations.set(user, state);
        self.say(chat, self.ingestor.manifest_prompt(name)).await;
        Ok(())
    }

    async fn cmd_start(&mut self, chat: ChatId, name: &str) -> Result<()> {
        let ticket = self.supervisor.start(&mut self.registry, name, chat)?;

        let message = self
            .say(chat, format!("⏳ Installing requirements for \"{name}\"…"))
            .await;
        // The provisioning result cannot be handled before this handler
        // returns, so the ticket is still current here.
        if let Some(current) = self
            .registry
            .get_mut(name)
            .and_then(|p| p.install_ticket_mut())
            .filter(|t| t.id == ticket)
        {
            current.status_message = message;
        }
        Ok(())
    }

    async fn cmd_stop(&mut self, chat: ChatId, name: &str, signal: StopSignal) -> Result<()> {
        self.supervisor
            .stop(&mut self.registry, &mut self.bridge, name, signal)?;
        self.say(chat, format!("🛑 Sent {signal} to \"{name}\"."))
            .await;
        Ok(())
    }

    async fn cmd_logs(&mut self, chat: ChatId, name: &str) -> Result<()> {
        let project = self
            .registry
            .get(name)
            .ok_or_else(|| BotvisorError::NotFound(name.to_string()))?;
        let text = format::logs_tail(name, &project.logs, self.logs.tail_lines);

        if text.chars().count() <= self.logs.max_message_chars {
            self.say(chat, text).await;
            return Ok(());
        }

        let full = crate::registry::LogBuffer::render(project.logs.iter());
        let caption = format!("📜 Logs of \"{name}\" ({} lines)", project.logs.len());
        self.transport
            .send_document(chat, format!("{name}.log"), full.into_bytes(), Some(caption))
            .await
    }

    async fn cmd_delete(&mut self, chat: ChatId, name: &str) -> Result<()> {
        match self
            .supervisor
            .delete(&mut self.registry, &mut self.bridge, name, chat)?
        {
            DeleteOutcome::Deleted => {
                self.say(chat, format!("🗑 Bot \"{name}\" deleted.")).await;
            }
            DeleteOutcome::AwaitingExit(_) => {
                self.say(
                    chat,
                    format!("🛑 Stopping \"{name}\"; it is deleted once it exits."),
                )
                .await;
            }
        }
        Ok(())
    }
}
