// src/engine/process_events.rs

//! Handlers for events produced by processes and background tasks.

use tracing::{debug, warn};

use crate::errors::Result;
use crate::exec::ProcessBackend;
use crate::provision::ProvisionReport;
use crate::supervisor::outcome::ExitStatusInfo;
use crate::supervisor::ProvisionResolution;
use crate::transport::ChatTransport;
use crate::types::{ChatId, LogStream};

use super::format;
use super::runtime::Runtime;

impl<B: ProcessBackend, T: ChatTransport> Runtime<B, T> {
    pub(super) async fn on_process_output(
        &mut self,
        project: &str,
        run_id: u64,
        stream: LogStream,
        text: &str,
    ) {
        let Some(output) = self.supervisor.on_output(
            &mut self.registry,
            &mut self.bridge,
            project,
            run_id,
            stream,
            text,
        ) else {
            return;
        };

        let lines: Vec<&str> = output
            .lines
            .iter()
            .map(String::as_str)
            .filter(|l| !l.trim().is_empty())
            .collect();
        if !lines.is_empty() {
            let text = format::truncate_chars(&lines.join("\n"), self.logs.max_message_chars);
            self.say(output.chat, text).await;
        }

        if let Some(prompt) = output.prompt {
            let text = format::truncate_chars(prompt.trim_end(), self.logs.max_message_chars);
            self.say(
                output.chat,
                format!("{text}\n⌨️ Your next message is sent to \"{project}\"."),
            )
            .await;
        }
    }

    pub(super) async fn on_process_exited(&mut self, project: &str, run_id: u64, status: ExitStatusInfo) {
        let Some(notice) = self.supervisor.on_exit(
            &mut self.registry,
            &mut self.bridge,
            project,
            run_id,
            status,
        ) else {
            return;
        };

        if let Some(flushed) = notice.flushed.as_deref().filter(|f| !f.trim().is_empty()) {
            let text = format::truncate_chars(flushed, self.logs.max_message_chars);
            self.say(notice.chat, text).await;
        }
        for chat in notice.cleared_requests.iter().filter(|c| **c != notice.chat) {
            self.say(*chat, format!("Input request for \"{project}\" cancelled: the bot exited."))
                .await;
        }

        if !self.shutting_down {
            self.say(notice.chat, format::exit_message(&notice.report))
                .await;
        }

        if let Some(chat) = notice.pending_delete {
            match self.supervisor.remove_stopped(&mut self.registry, project) {
                Ok(()) => {
                    self.say(chat, format!("🗑 Bot \"{project}\" deleted.")).await;
                }
                Err(e) => self.report_error(chat, &e).await,
            }
        }
    }

    pub(super) async fn on_provision_finished(
        &mut self,
        project: &str,
        ticket: u64,
        result: Result<ProvisionReport>,
    ) {
        match self
            .supervisor
            .on_provision_finished(&mut self.registry, project, ticket, result)
        {
            ProvisionResolution::Started {
                chat,
                status_message,
                report,
                pid,
            } => {
                debug!(project, ?pid, "start completed");
                self.edit_or_say(chat, status_message, format::provision_summary(project, &report))
                    .await;
                self.say(chat, format!("🚀 Bot \"{project}\" started.")).await;
            }
            ProvisionResolution::Failed {
                chat,
                status_message,
                error,
            } => {
                let text = format::error_message(&error, self.logs.diagnostic_chars);
                self.edit_or_say(chat, status_message, text).await;
            }
            ProvisionResolution::Stale => {
                debug!(project, ticket, "stale provisioning result dropped");
            }
        }
    }

    pub(super) async fn on_input_timeout(&mut self, chat: ChatId, request_id: u64) {
        let Some(request) = self.bridge.expire(chat, request_id) else {
            debug!(chat, request_id, "timeout for a request that is already gone");
            return;
        };
        warn!(chat, project = %request.project, "input request timed out");
        self.say(
            chat,
            format!(
                "⌛ No input for \"{}\" within {}. Messages are treated as commands again.",
                request.project,
                format::format_duration(self.bridge.timeout())
            ),
        )
        .await;
    }
}
