// src/transport/console.rs

//! Terminal transport: one local conversation on stdin/stdout.
//!
//! Input lines are plain text, except:
//! - `@<path>` uploads the file at `<path>`,
//! - `#<data>` presses the button whose data is `<data>`.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::SupervisorEvent;
use crate::errors::BotvisorError;
use crate::types::{ChatId, MessageId, UserId};

use super::{
    ChatTransport, FileRef, InboundEvent, InboundPayload, OutgoingMessage, TransportFuture,
};

#[derive(Debug)]
pub struct ConsoleTransport {
    out: Mutex<Stdout>,
    next_message: AtomicI64,
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleTransport {
    pub fn new() -> Self {
        Self {
            out: Mutex::new(tokio::io::stdout()),
            next_message: AtomicI64::new(1),
        }
    }

    async fn print(&self, text: &str) -> crate::errors::Result<()> {
        let mut out = self.out.lock().await;
        out.write_all(text.as_bytes()).await?;
        out.write_all(b"\n").await?;
        out.flush().await?;
        Ok(())
    }
}

impl ChatTransport for ConsoleTransport {
    fn send_text(&self, chat: ChatId, message: OutgoingMessage) -> TransportFuture<'_, MessageId> {
        Box::pin(async move {
            let id = self.next_message.fetch_add(1, Ordering::Relaxed);
            let mut rendered = message.text;
            for choice in &message.choices {
                rendered.push_str(&format!("\n  [#{}] {}", choice.data, choice.label));
            }
            debug!(chat, message = id, "console send");
            self.print(&rendered).await?;
            Ok(id)
        })
    }

    fn send_document(
        &self,
        chat: ChatId,
        file_name: String,
        bytes: Vec<u8>,
        caption: Option<String>,
    ) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            debug!(chat, file = %file_name, bytes = bytes.len(), "console document");
            let mut rendered = format!("📎 {file_name} ({} bytes)", bytes.len());
            if let Some(caption) = caption {
                rendered.push_str(&format!("\n{caption}"));
            }
            rendered.push('\n');
            rendered.push_str(&String::from_utf8_lossy(&bytes));
            self.print(&rendered).await
        })
    }

    fn edit_text(&self, _chat: ChatId, message: MessageId, text: String) -> TransportFuture<'_, ()> {
        Box::pin(async move { self.print(&format!("(edited #{message}) {text}")).await })
    }

    fn fetch_file<'a>(&'a self, file: &'a FileRef) -> TransportFuture<'a, Vec<u8>> {
        Box::pin(async move {
            tokio::fs::read(&file.0)
                .await
                .map_err(|e| BotvisorError::TransportFailure(format!("{}: {e}", file.0)))
        })
    }
}

/// Parse one console input line.
pub fn parse_line(line: &str) -> Option<InboundPayload> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }
    if let Some(path) = line.strip_prefix('@') {
        let path = path.trim();
        let file_name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        return Some(InboundPayload::Document {
            file: FileRef(path.to_string()),
            file_name,
        });
    }
    if let Some(data) = line.strip_prefix('#') {
        return Some(InboundPayload::Choice(data.trim().to_string()));
    }
    Some(InboundPayload::Text(line.to_string()))
}

/// Read stdin lines into inbound events for `chat`. End of input requests a
/// shutdown.
pub fn spawn_console_reader(
    chat: ChatId,
    user: UserId,
    events: mpsc::Sender<SupervisorEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let Some(payload) = parse_line(&line) else {
                        continue;
                    };
                    let event = InboundEvent {
                        chat,
                        user,
                        payload,
                    };
                    if events.send(SupervisorEvent::Inbound(event)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    info!("console input closed");
                    let _ = events.send(SupervisorEvent::ShutdownRequested).await;
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "console read failed");
                    let _ = events.send(SupervisorEvent::ShutdownRequested).await;
                    break;
                }
            }
        }
    })
}
