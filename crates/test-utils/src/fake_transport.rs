use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use botvisor::errors::BotvisorError;
use botvisor::transport::{ChatTransport, FileRef, OutgoingMessage, TransportFuture};
use botvisor::types::{ChatId, MessageId};

/// Something the core sent through the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        chat: ChatId,
        id: MessageId,
        message: OutgoingMessage,
    },
    Document {
        chat: ChatId,
        file_name: String,
        bytes: Vec<u8>,
        caption: Option<String>,
    },
    Edit {
        chat: ChatId,
        id: MessageId,
        text: String,
    },
}

#[derive(Default)]
struct TransportState {
    sent: Vec<Sent>,
    files: HashMap<String, Vec<u8>>,
    next_id: MessageId,
}

/// A transport that records outgoing traffic and serves uploads from memory.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    state: Arc<Mutex<TransportState>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `bytes` fetchable and return a reference to them.
    pub fn add_file(&self, bytes: impl Into<Vec<u8>>) -> FileRef {
        let mut state = self.state.lock().unwrap();
        let key = format!("file-{}", state.files.len() + 1);
        state.files.insert(key.clone(), bytes.into());
        FileRef(key)
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Texts sent to `chat`, with edits applied as separate entries.
    pub fn texts(&self, chat: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { chat: c, message, .. } if c == chat => Some(message.text),
                Sent::Edit { chat: c, text, .. } if c == chat => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn last_text(&self, chat: ChatId) -> Option<String> {
        self.texts(chat).pop()
    }

    /// Last message with buttons sent to `chat`.
    pub fn last_choices(&self, chat: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .rev()
            .find_map(|s| match s {
                Sent::Text { chat: c, message, .. } if c == chat && !message.choices.is_empty() => {
                    Some(message.choices.into_iter().map(|c| c.data).collect())
                }
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn documents(&self, chat: ChatId) -> Vec<(String, Vec<u8>)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Document {
                    chat: c,
                    file_name,
                    bytes,
                    ..
                } if c == chat => Some((file_name, bytes)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().sent.clear();
    }
}

impl ChatTransport for RecordingTransport {
    fn send_text(&self, chat: ChatId, message: OutgoingMessage) -> TransportFuture<'_, MessageId> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.sent.push(Sent::Text { chat, id, message });
        Box::pin(async move { Ok(id) })
    }

    fn send_document(
        &self,
        chat: ChatId,
        file_name: String,
        bytes: Vec<u8>,
        caption: Option<String>,
    ) -> TransportFuture<'_, ()> {
        self.state.lock().unwrap().sent.push(Sent::Document {
            chat,
            file_name,
            bytes,
            caption,
        });
        Box::pin(async { Ok(()) })
    }

    fn edit_text(&self, chat: ChatId, id: MessageId, text: String) -> TransportFuture<'_, ()> {
        self.state
            .lock()
            .unwrap()
            .sent
            .push(Sent::Edit { chat, id, text });
        Box::pin(async { Ok(()) })
    }

    fn fetch_file<'a>(&'a self, file: &'a FileRef) -> TransportFuture<'a, Vec<u8>> {
        let found = self.state.lock().unwrap().files.get(&file.0).cloned();
        Box::pin(async move {
            found.ok_or_else(|| BotvisorError::TransportFailure(format!("unknown file {}", file.0)))
        })
    }
}
