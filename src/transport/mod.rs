// src/transport/mod.rs

//! Chat transport boundary.
//!
//! The core only ever sends text, sends documents, edits a message it sent
//! earlier and fetches uploaded file content. Everything else about the chat
//! network stays behind [`ChatTransport`].

pub mod console;

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;
use crate::types::{ChatId, MessageId, UserId};

pub use console::{spawn_console_reader, ConsoleTransport};

/// Opaque reference to an uploaded file, resolved by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRef(pub String);

/// A button offered with a message. `data` comes back as
/// [`InboundPayload::Choice`] when pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub data: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub choices: Vec<Choice>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: Vec::new(),
        }
    }

    pub fn with_choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = choices;
        self
    }
}

impl From<String> for OutgoingMessage {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

impl From<&str> for OutgoingMessage {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundPayload {
    Text(String),
    Document { file: FileRef, file_name: String },
    /// Button press carrying the choice's `data`.
    Choice(String),
}

/// One message or button press from a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub chat: ChatId,
    pub user: UserId,
    pub payload: InboundPayload,
}

pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

pub trait ChatTransport: Send + Sync {
    fn send_text(&self, chat: ChatId, message: OutgoingMessage) -> TransportFuture<'_, MessageId>;

    fn send_document(
        &self,
        chat: ChatId,
        file_name: String,
        bytes: Vec<u8>,
        caption: Option<String>,
    ) -> TransportFuture<'_, ()>;

    /// Replace the text of a message sent earlier.
    fn edit_text(&self, chat: ChatId, message: MessageId, text: String) -> TransportFuture<'_, ()>;

    /// Download the content of an uploaded file. Failures are
    /// `TransportFailure`.
    fn fetch_file<'a>(&'a self, file: &'a FileRef) -> TransportFuture<'a, Vec<u8>>;
}
