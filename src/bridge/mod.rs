// src/bridge/mod.rs

//! Interactive I/O bridge.
//!
//! Watches the unterminated tail of a process's stdout. When the prompt
//! detector fires, the conversation gets a [`PendingInputRequest`] and its
//! next plain text message is written to the process's stdin instead of
//! being parsed as a command.

pub mod assembler;
pub mod pending;
pub mod prompt;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

pub use assembler::{LineAssembler, MAX_HELD_BYTES};
pub use pending::PendingInputRequest;
pub use prompt::{PromptDetector, TrailingPunctuation};

use crate::config::ConfigFile;
use crate::engine::SupervisorEvent;
use crate::errors::{BotvisorError, Result};
use crate::registry::Registry;
use crate::types::{ChatId, LogStream};

/// What to do with one stdout chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StdoutDecision {
    /// Lines completed by the chunk, in order.
    pub lines: Vec<String>,
    /// Held text judged to be a prompt. It has been removed from the
    /// assembler and is not a completed line.
    pub prompt: Option<String>,
}

/// Input routed to a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub project: String,
    pub text: String,
}

#[derive(Debug)]
pub struct InputBridge {
    detector: Arc<dyn PromptDetector>,
    timeout: Duration,
    events: mpsc::Sender<SupervisorEvent>,
    pending: HashMap<ChatId, PendingInputRequest>,
    next_id: u64,
}

impl InputBridge {
    pub fn new(
        detector: Arc<dyn PromptDetector>,
        timeout: Duration,
        events: mpsc::Sender<SupervisorEvent>,
    ) -> Self {
        Self {
            detector,
            timeout,
            events,
            pending: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn from_config(cfg: &ConfigFile, events: mpsc::Sender<SupervisorEvent>) -> Result<Self> {
        let detector = TrailingPunctuation::new(&cfg.bridge.prompt_pattern)?;
        Ok(Self::new(Arc::new(detector), cfg.input_timeout(), events))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Feed a stdout chunk through `assembler` and apply the prompt heuristic
    /// to whatever remains held afterwards.
    pub fn process_stdout(&self, assembler: &mut LineAssembler, chunk: &str) -> StdoutDecision {
        let lines = assembler.push(chunk);
        let prompt = if self.detector.is_prompt(assembler.held()) {
            Some(assembler.take_held())
        } else {
            None
        };
        StdoutDecision { lines, prompt }
    }

    /// Open a request for `chat`, superseding any previous one, and arm its
    /// timeout. Returns the request id.
    pub fn open_request(&mut self, chat: ChatId, project: &str, run_id: u64, prompt: &str) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let mut request = PendingInputRequest::new(
            id,
            project.to_string(),
            run_id,
            prompt.to_string(),
            self.timeout,
        );
        request.arm(chat, self.events.clone());

        if let Some(previous) = self.pending.insert(chat, request) {
            debug!(chat, superseded = previous.id, "input request superseded");
        }
        info!(chat, project, run_id, request_id = id, "awaiting input");
        id
    }

    pub fn pending(&self, chat: ChatId) -> Option<&PendingInputRequest> {
        self.pending.get(&chat)
    }

    pub fn has_pending(&self, chat: ChatId) -> bool {
        self.pending.contains_key(&chat)
    }

    /// Remove the request for `chat`, disarming its timer.
    pub fn take(&mut self, chat: ChatId) -> Option<PendingInputRequest> {
        let mut request = self.pending.remove(&chat)?;
        request.disarm();
        Some(request)
    }

    /// Drop the request for `chat` if it is still request `request_id`.
    /// A late timer for a superseded request is ignored.
    pub fn expire(&mut self, chat: ChatId, request_id: u64) -> Option<PendingInputRequest> {
        match self.pending.get(&chat) {
            Some(current) if current.id == request_id => self.take(chat),
            _ => None,
        }
    }

    /// Drop every request tied to `project`, returning the affected chats.
    pub fn clear_project(&mut self, project: &str) -> Vec<ChatId> {
        let chats: Vec<ChatId> = self
            .pending
            .iter()
            .filter(|(_, r)| r.project == project)
            .map(|(chat, _)| *chat)
            .collect();
        for chat in &chats {
            self.take(*chat);
        }
        chats
    }

    /// Route `text` to the process waiting on `chat`.
    ///
    /// Returns `None` when the conversation has no pending request, so the
    /// caller parses the message normally. The request is consumed either
    /// way once it exists.
    pub async fn deliver(
        &mut self,
        chat: ChatId,
        text: &str,
        registry: &mut Registry,
    ) -> Option<Result<Delivered>> {
        let request = self.take(chat)?;
        Some(write_to_process(&request, text, registry).await)
    }
}

async fn write_to_process(
    request: &PendingInputRequest,
    text: &str,
    registry: &mut Registry,
) -> Result<Delivered> {
    let closed = || {
        BotvisorError::InputRoutingFailure(format!(
            "bot \"{}\" is no longer running",
            request.project
        ))
    };

    let project = registry.get_mut(&request.project).ok_or_else(closed)?;
    let running = project.run_mut(request.run_id).ok_or_else(closed)?;
    running.handle.write_line(text).await?;

    project.logs.push(LogStream::Stdin, text);
    debug!(project = %request.project, run_id = request.run_id, "input delivered");

    Ok(Delivered {
        project: request.project.clone(),
        text: text.to_string(),
    })
}
