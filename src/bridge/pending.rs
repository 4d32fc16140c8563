// src/bridge/pending.rs

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::engine::SupervisorEvent;
use crate::types::ChatId;

/// An outstanding "process is waiting for input" marker for one conversation.
#[derive(Debug)]
pub struct PendingInputRequest {
    pub id: u64,
    pub project: String,
    /// Run the prompt came from; input is only written to this run.
    pub run_id: u64,
    pub prompt: String,
    pub expires_at: Instant,
    timer: Option<AbortHandle>,
}

impl PendingInputRequest {
    pub(crate) fn new(
        id: u64,
        project: String,
        run_id: u64,
        prompt: String,
        timeout: Duration,
    ) -> Self {
        Self {
            id,
            project,
            run_id,
            prompt,
            expires_at: Instant::now() + timeout,
            timer: None,
        }
    }

    /// Arm the expiry timer. When it fires, `InputTimeout` is sent to the
    /// runtime, which drops the request if it is still the current one.
    pub(crate) fn arm(&mut self, chat: ChatId, events: mpsc::Sender<SupervisorEvent>) {
        let request_id = self.id;
        let deadline = self.expires_at;
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            debug!(chat, request_id, "input request expired");
            let _ = events
                .send(SupervisorEvent::InputTimeout { chat, request_id })
                .await;
        });
        self.timer = Some(task.abort_handle());
    }

    pub(crate) fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for PendingInputRequest {
    fn drop(&mut self) {
        self.disarm();
    }
}
