// src/engine/mod.rs

//! Orchestration engine for botvisor.
//!
//! A single event loop owns the registry, the supervisor, the input bridge
//! and the ingestion conversations. Everything that happens reaches it as a
//! [`SupervisorEvent`]:
//! - chat messages and button presses from the transport
//! - output chunks and exits of managed processes
//! - output and completion of background provisioning
//! - input request timeouts
//! - shutdown (Ctrl-C or end of console input)
//!
//! Handlers run one at a time, so lifecycle checks and the state changes
//! they guard never interleave.

use crate::errors::Result;
use crate::provision::ProvisionReport;
use crate::registry::LogEntry;
use crate::supervisor::outcome::ExitStatusInfo;
use crate::transport::InboundEvent;
use crate::types::{ChatId, LogStream};

pub mod commands;
pub mod format;
pub mod handlers;
pub mod process_events;
pub mod runtime;

pub use commands::{parse_command, Command};
pub use runtime::Runtime;

/// Events flowing into the runtime from the transport, processes and
/// background tasks.
#[derive(Debug)]
pub enum SupervisorEvent {
    Inbound(InboundEvent),
    /// A raw chunk of process output.
    ProcessOutput {
        project: String,
        run_id: u64,
        stream: LogStream,
        text: String,
    },
    /// A process exited. Sent after all of its output events.
    ProcessExited {
        project: String,
        run_id: u64,
        status: ExitStatusInfo,
    },
    ProvisionOutput {
        project: String,
        ticket: u64,
        line: LogEntry,
    },
    ProvisionFinished {
        project: String,
        ticket: u64,
        result: Result<ProvisionReport>,
    },
    InputTimeout {
        chat: ChatId,
        request_id: u64,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}
