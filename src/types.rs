// src/types.rs

use std::fmt;

/// Identity of a conversation (one chat with the supervisor).
pub type ChatId = i64;

/// Identity of a user talking to the supervisor.
pub type UserId = i64;

/// Identity of a message previously sent through the transport.
pub type MessageId = i64;

/// Lifecycle status of a managed project.
///
/// `Stopped -> Installing -> Running -> Stopped`. Re-entering `Installing` or
/// `Running` from themselves is rejected by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectStatus {
    Stopped,
    Installing,
    Running,
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProjectStatus::Stopped => "stopped",
            ProjectStatus::Installing => "installing",
            ProjectStatus::Running => "running",
        };
        f.write_str(s)
    }
}

/// Which stream a captured log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
    /// Text routed into the process from the conversation.
    Stdin,
    /// Output of the dependency installer / environment creation.
    Install,
    /// Synthetic entry recording how the process ended.
    Exit,
}

impl LogStream {
    pub fn tag(&self) -> &'static str {
        match self {
            LogStream::Stdout => "STDOUT",
            LogStream::Stderr => "STDERR",
            LogStream::Stdin => "STDIN",
            LogStream::Install => "INSTALL",
            LogStream::Exit => "EXIT",
        }
    }
}

/// Signal delivered by `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// Graceful termination (SIGTERM).
    Terminate,
    /// Forced termination (SIGKILL).
    Kill,
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopSignal::Terminate => f.write_str("SIGTERM"),
            StopSignal::Kill => f.write_str("SIGKILL"),
        }
    }
}
