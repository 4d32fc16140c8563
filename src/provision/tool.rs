// src/provision/tool.rs

//! External tool invocation (environment creation, dependency install).

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::Result;
use crate::registry::LogEntry;
use crate::types::LogStream;

/// Where tool output lines go while a tool runs.
pub type LogSink = mpsc::UnboundedSender<LogEntry>;

/// One external tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Result of a tool that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolExit {
    pub code: Option<i32>,
    /// Everything the tool wrote to stderr.
    pub stderr: String,
}

impl ToolExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external tools. Boxed futures keep the trait object-safe so tests
/// can substitute a recording runner.
pub trait ToolRunner: Send + Sync + fmt::Debug {
    /// Run `invocation`, sending each output line to `sink` as an
    /// `INSTALL` log entry. Errors only if the tool could not be started.
    fn run<'a>(
        &'a self,
        invocation: &'a ToolInvocation,
        sink: &'a LogSink,
    ) -> Pin<Box<dyn Future<Output = Result<ToolExit>> + Send + 'a>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RealToolRunner;

impl ToolRunner for RealToolRunner {
    fn run<'a>(
        &'a self,
        invocation: &'a ToolInvocation,
        sink: &'a LogSink,
    ) -> Pin<Box<dyn Future<Output = Result<ToolExit>> + Send + 'a>> {
        Box::pin(async move {
            debug!(cwd = ?invocation.cwd, "running tool: {invocation}");

            let mut child = Command::new(&invocation.program)
                .args(&invocation.args)
                .current_dir(&invocation.cwd)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .with_context(|| format!("failed to start `{invocation}`"))?;

            let stdout = child.stdout.take();
            let stderr = child.stderr.take();

            let (_, stderr_text, status) = tokio::join!(
                pump_lines(stdout, sink, false),
                pump_lines(stderr, sink, true),
                child.wait(),
            );
            let status = status.with_context(|| format!("failed to wait for `{invocation}`"))?;

            Ok(ToolExit {
                code: status.code(),
                stderr: stderr_text,
            })
        })
    }
}

/// Forward lines from `reader` to `sink`; optionally collect them.
async fn pump_lines<R>(reader: Option<R>, sink: &LogSink, collect: bool) -> String
where
    R: AsyncRead + Unpin,
{
    let mut collected = String::new();
    let Some(reader) = reader else {
        return collected;
    };

    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if collect {
                    collected.push_str(&line);
                    collected.push('\n');
                }
                debug!("install: {line}");
                let _ = sink.send(LogEntry {
                    stream: LogStream::Install,
                    text: line,
                });
            }
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "tool output read failed");
                break;
            }
        }
    }
    collected
}
