// src/exec/process_runner.rs

//! Individual managed-process runner.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::SupervisorEvent;
use crate::errors::{BotvisorError, Result};
use crate::supervisor::outcome::ExitStatusInfo;
use crate::types::{LogStream, StopSignal};

use super::backend::{ProcessHandle, SpawnSpec, StdinPipe};
use super::signal;

const READ_CHUNK: usize = 4096;

/// How long to wait for stdout/stderr to drain after the process exited.
/// Grandchildren may inherit the pipes and keep them open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Spawn the process for `spec` with all three standard streams piped.
///
/// Spawn errors are returned verbatim as `SpawnFailure` and never retried.
pub(crate) fn spawn_supervised(
    spec: SpawnSpec,
    events: mpsc::Sender<SupervisorEvent>,
) -> Result<ProcessHandle> {
    info!(
        project = %spec.project,
        run_id = spec.run_id,
        program = ?spec.program,
        args = ?spec.args,
        cwd = ?spec.cwd,
        "starting managed process"
    );

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .current_dir(&spec.cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| {
        BotvisorError::SpawnFailure(format!("{}: {e}", spec.program.display()))
    })?;

    let pid = child.id();
    let stdin = child.stdin.take().map(|s| Box::new(s) as StdinPipe);

    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(forward_stream(
            stdout,
            spec.project.clone(),
            spec.run_id,
            LogStream::Stdout,
            events.clone(),
        )));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(forward_stream(
            stderr,
            spec.project.clone(),
            spec.run_id,
            LogStream::Stderr,
            events.clone(),
        )));
    }

    let (control_tx, control_rx) = mpsc::unbounded_channel::<StopSignal>();
    tokio::spawn(supervise(
        child,
        spec.project,
        spec.run_id,
        pid,
        readers,
        control_rx,
        events,
    ));

    Ok(ProcessHandle::new(spec.run_id, pid, stdin, control_tx))
}

/// Wait for the child to exit while serving signal requests, then report the
/// exit once both output streams have drained.
async fn supervise(
    mut child: Child,
    project: String,
    run_id: u64,
    pid: Option<u32>,
    readers: Vec<JoinHandle<()>>,
    mut control: mpsc::UnboundedReceiver<StopSignal>,
    events: mpsc::Sender<SupervisorEvent>,
) {
    let mut control_open = true;

    let wait_result = loop {
        tokio::select! {
            res = child.wait() => break res,

            sig = control.recv(), if control_open => match sig {
                Some(sig) => {
                    info!(project = %project, run_id, signal = %sig, "delivering signal");
                    if let Err(e) = signal::deliver(&mut child, pid, sig) {
                        warn!(
                            project = %project,
                            run_id,
                            error = %e,
                            "failed to deliver signal"
                        );
                    }
                }
                None => {
                    // Handle dropped without an exit: nobody owns this run any more.
                    debug!(project = %project, run_id, "process handle dropped; killing process");
                    control_open = false;
                    if let Err(e) = child.start_kill() {
                        debug!(project = %project, run_id, error = %e, "kill after handle drop failed");
                    }
                }
            }
        }
    };

    let status = match wait_result {
        Ok(status) => ExitStatusInfo::from(status),
        Err(e) => {
            error!(project = %project, run_id, error = %e, "waiting for managed process failed");
            ExitStatusInfo::default()
        }
    };

    for reader in readers {
        if tokio::time::timeout(DRAIN_GRACE, reader).await.is_err() {
            debug!(project = %project, run_id, "output stream still open after exit; not waiting");
        }
    }

    info!(
        project = %project,
        run_id,
        exit_code = ?status.code,
        signal = ?status.signal,
        "managed process exited"
    );

    let _ = events
        .send(SupervisorEvent::ProcessExited {
            project,
            run_id,
            status,
        })
        .await;
}

/// Forward raw chunks from one output stream as `ProcessOutput` events.
///
/// Chunks are forwarded as they arrive (not line by line) so an unterminated
/// prompt reaches the bridge. A UTF-8 sequence split across reads is carried
/// over to the next chunk.
async fn forward_stream<R>(
    mut reader: R,
    project: String,
    run_id: u64,
    stream: LogStream,
    events: mpsc::Sender<SupervisorEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    let mut carry: Vec<u8> = Vec::new();

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!(project = %project, run_id, ?stream, error = %e, "stream read failed");
                break;
            }
        };

        carry.extend_from_slice(&buf[..n]);
        let text = take_utf8_prefix(&mut carry);
        if text.is_empty() {
            continue;
        }

        debug!(project = %project, run_id, ?stream, "{}", text.trim_end());
        let event = SupervisorEvent::ProcessOutput {
            project: project.clone(),
            run_id,
            stream,
            text,
        };
        if events.send(event).await.is_err() {
            break;
        }
    }

    if !carry.is_empty() {
        let text = String::from_utf8_lossy(&carry).into_owned();
        let _ = events
            .send(SupervisorEvent::ProcessOutput {
                project,
                run_id,
                stream,
                text,
            })
            .await;
    }
}

/// Remove and return the longest decodable prefix of `bytes`.
///
/// Invalid sequences are replaced; an incomplete trailing sequence stays in
/// `bytes` for the next read.
fn take_utf8_prefix(bytes: &mut Vec<u8>) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => {
            let out = s.to_string();
            bytes.clear();
            out
        }
        Err(e) if e.error_len().is_none() => {
            let valid = e.valid_up_to();
            let rest = bytes.split_off(valid);
            let out = String::from_utf8_lossy(bytes).into_owned();
            *bytes = rest;
            out
        }
        Err(_) => {
            let out = String::from_utf8_lossy(bytes).into_owned();
            bytes.clear();
            out
        }
    }
}
