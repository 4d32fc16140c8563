// src/supervisor/outcome.rs

//! Exit classification and stderr diagnostics.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::StopSignal;

/// Markers that make stderr worth attaching to a failure report.
static ERROR_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)error|exception|traceback").expect("static regex"));

/// Platform-neutral view of a process exit status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitStatusInfo {
    pub code: Option<i32>,
    /// Terminating signal number (unix only).
    pub signal: Option<i32>,
}

impl From<std::process::ExitStatus> for ExitStatusInfo {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ExitStatusInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "Process exited with code {code}"),
            (None, Some(sig)) => write!(f, "Process terminated by signal {}", signal_name(sig)),
            (None, None) => f.write_str("Process exited with unknown status"),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Exit code 0.
    Clean,
    /// Killed by the signal `stop` delivered.
    StoppedBySignal(StopSignal),
    /// Killed by a signal nobody here sent.
    OtherSignal(i32),
    NonZeroExit(i32),
}

impl ExitOutcome {
    /// Classify `status`, given the signal (if any) that `stop` delivered.
    ///
    /// A status with neither code nor signal counts as a non-zero exit with
    /// code `-1`.
    pub fn classify(status: ExitStatusInfo, stop_requested: Option<StopSignal>) -> Self {
        match (status.code, status.signal, stop_requested) {
            (Some(0), _, _) => ExitOutcome::Clean,
            (Some(code), _, _) => ExitOutcome::NonZeroExit(code),
            (None, Some(_), Some(requested)) => ExitOutcome::StoppedBySignal(requested),
            (None, Some(sig), None) => ExitOutcome::OtherSignal(sig),
            (None, None, _) => ExitOutcome::NonZeroExit(-1),
        }
    }
}

/// Full account of a finished run, published to anyone awaiting the exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    pub project: String,
    pub run_id: u64,
    pub status: ExitStatusInfo,
    pub outcome: ExitOutcome,
    /// Truncated stderr, attached only for non-zero exits whose stderr
    /// carries error markers.
    pub diagnostics: Option<String>,
}

/// Whether captured stderr looks like an error report.
pub fn has_error_markers(stderr: &str) -> bool {
    ERROR_MARKERS.is_match(stderr)
}

/// Pick the stderr excerpt to attach to an exit report.
pub fn diagnostics_for(outcome: ExitOutcome, stderr: &str, max_chars: usize) -> Option<String> {
    match outcome {
        ExitOutcome::NonZeroExit(_) if has_error_markers(stderr) => {
            Some(truncate_tail(stderr.trim(), max_chars))
        }
        _ => None,
    }
}

/// Keep the last `max_chars` characters of `text`; tracebacks end with the
/// interesting line.
pub fn truncate_tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    let tail: String = text.chars().skip(count - max_chars).collect();
    format!("(truncated) ...{tail}")
}

pub fn signal_name(sig: i32) -> String {
    match sig {
        1 => "SIGHUP".to_string(),
        2 => "SIGINT".to_string(),
        6 => "SIGABRT".to_string(),
        9 => "SIGKILL".to_string(),
        11 => "SIGSEGV".to_string(),
        15 => "SIGTERM".to_string(),
        other => format!("signal {other}"),
    }
}
