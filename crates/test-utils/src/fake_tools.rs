use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use botvisor::errors::Result;
use botvisor::fs::FileSystem;
use botvisor::provision::{LogSink, ToolExit, ToolInvocation, ToolRunner};
use botvisor::registry::LogEntry;
use botvisor::types::LogStream;

#[derive(Default)]
struct ToolState {
    calls: Vec<ToolInvocation>,
    /// `(argument, exit)`: invocations containing `argument` end with `exit`.
    failures: Vec<(String, ToolExit)>,
    output: Vec<String>,
}

/// A tool runner that records invocations instead of running anything.
///
/// With a filesystem attached, `-m venv <dir>` creates `<dir>` so later
/// provisioning sees the environment.
#[derive(Clone, Default)]
pub struct RecordingToolRunner {
    state: Arc<Mutex<ToolState>>,
    fs: Option<Arc<dyn FileSystem>>,
}

impl std::fmt::Debug for RecordingToolRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingToolRunner").finish_non_exhaustive()
    }
}

impl RecordingToolRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Invocations with `arg` among their arguments exit with `code`.
    pub fn fail_when(&self, arg: &str, code: i32, stderr: &str) {
        self.state.lock().unwrap().failures.push((
            arg.to_string(),
            ToolExit {
                code: Some(code),
                stderr: stderr.to_string(),
            },
        ));
    }

    /// Lines every invocation writes to its output.
    pub fn emit(&self, line: &str) {
        self.state.lock().unwrap().output.push(line.to_string());
    }

    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of dependency installs run.
    pub fn install_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.args.iter().any(|a| a == "pip"))
            .count()
    }

    /// Number of environments created.
    pub fn venv_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.args.iter().any(|a| a == "venv"))
            .count()
    }
}

impl ToolRunner for RecordingToolRunner {
    fn run<'a>(
        &'a self,
        invocation: &'a ToolInvocation,
        sink: &'a LogSink,
    ) -> Pin<Box<dyn Future<Output = Result<ToolExit>> + Send + 'a>> {
        Box::pin(async move {
            let (exit, output) = {
                let mut state = self.state.lock().unwrap();
                state.calls.push(invocation.clone());
                let exit = state
                    .failures
                    .iter()
                    .find(|(arg, _)| invocation.args.iter().any(|a| a == arg))
                    .map(|(_, exit)| exit.clone())
                    .unwrap_or(ToolExit {
                        code: Some(0),
                        stderr: String::new(),
                    });
                (exit, state.output.clone())
            };

            for line in output {
                let _ = sink.send(LogEntry {
                    stream: LogStream::Install,
                    text: line,
                });
            }

            if exit.success() {
                if let (Some(fs), Some(pos)) = (&self.fs, invocation.args.iter().position(|a| a == "venv")) {
                    if let Some(dir) = invocation.args.get(pos + 1) {
                        fs.create_dir_all(std::path::Path::new(dir))?;
                    }
                }
            }
            Ok(exit)
        })
    }
}
