// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Raw configuration as read from a TOML file, before validation.
///
/// ```toml
/// [storage]
/// root = "uploads"
///
/// [runtime]
/// interpreter = "python3"
/// interpreter_args = ["-u"]
///
/// [bridge]
/// prompt_pattern = '[:?]\s*$'
/// input_timeout = "5m"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub runtime: RuntimeSection,

    #[serde(default)]
    pub bridge: BridgeSection,

    #[serde(default)]
    pub logs: LogsSection,

    #[serde(default)]
    pub ingest: IngestSection,
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// durations are parsed and patterns are known to compile.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub storage: StorageSection,
    pub runtime: RuntimeSection,
    pub bridge: BridgeSection,
    pub logs: LogsSection,
    pub ingest: IngestSection,
    input_timeout: Duration,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile, input_timeout: Duration) -> Self {
        Self {
            storage: raw.storage,
            runtime: raw.runtime,
            bridge: raw.bridge,
            logs: raw.logs,
            ingest: raw.ingest,
            input_timeout,
        }
    }

    /// How long a pending input request waits for a chat message.
    pub fn input_timeout(&self) -> Duration {
        self.input_timeout
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    /// Directory holding every managed project.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Register projects already present under `root` at startup.
    #[serde(default = "default_true")]
    pub discover_existing: bool,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            discover_existing: true,
        }
    }
}

/// `[runtime]` section: how scripts and their environments are run.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeSection {
    /// Interpreter used to create environments (and to run scripts when
    /// `isolated_env = false`).
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Arguments placed before the entry script on every run.
    #[serde(default = "default_interpreter_args")]
    pub interpreter_args: Vec<String>,

    /// Give every project its own virtual environment.
    #[serde(default = "default_true")]
    pub isolated_env: bool,

    /// Directory name of the environment inside a consolidated project.
    #[serde(default = "default_env_dir_name")]
    pub env_dir_name: String,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            interpreter_args: default_interpreter_args(),
            isolated_env: true,
            env_dir_name: default_env_dir_name(),
        }
    }
}

/// `[bridge]` section: interactive input routing.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeSection {
    /// Regex applied to the held (unterminated) stdout text.
    #[serde(default = "default_prompt_pattern")]
    pub prompt_pattern: String,

    /// Duration string such as `"90s"` or `"5m"`.
    #[serde(default = "default_input_timeout")]
    pub input_timeout: String,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            prompt_pattern: default_prompt_pattern(),
            input_timeout: default_input_timeout(),
        }
    }
}

/// `[logs]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LogsSection {
    /// Maximum entries kept per project; oldest are evicted first.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Entries shown by `/logs`.
    #[serde(default = "default_tail_lines")]
    pub tail_lines: usize,

    /// Longest chat message the supervisor sends before switching to a
    /// document.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Truncation applied to diagnostics shown to users.
    #[serde(default = "default_diagnostic_chars")]
    pub diagnostic_chars: usize,
}

impl Default for LogsSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            tail_lines: default_tail_lines(),
            max_message_chars: default_max_message_chars(),
            diagnostic_chars: default_diagnostic_chars(),
        }
    }
}

/// `[ingest]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestSection {
    /// Extension (without the dot) of runnable scripts.
    #[serde(default = "default_script_extension")]
    pub script_extension: String,

    /// File name of the dependency manifest inside a project.
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,

    /// Message that ends a paste session.
    #[serde(default = "default_paste_terminator")]
    pub paste_terminator: String,

    /// Glob patterns (relative to the project directory) never offered as
    /// entry points.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            script_extension: default_script_extension(),
            manifest_name: default_manifest_name(),
            paste_terminator: default_paste_terminator(),
            exclude: default_exclude(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_root() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_interpreter_args() -> Vec<String> {
    vec!["-u".to_string()]
}

fn default_env_dir_name() -> String {
    ".venv".to_string()
}

fn default_prompt_pattern() -> String {
    r"[:?]\s*$".to_string()
}

fn default_input_timeout() -> String {
    "5m".to_string()
}

fn default_capacity() -> usize {
    500
}

fn default_tail_lines() -> usize {
    25
}

fn default_max_message_chars() -> usize {
    4000
}

fn default_diagnostic_chars() -> usize {
    300
}

fn default_script_extension() -> String {
    "py".to_string()
}

fn default_manifest_name() -> String {
    "requirements.txt".to_string()
}

fn default_paste_terminator() -> String {
    "/done".to_string()
}

fn default_exclude() -> Vec<String> {
    vec![
        ".venv/**".to_string(),
        "**/__pycache__/**".to_string(),
        "__MACOSX/**".to_string(),
    ]
}
