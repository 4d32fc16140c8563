#![allow(dead_code)]

use std::path::Path;

use botvisor::config::{ConfigFile, RawConfigFile};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from the built-in defaults with the storage root under `/bots`
/// and the input timeout at 5 seconds.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.storage.root = "/bots".into();
        config.bridge.input_timeout = "5s".to_string();
        Self { config }
    }

    pub fn root(mut self, root: impl AsRef<Path>) -> Self {
        self.config.storage.root = root.as_ref().to_path_buf();
        self
    }

    pub fn interpreter(mut self, interpreter: &str, args: &[&str]) -> Self {
        self.config.runtime.interpreter = interpreter.to_string();
        self.config.runtime.interpreter_args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn isolated_env(mut self, val: bool) -> Self {
        self.config.runtime.isolated_env = val;
        self
    }

    pub fn script_extension(mut self, ext: &str) -> Self {
        self.config.ingest.script_extension = ext.to_string();
        self
    }

    pub fn input_timeout(mut self, timeout: &str) -> Self {
        self.config.bridge.input_timeout = timeout.to_string();
        self
    }

    pub fn log_capacity(mut self, capacity: usize) -> Self {
        self.config.logs.capacity = capacity;
        self
    }

    pub fn max_message_chars(mut self, max: usize) -> Self {
        self.config.logs.max_message_chars = max;
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
