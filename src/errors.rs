// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotvisorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Bot \"{0}\" not found. Use /list to see available bots.")]
    NotFound(String),

    #[error("Bot \"{0}\" is already running.")]
    AlreadyRunning(String),

    #[error("Bot \"{0}\" is not running.")]
    NotRunning(String),

    #[error("Bot \"{0}\" is still installing its requirements.")]
    InstallInProgress(String),

    #[error("Entry point {} does not exist", .0.display())]
    EntryPointMissing(PathBuf),

    #[error("{stage} failed{}: {diagnostic}", exit_suffix(.code))]
    ProvisionFailure {
        stage: ProvisionStage,
        code: Option<i32>,
        diagnostic: String,
    },

    #[error("Failed to start process: {0}")]
    SpawnFailure(String),

    #[error("{0}")]
    IngestionFailure(String),

    #[error("Could not fetch the uploaded file: {0}")]
    TransportFailure(String),

    #[error("Could not deliver input: {0}")]
    InputRoutingFailure(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Which provisioning step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStage {
    CreateEnvironment,
    InstallDependencies,
}

impl std::fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvisionStage::CreateEnvironment => f.write_str("environment creation"),
            ProvisionStage::InstallDependencies => f.write_str("dependency install"),
        }
    }
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with exit code {code}"),
        None => String::new(),
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BotvisorError>;
