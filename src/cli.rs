// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::ChatId;

/// Command-line arguments for `botvisor`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "botvisor",
    version,
    about = "Upload, provision, run and drive interpreted bots from a chat.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Botvisor.toml` in the current working directory. A missing
    /// default file means built-in defaults are used.
    #[arg(long, value_name = "PATH", default_value = "Botvisor.toml")]
    pub config: String,

    /// Override `[storage].root`, the directory holding all projects.
    #[arg(long, value_name = "DIR")]
    pub root: Option<String>,

    /// Conversation id used by the console transport.
    #[arg(long, value_name = "ID", default_value_t = 1)]
    pub chat: ChatId,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BOTVISOR_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load config, discover projects and print them, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
