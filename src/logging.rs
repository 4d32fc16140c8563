// src/logging.rs

//! Tracing setup. Everything goes to stderr; the console transport owns
//! stdout.
//!
//! The filter comes from `--log-level` when given, otherwise from
//! `BOTVISOR_LOG`, which takes full `EnvFilter` directives
//! (`botvisor=debug,botvisor::bridge=trace`). Without either, `info`.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "BOTVISOR_LOG";

const DEFAULT_DIRECTIVES: &str = "info";

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let from_env = std::env::var(LOG_ENV).ok();
    let directives = filter_directives(cli_level, from_env.as_deref())?;

    fmt()
        .with_env_filter(EnvFilter::new(&directives))
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(%directives, "logging initialised");
    Ok(())
}

/// Resolve the filter directives. A malformed `BOTVISOR_LOG` is an error
/// rather than a silent fallback.
pub fn filter_directives(cli_level: Option<LogLevel>, from_env: Option<&str>) -> Result<String> {
    if let Some(level) = cli_level {
        return Ok(level_directive(level).to_string());
    }
    match from_env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => {
            EnvFilter::try_new(raw).with_context(|| format!("invalid {LOG_ENV} value {raw:?}"))?;
            Ok(raw.to_string())
        }
        None => Ok(DEFAULT_DIRECTIVES.to_string()),
    }
}

fn level_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
