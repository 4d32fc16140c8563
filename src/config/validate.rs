// src/config/validate.rs

use std::time::Duration;

use globset::Glob;
use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BotvisorError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::BotvisorError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let input_timeout = parse_duration(&raw.bridge.input_timeout)
            .map_err(|e| BotvisorError::ConfigError(format!("[bridge].input_timeout: {e}")))?;
        Ok(ConfigFile::new_unchecked(raw, input_timeout))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_runtime(cfg)?;
    validate_bridge(cfg)?;
    validate_logs(cfg)?;
    validate_ingest(cfg)?;
    Ok(())
}

fn validate_runtime(cfg: &RawConfigFile) -> Result<()> {
    if cfg.runtime.interpreter.trim().is_empty() {
        return Err(BotvisorError::ConfigError(
            "[runtime].interpreter must not be empty".to_string(),
        ));
    }
    if cfg.runtime.isolated_env && cfg.runtime.env_dir_name.trim().is_empty() {
        return Err(BotvisorError::ConfigError(
            "[runtime].env_dir_name must not be empty when isolated_env = true".to_string(),
        ));
    }
    Ok(())
}

fn validate_bridge(cfg: &RawConfigFile) -> Result<()> {
    if let Err(e) = Regex::new(&cfg.bridge.prompt_pattern) {
        return Err(BotvisorError::ConfigError(format!(
            "[bridge].prompt_pattern is not a valid regex: {e}"
        )));
    }
    Ok(())
}

fn validate_logs(cfg: &RawConfigFile) -> Result<()> {
    let checks = [
        ("capacity", cfg.logs.capacity),
        ("tail_lines", cfg.logs.tail_lines),
        ("max_message_chars", cfg.logs.max_message_chars),
        ("diagnostic_chars", cfg.logs.diagnostic_chars),
    ];
    for (field, value) in checks {
        if value == 0 {
            return Err(BotvisorError::ConfigError(format!(
                "[logs].{field} must be >= 1 (got 0)"
            )));
        }
    }
    Ok(())
}

fn validate_ingest(cfg: &RawConfigFile) -> Result<()> {
    let ext = cfg.ingest.script_extension.trim();
    if ext.is_empty() || ext.contains('.') || ext.contains('/') {
        return Err(BotvisorError::ConfigError(format!(
            "[ingest].script_extension must be a bare extension like \"py\" (got {:?})",
            cfg.ingest.script_extension
        )));
    }
    if cfg.ingest.manifest_name.trim().is_empty() {
        return Err(BotvisorError::ConfigError(
            "[ingest].manifest_name must not be empty".to_string(),
        ));
    }
    if cfg.ingest.paste_terminator.trim().is_empty() {
        return Err(BotvisorError::ConfigError(
            "[ingest].paste_terminator must not be empty".to_string(),
        ));
    }
    for pat in &cfg.ingest.exclude {
        if let Err(e) = Glob::new(pat) {
            return Err(BotvisorError::ConfigError(format!(
                "[ingest].exclude has invalid glob {pat:?}: {e}"
            )));
        }
    }
    Ok(())
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = |per: u64| {
        value
            .checked_mul(per)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration '{s}' is too large"))
    };
    let duration = match unit.as_str() {
        "ms" => Duration::from_millis(value),
        "s" => Duration::from_secs(value),
        "m" => secs_per_unit(60)?,
        "h" => secs_per_unit(60 * 60)?,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    if duration.is_zero() {
        return Err("duration must be greater than zero".to_string());
    }
    Ok(duration)
}
