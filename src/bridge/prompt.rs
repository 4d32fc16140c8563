// src/bridge/prompt.rs

//! Prompt detection strategies.

use std::fmt;

use regex::Regex;

use crate::errors::{BotvisorError, Result};

/// Decides whether unterminated stdout text is a request for input.
///
/// The bridge only ever asks this one question, so other strategies (an
/// explicit marker protocol, silence detection) can be swapped in without
/// touching routing.
pub trait PromptDetector: Send + Sync + fmt::Debug {
    /// `held` is the text after the last newline of the stdout stream.
    fn is_prompt(&self, held: &str) -> bool;
}

/// Default heuristic: held text ending in `:` or `?` (after trimming) is a
/// prompt. False positives such as `"Score: 10"` printed without a newline
/// are accepted.
#[derive(Debug, Clone)]
pub struct TrailingPunctuation {
    pattern: Regex,
}

impl TrailingPunctuation {
    pub const DEFAULT_PATTERN: &'static str = r"[:?]\s*$";

    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            BotvisorError::ConfigError(format!("invalid prompt pattern {pattern:?}: {e}"))
        })?;
        Ok(Self { pattern })
    }
}

impl Default for TrailingPunctuation {
    fn default() -> Self {
        Self {
            pattern: Regex::new(Self::DEFAULT_PATTERN).expect("default prompt pattern"),
        }
    }
}

impl PromptDetector for TrailingPunctuation {
    fn is_prompt(&self, held: &str) -> bool {
        let trimmed = held.trim();
        !trimmed.is_empty() && self.pattern.is_match(trimmed)
    }
}
