// src/engine/format.rs

//! User-facing message text.

use std::time::Duration;

use crate::errors::BotvisorError;
use crate::provision::{InstallOutcome, ProvisionReport};
use crate::registry::{LogBuffer, Registry};
use crate::supervisor::outcome::{signal_name, ExitOutcome, ExitReport};
use crate::types::ProjectStatus;

pub fn help_text(terminator: &str) -> String {
    format!(
        "🤖 Bot supervisor\n\
         \n\
         /new <name> - create a bot (file, pasted code or zip)\n\
         /edit <name> - replace a bot's code\n\
         /upload - upload a single script; its file name names the bot\n\
         /uploadreq <name> - set a bot's requirements\n\
         /list - list bots\n\
         /startbot <name> - install requirements and start\n\
         /stopbot <name> - stop (SIGTERM)\n\
         /kill <name> - stop immediately (SIGKILL)\n\
         /logs <name> - recent output\n\
         /delete <name> - stop and delete\n\
         /cancel - abort the current upload\n\
         \n\
         While pasting code, send {terminator} to finish. When a running bot asks \
         for input, your next message is sent to it."
    )
}

fn status_icon(status: ProjectStatus) -> &'static str {
    match status {
        ProjectStatus::Running => "🟢",
        ProjectStatus::Installing => "🟡",
        ProjectStatus::Stopped => "🔴",
    }
}

pub fn project_list(registry: &Registry) -> String {
    if registry.is_empty() {
        return "No bots yet. Create one with /new <name> or /upload.".to_string();
    }
    let mut text = String::from("📋 Bots:");
    for project in registry.iter() {
        let entry = project
            .entry_point()
            .strip_prefix(&project.paths().dir)
            .unwrap_or(project.entry_point());
        text.push_str(&format!(
            "\n{} {} ({}) - {}",
            status_icon(project.status()),
            project.name(),
            project.status(),
            entry.display()
        ));
    }
    text
}

/// Cut `text` to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub fn error_message(err: &BotvisorError, max_chars: usize) -> String {
    match err {
        // Diagnostic already keeps the tail; a head cut would drop its last line.
        BotvisorError::ProvisionFailure { .. } => format!("❌ {err}"),
        _ => format!("❌ {}", truncate_chars(&err.to_string(), max_chars)),
    }
}

pub fn provision_summary(name: &str, report: &ProvisionReport) -> String {
    match report.install {
        InstallOutcome::NoManifest => format!("✅ \"{name}\" has no requirements to install."),
        InstallOutcome::UpToDate => format!("✅ Requirements for \"{name}\" are up to date."),
        InstallOutcome::Installed => format!("✅ Requirements for \"{name}\" installed."),
    }
}

pub fn exit_message(report: &ExitReport) -> String {
    let name = &report.project;
    let mut text = match report.outcome {
        ExitOutcome::Clean => format!("✅ Bot \"{name}\" finished."),
        ExitOutcome::StoppedBySignal(signal) => {
            format!("🛑 Bot \"{name}\" stopped ({signal}).")
        }
        ExitOutcome::OtherSignal(sig) => format!(
            "⚠️ Bot \"{name}\" was killed by {}.",
            signal_name(sig)
        ),
        ExitOutcome::NonZeroExit(code) => {
            format!("⚠️ Bot \"{name}\" exited with code {code}.")
        }
    };
    if let Some(diagnostics) = &report.diagnostics {
        text.push_str("\n\n");
        text.push_str(diagnostics);
    }
    text
}

/// Logs shown by `/logs`: the last `tail` entries.
pub fn logs_tail(name: &str, logs: &LogBuffer, tail: usize) -> String {
    if logs.is_empty() {
        return format!("No logs for \"{name}\" yet.");
    }
    format!(
        "📜 Last {} log lines of \"{name}\":\n{}",
        tail.min(logs.len()),
        LogBuffer::render(logs.tail(tail))
    )
}

/// Input timeout in a short human form (`5m`, `30s`, `1500ms`).
pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms % 3_600_000 == 0 {
        format!("{}h", ms / 3_600_000)
    } else if ms % 60_000 == 0 {
        format!("{}m", ms / 60_000)
    } else if ms % 1000 == 0 {
        format!("{}s", ms / 1000)
    } else {
        format!("{ms}ms")
    }
}
