// tests/commands.rs

use std::time::Duration;

use botvisor::cli::LogLevel;
use botvisor::engine::format::{format_duration, truncate_chars};
use botvisor::engine::{parse_command, Command};
use botvisor::logging::filter_directives;
use botvisor::transport::console::parse_line;
use botvisor::transport::{FileRef, InboundPayload};
use botvisor::types::StopSignal;

#[test]
fn plain_text_is_not_a_command() {
    assert_eq!(parse_command("hello"), None);
    assert_eq!(parse_command("  "), None);
}

#[test]
fn commands_with_names() {
    assert_eq!(parse_command("/startbot echo"), Some(Command::Start("echo".into())));
    assert_eq!(parse_command("/run echo"), Some(Command::Start("echo".into())));
    assert_eq!(parse_command("/new my bot"), Some(Command::New("my_bot".into())));
    assert_eq!(parse_command("/logs echo"), Some(Command::Logs("echo".into())));
    assert_eq!(parse_command("/delete echo"), Some(Command::Delete("echo".into())));
    assert_eq!(parse_command("/edit echo"), Some(Command::Edit("echo".into())));
    assert_eq!(
        parse_command("/uploadreq echo"),
        Some(Command::UploadRequirements("echo".into()))
    );
    assert_eq!(
        parse_command("/stopbot echo"),
        Some(Command::Stop {
            name: "echo".into(),
            signal: StopSignal::Terminate
        })
    );
    assert_eq!(
        parse_command("/kill echo"),
        Some(Command::Stop {
            name: "echo".into(),
            signal: StopSignal::Kill
        })
    );
}

#[test]
fn bot_suffix_and_case_are_ignored() {
    assert_eq!(parse_command("/LIST@SupervisorBot"), Some(Command::List));
    assert_eq!(
        parse_command("/startbot@SupervisorBot echo"),
        Some(Command::Start("echo".into()))
    );
}

#[test]
fn missing_names_and_unknown_commands() {
    assert_eq!(
        parse_command("/startbot"),
        Some(Command::MissingName {
            usage: "/startbot <name>"
        })
    );
    assert_eq!(
        parse_command("/delete ???"),
        Some(Command::MissingName {
            usage: "/delete <name>"
        })
    );
    assert_eq!(parse_command("/frobnicate"), Some(Command::Unknown("/frobnicate".into())));
}

#[test]
fn start_without_a_name_is_help() {
    assert_eq!(parse_command("/start"), Some(Command::Help));
    assert_eq!(parse_command("/start echo"), Some(Command::Start("echo".into())));
}

#[test]
fn console_lines() {
    assert_eq!(parse_line("hi\n"), Some(InboundPayload::Text("hi".into())));
    assert_eq!(parse_line("\n"), None);
    assert_eq!(parse_line("#entry:a.py"), Some(InboundPayload::Choice("entry:a.py".into())));
    assert_eq!(
        parse_line("@/tmp/uploads/bot.py"),
        Some(InboundPayload::Document {
            file: FileRef("/tmp/uploads/bot.py".into()),
            file_name: "bot.py".into(),
        })
    );
}

#[test]
fn message_helpers() {
    assert_eq!(truncate_chars("short", 10), "short");
    assert_eq!(truncate_chars("abcdefghij", 5), "abcd…");
    assert_eq!(format_duration(Duration::from_secs(300)), "5m");
    assert_eq!(format_duration(Duration::from_secs(90)), "90s");
    assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
    assert_eq!(format_duration(Duration::from_secs(7200)), "2h");
}

#[test]
fn log_filter_resolution() {
    assert_eq!(filter_directives(None, None).unwrap(), "info");
    assert_eq!(filter_directives(None, Some("  ")).unwrap(), "info");
    assert_eq!(
        filter_directives(None, Some("botvisor=debug,botvisor::bridge=trace")).unwrap(),
        "botvisor=debug,botvisor::bridge=trace"
    );
    assert_eq!(
        filter_directives(Some(LogLevel::Warn), Some("botvisor=debug")).unwrap(),
        "warn"
    );
    assert!(filter_directives(None, Some("botvisor=loud")).is_err());
}
