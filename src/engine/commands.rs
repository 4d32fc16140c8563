// src/engine/commands.rs

//! Chat command parsing.

use crate::store::sanitize_name;
use crate::types::StopSignal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    New(String),
    Edit(String),
    Upload,
    UploadRequirements(String),
    List,
    Start(String),
    Stop { name: String, signal: StopSignal },
    Logs(String),
    Delete(String),
    Cancel,
    /// A known command used without its required name.
    MissingName { usage: &'static str },
    Unknown(String),
}

/// Parse `text` as a command. Returns `None` for anything not starting with
/// `/`.
///
/// `/cmd@SomeBot` suffixes are stripped and names are sanitised the same way
/// they are at creation, so `/startbot my bot` finds `my_bot`.
pub fn parse_command(text: &str) -> Option<Command> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;

    let (head, arg) = match rest.split_once(char::is_whitespace) {
        Some((head, arg)) => (head, arg.trim()),
        None => (rest, ""),
    };
    let head = head.split('@').next().unwrap_or(head).to_ascii_lowercase();
    let name = sanitize_name(arg);

    let with_name = |usage: &'static str, build: fn(String) -> Command| match name.clone() {
        Some(name) => build(name),
        None => Command::MissingName { usage },
    };

    let command = match head.as_str() {
        "help" => Command::Help,
        "start" => match name.clone() {
            Some(name) => Command::Start(name),
            None => Command::Help,
        },
        "new" => with_name("/new <name>", Command::New),
        "edit" => with_name("/edit <name>", Command::Edit),
        "upload" => Command::Upload,
        "uploadreq" | "req" => with_name("/uploadreq <name>", Command::UploadRequirements),
        "list" => Command::List,
        "startbot" | "run" => with_name("/startbot <name>", Command::Start),
        "stopbot" | "stop" => with_name("/stopbot <name>", |name| Command::Stop {
            name,
            signal: StopSignal::Terminate,
        }),
        "kill" => with_name("/kill <name>", |name| Command::Stop {
            name,
            signal: StopSignal::Kill,
        }),
        "logs" => with_name("/logs <name>", Command::Logs),
        "delete" => with_name("/delete <name>", Command::Delete),
        "cancel" => Command::Cancel,
        other => Command::Unknown(format!("/{other}")),
    };
    Some(command)
}
