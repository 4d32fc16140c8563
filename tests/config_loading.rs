// tests/config_loading.rs

mod common;

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use botvisor::config::{load_and_validate, load_or_default, parse_duration, ConfigFile, RawConfigFile};
use botvisor::errors::BotvisorError;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn empty_file_uses_defaults() {
    let file = write_config("");
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.runtime.interpreter, "python3");
    assert_eq!(cfg.runtime.interpreter_args, vec!["-u".to_string()]);
    assert!(cfg.runtime.isolated_env);
    assert_eq!(cfg.ingest.script_extension, "py");
    assert_eq!(cfg.ingest.manifest_name, "requirements.txt");
    assert_eq!(cfg.ingest.paste_terminator, "/done");
    assert_eq!(cfg.input_timeout(), Duration::from_secs(300));
    assert!(cfg.storage.discover_existing);
}

#[test]
fn sections_override_defaults() {
    let file = write_config(
        r#"
[storage]
root = "/srv/bots"
discover_existing = false

[runtime]
interpreter = "python3.12"
interpreter_args = []
isolated_env = false

[bridge]
input_timeout = "90s"

[logs]
capacity = 50
tail_lines = 10
"#,
    );
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.storage.root, std::path::PathBuf::from("/srv/bots"));
    assert!(!cfg.storage.discover_existing);
    assert_eq!(cfg.runtime.interpreter, "python3.12");
    assert!(cfg.runtime.interpreter_args.is_empty());
    assert!(!cfg.runtime.isolated_env);
    assert_eq!(cfg.input_timeout(), Duration::from_secs(90));
    assert_eq!(cfg.logs.capacity, 50);
    assert_eq!(cfg.logs.tail_lines, 10);
}

#[test]
fn invalid_prompt_pattern_is_rejected() {
    let file = write_config("[bridge]\nprompt_pattern = \"([\"\n");
    match load_and_validate(file.path()) {
        Err(BotvisorError::ConfigError(msg)) => assert!(msg.contains("prompt_pattern"), "{msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn zero_log_capacity_is_rejected() {
    let file = write_config("[logs]\ncapacity = 0\n");
    match load_and_validate(file.path()) {
        Err(BotvisorError::ConfigError(msg)) => assert!(msg.contains("capacity"), "{msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn dotted_script_extension_is_rejected() {
    let file = write_config("[ingest]\nscript_extension = \".py\"\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(BotvisorError::ConfigError(_))
    ));
}

#[test]
fn bad_input_timeout_is_rejected() {
    let file = write_config("[bridge]\ninput_timeout = \"soon\"\n");
    match load_and_validate(file.path()) {
        Err(BotvisorError::ConfigError(msg)) => assert!(msg.contains("input_timeout"), "{msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let file = write_config("[storage\nroot = 1");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(BotvisorError::TomlError(_))
    ));
}

#[test]
fn explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(matches!(load_or_default(&missing), Err(BotvisorError::IoError(_))));
}

#[test]
fn defaults_validate() {
    assert!(ConfigFile::try_from(RawConfigFile::default()).is_ok());
}

#[test]
fn durations_parse_with_units() {
    assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
    assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
    assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
    assert!(parse_duration("0s").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("10d").is_err());
    assert!(parse_duration("").is_err());
}

#[test]
fn oversized_durations_are_rejected() {
    let huge = format!("{}h", u64::MAX / 60);
    let err = parse_duration(&huge).unwrap_err();
    assert!(err.contains("too large"), "{err}");
    assert!(parse_duration(&format!("{}m", u64::MAX)).is_err());
    assert_eq!(
        parse_duration(&format!("{}s", u64::MAX)).unwrap(),
        Duration::from_secs(u64::MAX)
    );
}
