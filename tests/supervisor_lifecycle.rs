// tests/supervisor_lifecycle.rs

mod common;
use crate::common::builders::ConfigFileBuilder;
use crate::common::{init_tracing, Harness, CHAT};

use std::path::{Path, PathBuf};

use botvisor::engine::SupervisorEvent;
use botvisor::fs::FileSystem;
use botvisor::types::{LogStream, ProjectStatus, StopSignal};

const ECHO: &str = "name = input('Name: ')\nprint('Hello', name)\n";

async fn harness_with_bot() -> Harness {
    init_tracing();
    let mut h = Harness::new(&ConfigFileBuilder::new().build());
    h.create_bot("echo", ECHO).await;
    h
}

fn status(h: &Harness, name: &str) -> ProjectStatus {
    h.runtime.registry().get(name).unwrap().status()
}

#[tokio::test]
async fn start_moves_through_installing_to_running() {
    let mut h = harness_with_bot().await;

    h.text("/startbot echo").await;
    assert_eq!(status(&h, "echo"), ProjectStatus::Installing);
    assert!(h.last_text().contains("Installing requirements"));

    h.pump_until(|e| matches!(e, SupervisorEvent::ProvisionFinished { .. }))
        .await;
    assert_eq!(status(&h, "echo"), ProjectStatus::Running);

    let spawned = h.backend.spawned();
    assert_eq!(spawned.len(), 1);
    assert_eq!(spawned[0].program, PathBuf::from("/bots/echo/.venv/bin/python"));
    assert_eq!(spawned[0].args, vec!["-u", "/bots/echo/echo.py"]);
    assert_eq!(spawned[0].cwd, PathBuf::from("/bots/echo"));

    let texts = h.transport.texts(CHAT);
    assert!(texts.iter().any(|t| t.contains("no requirements to install")));
    assert!(h.last_text().contains("started"));
}

#[tokio::test]
async fn second_start_while_installing_is_rejected() {
    let mut h = harness_with_bot().await;

    h.text("/startbot echo").await;
    h.text("/startbot echo").await;
    assert!(h.last_text().contains("still installing"), "{}", h.last_text());

    h.pump_until(|e| matches!(e, SupervisorEvent::ProvisionFinished { .. }))
        .await;
    assert_eq!(h.backend.spawn_count(), 1);
    assert_eq!(status(&h, "echo"), ProjectStatus::Running);
}

#[tokio::test]
async fn start_while_running_is_rejected() {
    let mut h = harness_with_bot().await;
    h.start("echo").await.unwrap();

    h.text("/startbot echo").await;

    assert!(h.last_text().contains("already running"));
    assert_eq!(h.backend.spawn_count(), 1);
    assert_eq!(status(&h, "echo"), ProjectStatus::Running);
}

#[tokio::test]
async fn provisioning_failure_returns_to_stopped() {
    let mut h = harness_with_bot().await;
    h.tools.fail_when("venv", 1, "Error: ensurepip is not available");

    assert_eq!(h.start("echo").await, None);

    assert_eq!(status(&h, "echo"), ProjectStatus::Stopped);
    assert_eq!(h.backend.spawn_count(), 0);
    let last = h.last_text();
    assert!(last.contains("environment creation failed"), "{last}");
    assert!(last.contains("ensurepip"), "{last}");
}

#[tokio::test]
async fn long_install_failures_keep_the_final_error_line() {
    let mut h = harness_with_bot().await;
    h.fs.add_file("/bots/echo/requirements.txt", "nope\n");
    let noise = "x".repeat(400);
    h.tools.fail_when(
        "pip",
        1,
        &format!("{noise}\nERROR: No matching distribution found for nope"),
    );

    assert_eq!(h.start("echo").await, None);

    assert_eq!(status(&h, "echo"), ProjectStatus::Stopped);
    let last = h.last_text();
    assert!(last.contains("dependency install failed with exit code 1"), "{last}");
    assert!(last.contains("(truncated)"), "{last}");
    assert!(last.ends_with("ERROR: No matching distribution found for nope"), "{last}");
}

#[tokio::test]
async fn spawn_failure_returns_to_stopped() {
    let mut h = harness_with_bot().await;
    h.backend.fail_next_spawn("python: not found");

    assert_eq!(h.start("echo").await, None);

    assert_eq!(status(&h, "echo"), ProjectStatus::Stopped);
    assert!(h.last_text().contains("Failed to start process"));
}

#[tokio::test]
async fn missing_entry_point_is_reported() {
    let mut h = harness_with_bot().await;
    h.fs.remove_file(Path::new("/bots/echo/echo.py")).unwrap();

    h.text("/startbot echo").await;

    assert_eq!(status(&h, "echo"), ProjectStatus::Stopped);
    assert!(h.last_text().contains("does not exist"));
    assert_eq!(h.tools.calls().len(), 0);
}

#[tokio::test]
async fn stop_waits_for_the_exit_event() {
    let mut h = harness_with_bot().await;
    let run = h.start("echo").await.unwrap();

    h.text("/stopbot echo").await;

    assert_eq!(h.backend.signals(run), vec![StopSignal::Terminate]);
    assert_eq!(status(&h, "echo"), ProjectStatus::Running);
    assert!(h.last_text().contains("Sent SIGTERM"));

    h.exit("echo", run, None, Some(15)).await;

    assert_eq!(status(&h, "echo"), ProjectStatus::Stopped);
    assert!(h.last_text().contains("stopped (SIGTERM)"), "{}", h.last_text());
}

#[tokio::test]
async fn kill_sends_sigkill() {
    let mut h = harness_with_bot().await;
    let run = h.start("echo").await.unwrap();

    h.text("/kill echo").await;
    assert_eq!(h.backend.signals(run), vec![StopSignal::Kill]);

    h.exit("echo", run, None, Some(9)).await;
    assert!(h.last_text().contains("stopped (SIGKILL)"));
}

#[tokio::test]
async fn stopping_a_stopped_bot_fails() {
    let mut h = harness_with_bot().await;
    h.text("/stopbot echo").await;
    assert!(h.last_text().contains("is not running"));

    h.text("/stopbot ghost").await;
    assert!(h.last_text().contains("not found"));
}

#[tokio::test]
async fn crash_reports_stderr_diagnostics() {
    let mut h = harness_with_bot().await;
    let run = h.start("echo").await.unwrap();

    h.output(
        "echo",
        run,
        LogStream::Stderr,
        "Traceback (most recent call last):\n  File \"echo.py\", line 1\nValueError: bad input\n",
    )
    .await;
    h.exit("echo", run, Some(1), None).await;

    let last = h.last_text();
    assert!(last.contains("exited with code 1"), "{last}");
    assert!(last.contains("ValueError: bad input"), "{last}");
    assert_eq!(status(&h, "echo"), ProjectStatus::Stopped);
}

#[tokio::test]
async fn stderr_lines_split_across_reads_are_logged_once() {
    let mut h = harness_with_bot().await;
    let run = h.start("echo").await.unwrap();

    h.output("echo", run, LogStream::Stderr, "Value").await;
    h.output("echo", run, LogStream::Stderr, "Error: bad\nwarn").await;
    h.exit("echo", run, Some(1), None).await;

    let stderr: Vec<String> = h
        .runtime
        .registry()
        .get("echo")
        .unwrap()
        .logs
        .iter()
        .filter(|e| e.stream == LogStream::Stderr)
        .map(|e| e.text.clone())
        .collect();
    assert_eq!(stderr, vec!["ValueError: bad", "warn"]);
}

#[tokio::test]
async fn non_zero_exit_without_markers_has_no_diagnostics() {
    let mut h = harness_with_bot().await;
    let run = h.start("echo").await.unwrap();

    h.output("echo", run, LogStream::Stderr, "bye\n").await;
    h.exit("echo", run, Some(3), None).await;

    assert_eq!(h.last_text(), "⚠️ Bot \"echo\" exited with code 3.");
}

#[tokio::test]
async fn clean_exit_ignores_stderr_markers() {
    let mut h = harness_with_bot().await;
    let run = h.start("echo").await.unwrap();

    h.output("echo", run, LogStream::Stderr, "DeprecationWarning: error-prone API\n")
        .await;
    h.exit("echo", run, Some(0), None).await;

    assert_eq!(h.last_text(), "✅ Bot \"echo\" finished.");
}

#[tokio::test]
async fn unexpected_signal_is_a_failure() {
    let mut h = harness_with_bot().await;
    let run = h.start("echo").await.unwrap();

    h.exit("echo", run, None, Some(11)).await;

    assert!(h.last_text().contains("killed by SIGSEGV"));
}

#[tokio::test]
async fn stale_events_are_ignored() {
    let mut h = harness_with_bot().await;
    let run = h.start("echo").await.unwrap();
    let before = h.transport.sent().len();

    h.stdout("echo", run + 10, "ghost\n").await;
    h.exit("echo", run + 10, Some(0), None).await;

    assert_eq!(status(&h, "echo"), ProjectStatus::Running);
    assert_eq!(h.transport.sent().len(), before);
}

#[tokio::test]
async fn restart_gets_a_fresh_run_and_fresh_logs() {
    let mut h = harness_with_bot().await;
    let first = h.start("echo").await.unwrap();
    h.stdout("echo", first, "first run\n").await;
    h.exit("echo", first, Some(0), None).await;

    let second = h.start("echo").await.unwrap();

    assert_ne!(first, second);
    let logs = &h.runtime.registry().get("echo").unwrap().logs;
    assert!(logs.iter().all(|e| e.text != "first run"));

    // The old run's exit no longer affects the new one.
    h.exit("echo", first, Some(0), None).await;
    assert_eq!(status(&h, "echo"), ProjectStatus::Running);
}

#[tokio::test]
async fn stdout_lines_are_forwarded_and_logged() {
    let mut h = harness_with_bot().await;
    let run = h.start("echo").await.unwrap();

    h.stdout("echo", run, "hello\n\nworld\npartial").await;
    assert_eq!(h.last_text(), "hello\nworld");

    h.text("/logs echo").await;
    let logs = h.last_text();
    assert!(logs.contains("[STDOUT] hello"), "{logs}");
    assert!(logs.contains("[STDOUT] world"), "{logs}");
    assert!(!logs.contains("partial"), "{logs}");

    h.exit("echo", run, Some(0), None).await;
    let texts = h.transport.texts(CHAT);
    assert!(texts.iter().any(|t| t == "partial"));
}

#[tokio::test]
async fn long_logs_are_sent_as_a_document() {
    init_tracing();
    let mut h = Harness::new(&ConfigFileBuilder::new().max_message_chars(80).build());
    h.create_bot("echo", ECHO).await;
    let run = h.start("echo").await.unwrap();

    for i in 0..20 {
        h.stdout("echo", run, &format!("line number {i}\n")).await;
    }
    h.text("/logs echo").await;

    let docs = h.transport.documents(CHAT);
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].0, "echo.log");
    let body = String::from_utf8(docs[0].1.clone()).unwrap();
    assert!(body.contains("[STDOUT] line number 19"));
}

#[tokio::test]
async fn list_shows_status() {
    let mut h = harness_with_bot().await;
    h.create_bot("other", "print(1)\n").await;
    h.start("echo").await.unwrap();

    h.text("/list").await;

    let list = h.last_text();
    assert!(list.contains("echo (running) - echo.py"), "{list}");
    assert!(list.contains("other (stopped) - other.py"), "{list}");
}
