// tests/delete_and_shutdown.rs

mod common;
use crate::common::builders::ConfigFileBuilder;
use crate::common::{init_tracing, Harness, CHAT};

use std::path::Path;

use botvisor::engine::SupervisorEvent;
use botvisor::fs::FileSystem;
use botvisor::types::{ProjectStatus, StopSignal};

async fn harness_with_bot() -> Harness {
    init_tracing();
    let mut h = Harness::new(&ConfigFileBuilder::new().build());
    h.create_bot("echo", "print(1)\n").await;
    h
}

#[tokio::test]
async fn deleting_a_stopped_bot_removes_everything() {
    let mut h = harness_with_bot().await;

    h.text("/delete echo").await;

    assert!(!h.runtime.registry().contains("echo"));
    assert!(!h.fs.exists(Path::new("/bots/echo")));
    assert_eq!(h.last_text(), "🗑 Bot \"echo\" deleted.");
}

#[tokio::test]
async fn deleting_a_running_bot_terminates_it_first() {
    let mut h = harness_with_bot().await;
    let run = h.start("echo").await.unwrap();

    h.text("/delete echo").await;

    // Signal sent, files untouched until the exit is observed.
    assert_eq!(h.backend.signals(run), vec![StopSignal::Terminate]);
    assert!(h.runtime.registry().contains("echo"));
    assert!(h.fs.is_file(Path::new("/bots/echo/echo.py")));
    assert!(h.last_text().contains("deleted once it exits"));

    h.exit("echo", run, None, Some(15)).await;

    assert!(!h.runtime.registry().contains("echo"));
    assert!(!h.fs.exists(Path::new("/bots/echo")));
    assert_eq!(h.last_text(), "🗑 Bot \"echo\" deleted.");
}

#[tokio::test]
async fn deleting_during_install_cancels_it() {
    let mut h = harness_with_bot().await;

    h.text("/startbot echo").await;
    assert_eq!(
        h.runtime.registry().get("echo").unwrap().status(),
        ProjectStatus::Installing
    );
    h.text("/delete echo").await;

    assert!(!h.runtime.registry().contains("echo"));
    assert_eq!(h.backend.spawn_count(), 0);

    // A provisioning result that slipped through is dropped.
    h.handle(SupervisorEvent::ProvisionFinished {
        project: "echo".to_string(),
        ticket: 1,
        result: Ok(botvisor::provision::ProvisionReport {
            created_env: false,
            install: botvisor::provision::InstallOutcome::NoManifest,
        }),
    })
    .await;
    assert_eq!(h.backend.spawn_count(), 0);
}

#[tokio::test]
async fn deleting_an_unknown_bot_fails() {
    let mut h = harness_with_bot().await;

    h.text("/delete ghost").await;

    assert!(h.last_text().contains("not found"));
    assert!(h.runtime.registry().contains("echo"));
}

#[tokio::test]
async fn shutdown_stops_everything_then_ends_the_loop() {
    let mut h = harness_with_bot().await;
    h.create_bot("other", "print(2)\n").await;
    let first = h.start("echo").await.unwrap();
    let second = h.start("other").await.unwrap();

    let keep_running = h.handle(SupervisorEvent::ShutdownRequested).await;
    assert!(keep_running);
    assert_eq!(h.backend.signals(first), vec![StopSignal::Terminate]);
    assert_eq!(h.backend.signals(second), vec![StopSignal::Terminate]);

    h.text("/list").await;
    assert!(h.last_text().contains("Shutting down"));

    let before = h.transport.texts(CHAT).len();
    assert!(h.exit("echo", first, None, Some(15)).await);
    assert!(!h.exit("other", second, None, Some(15)).await);

    // No exit notices while shutting down.
    assert_eq!(h.transport.texts(CHAT).len(), before);
}

#[tokio::test]
async fn shutdown_with_nothing_running_ends_immediately() {
    let mut h = harness_with_bot().await;

    assert!(!h.handle(SupervisorEvent::ShutdownRequested).await);
}
