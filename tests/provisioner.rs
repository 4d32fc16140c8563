// tests/provisioner.rs

mod common;
use crate::common::builders::ConfigFileBuilder;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;

use botvisor::errors::{BotvisorError, ProvisionStage};
use botvisor::fs::mock::MockFileSystem;
use botvisor::fs::FileSystem;
use botvisor::provision::stamp::stamp_path;
use botvisor::provision::{InstallOutcome, LogSink, Provisioner};
use botvisor::registry::LogEntry;
use botvisor::store::ProjectPaths;
use botvisor::types::LogStream;
use botvisor_test_utils::fake_tools::RecordingToolRunner;

struct Setup {
    fs: MockFileSystem,
    tools: RecordingToolRunner,
    provisioner: Provisioner,
    paths: ProjectPaths,
}

fn setup(isolated: bool) -> Setup {
    let cfg = ConfigFileBuilder::new().isolated_env(isolated).build();
    let fs = MockFileSystem::new();
    fs.add_file("/bots/echo/echo.py", "print(input())");
    let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());
    let tools = RecordingToolRunner::new().with_fs(shared.clone());
    let provisioner = Provisioner::new(shared, Arc::new(tools.clone()), &cfg);
    let paths = ProjectPaths::consolidated(Path::new("/bots"), "echo", "requirements.txt", ".venv");
    Setup {
        fs,
        tools,
        provisioner,
        paths,
    }
}

fn sink() -> (LogSink, mpsc::UnboundedReceiver<LogEntry>) {
    mpsc::unbounded_channel()
}

#[tokio::test]
async fn missing_manifest_creates_env_but_never_installs() {
    let s = setup(true);
    let (tx, _rx) = sink();

    let report = s.provisioner.ensure("echo", &s.paths, tx).await.unwrap();

    assert!(report.created_env);
    assert_eq!(report.install, InstallOutcome::NoManifest);
    assert_eq!(s.tools.venv_count(), 1);
    assert_eq!(s.tools.install_count(), 0);
    assert!(s.fs.is_dir(&s.paths.env_dir));
}

#[tokio::test]
async fn blank_manifest_skips_install() {
    let s = setup(true);
    s.fs.add_file(&s.paths.manifest, "  \n\n");
    let (tx, _rx) = sink();

    let report = s.provisioner.ensure("echo", &s.paths, tx).await.unwrap();

    assert_eq!(report.install, InstallOutcome::NoManifest);
    assert_eq!(s.tools.install_count(), 0);
}

#[tokio::test]
async fn unchanged_manifest_installs_once() {
    let s = setup(true);
    s.fs.add_file(&s.paths.manifest, "requests==2.32.3\n");

    let (tx, _rx) = sink();
    let first = s.provisioner.ensure("echo", &s.paths, tx).await.unwrap();
    assert!(first.created_env);
    assert_eq!(first.install, InstallOutcome::Installed);
    assert!(s.fs.is_file(&stamp_path(&s.paths.env_dir)));

    let (tx, _rx) = sink();
    let second = s.provisioner.ensure("echo", &s.paths, tx).await.unwrap();
    assert!(!second.created_env);
    assert_eq!(second.install, InstallOutcome::UpToDate);

    assert_eq!(s.tools.venv_count(), 1);
    assert_eq!(s.tools.install_count(), 1);
}

#[tokio::test]
async fn changed_manifest_reinstalls() {
    let s = setup(true);
    s.fs.add_file(&s.paths.manifest, "requests\n");
    let (tx, _rx) = sink();
    s.provisioner.ensure("echo", &s.paths, tx).await.unwrap();

    s.fs.add_file(&s.paths.manifest, "requests\nrich\n");
    let (tx, _rx) = sink();
    let report = s.provisioner.ensure("echo", &s.paths, tx).await.unwrap();

    assert_eq!(report.install, InstallOutcome::Installed);
    assert_eq!(s.tools.install_count(), 2);
}

#[tokio::test]
async fn install_runs_with_the_environment_interpreter() {
    let s = setup(true);
    s.fs.add_file(&s.paths.manifest, "requests\n");
    let (tx, _rx) = sink();
    s.provisioner.ensure("echo", &s.paths, tx).await.unwrap();

    let install = s
        .tools
        .calls()
        .into_iter()
        .find(|c| c.args.iter().any(|a| a == "pip"))
        .unwrap();
    assert_eq!(install.program, PathBuf::from("/bots/echo/.venv/bin/python"));
    assert_eq!(install.cwd, PathBuf::from("/bots/echo"));
    assert_eq!(
        install.args,
        vec!["-m", "pip", "install", "-r", "/bots/echo/requirements.txt"]
    );
}

#[tokio::test]
async fn installer_failure_carries_a_diagnostic() {
    let s = setup(true);
    s.fs.add_file(&s.paths.manifest, "no-such-package\n");
    s.tools.fail_when(
        "pip",
        1,
        "ERROR: No matching distribution found for no-such-package",
    );
    let (tx, _rx) = sink();

    let err = s.provisioner.ensure("echo", &s.paths, tx).await.unwrap_err();

    match err {
        BotvisorError::ProvisionFailure {
            stage,
            code,
            diagnostic,
        } => {
            assert_eq!(stage, ProvisionStage::InstallDependencies);
            assert_eq!(code, Some(1));
            assert!(diagnostic.contains("No matching distribution"), "{diagnostic}");
        }
        other => panic!("expected ProvisionFailure, got {other:?}"),
    }
    assert!(!s.fs.exists(&stamp_path(&s.paths.env_dir)));
}

#[tokio::test]
async fn silent_failure_says_so() {
    let s = setup(true);
    s.tools.fail_when("venv", 2, "");
    let (tx, _rx) = sink();

    let err = s.provisioner.ensure("echo", &s.paths, tx).await.unwrap_err();

    match err {
        BotvisorError::ProvisionFailure {
            stage, diagnostic, ..
        } => {
            assert_eq!(stage, ProvisionStage::CreateEnvironment);
            assert_eq!(diagnostic, "no diagnostic output");
        }
        other => panic!("expected ProvisionFailure, got {other:?}"),
    }
}

#[tokio::test]
async fn tool_output_reaches_the_sink() {
    let s = setup(true);
    s.tools.emit("Collecting requests");
    s.fs.add_file(&s.paths.manifest, "requests\n");
    let (tx, mut rx) = sink();

    s.provisioner.ensure("echo", &s.paths, tx).await.unwrap();

    let mut lines = Vec::new();
    while let Some(entry) = rx.recv().await {
        assert_eq!(entry.stream, LogStream::Install);
        lines.push(entry.text);
    }
    // Once for venv creation, once for the install.
    assert_eq!(lines, vec!["Collecting requests", "Collecting requests"]);
}

#[tokio::test]
async fn shared_interpreter_mode_never_creates_environments() {
    let s = setup(false);
    s.fs.add_file(&s.paths.manifest, "requests\n");

    for _ in 0..2 {
        let (tx, _rx) = sink();
        let report = s.provisioner.ensure("echo", &s.paths, tx).await.unwrap();
        assert!(!report.created_env);
        assert_eq!(report.install, InstallOutcome::Installed);
    }

    assert_eq!(s.tools.venv_count(), 0);
    assert_eq!(s.tools.install_count(), 2);
    let command = s
        .provisioner
        .run_command(&s.paths, Path::new("/bots/echo/echo.py"));
    assert_eq!(command.program, PathBuf::from("python3"));
    assert_eq!(command.args, vec!["-u", "/bots/echo/echo.py"]);
}
