// tests/ingestion_flow.rs

mod common;
use crate::common::builders::ConfigFileBuilder;
use crate::common::{init_tracing, zip_bytes, Harness, CHAT, USER};

use std::path::{Path, PathBuf};

use botvisor::fs::mock::MockFileSystem;
use botvisor::fs::FileSystem;
use botvisor::ingest::ConversationState;
use botvisor::store::LayoutKind;
use botvisor::types::ProjectStatus;

fn harness() -> Harness {
    init_tracing();
    Harness::new(&ConfigFileBuilder::new().build())
}

fn entry_of(h: &Harness, name: &str) -> PathBuf {
    h.runtime
        .registry()
        .get(name)
        .unwrap()
        .entry_point()
        .to_path_buf()
}

/// A harness with one adopted legacy bot, `old`.
fn legacy_harness() -> Harness {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("/bots/old.py", "print('old')\n");
    fs.add_file("/bots/old_requirements.txt", "requests\n");
    let mut h = Harness::with_fs(&ConfigFileBuilder::new().build(), fs);
    let found = h.runtime.supervisor().store().discover().unwrap();
    h.runtime.adopt(found);
    h
}

fn read(h: &Harness, path: &str) -> String {
    h.fs.read_to_string(Path::new(path)).unwrap()
}

#[tokio::test]
async fn pasted_parts_are_joined_in_order() {
    let mut h = harness();

    h.text("/new echo").await;
    assert_eq!(h.transport.last_choices(CHAT), vec!["method:file", "method:paste", "method:zip"]);
    h.choice("method:paste").await;
    h.text("a").await;
    h.text("b").await;
    h.text("c").await;
    h.text("/done").await;

    assert_eq!(read(&h, "/bots/echo/main.py"), "a\nb\nc\n");
    assert_eq!(entry_of(&h, "echo"), PathBuf::from("/bots/echo/main.py"));
    assert!(h.runtime.conversations().get(USER).is_none());
    assert!(h.last_text().contains("saved"));
}

#[tokio::test]
async fn empty_paste_is_refused() {
    let mut h = harness();

    h.text("/new echo").await;
    h.choice("method:paste").await;
    h.text("/done").await;

    assert!(h.last_text().contains("Nothing was pasted"));
    assert!(!h.runtime.registry().contains("echo"));
    assert!(h.runtime.conversations().get(USER).is_none());
}

#[tokio::test]
async fn file_upload_keeps_its_name() {
    let mut h = harness();

    h.text("/new calc").await;
    h.text("file").await;
    h.document("notes.txt", b"hello".to_vec()).await;
    assert!(h.last_text().contains("is not a .py file"));
    assert!(matches!(
        h.runtime.conversations().get(USER),
        Some(ConversationState::AwaitingFile { .. })
    ));

    h.document("my calc.py", b"print(1 + 1)\n".to_vec()).await;

    assert_eq!(entry_of(&h, "calc"), PathBuf::from("/bots/calc/my_calc.py"));
    assert_eq!(read(&h, "/bots/calc/my_calc.py"), "print(1 + 1)\n");
}

#[tokio::test]
async fn upload_names_the_bot_after_the_file() {
    let mut h = harness();

    h.text("/upload").await;
    h.document("weather bot.py", b"print('sunny')\n".to_vec()).await;

    assert_eq!(
        entry_of(&h, "weather_bot"),
        PathBuf::from("/bots/weather_bot/weather_bot.py")
    );
}

#[tokio::test]
async fn unsolicited_script_creates_a_bot() {
    let mut h = harness();

    h.document("hello.py", b"print('hi')\n".to_vec()).await;

    assert!(h.runtime.registry().contains("hello"));
}

#[tokio::test]
async fn uploading_over_a_running_bot_is_refused() {
    let mut h = harness();
    h.create_bot("echo", "print(1)\n").await;
    h.start("echo").await.unwrap();

    h.text("/upload").await;
    h.document("echo.py", b"print('new')\n".to_vec()).await;

    assert!(h.last_text().contains("already exists. Use /edit echo"), "{}", h.last_text());
    assert_eq!(read(&h, "/bots/echo/echo.py"), "print(1)\n");
    assert_eq!(
        h.runtime.registry().get("echo").unwrap().status(),
        ProjectStatus::Running
    );
    assert!(h.runtime.conversations().get(USER).is_none());
}

#[tokio::test]
async fn unsolicited_script_for_an_existing_bot_is_refused() {
    let mut h = legacy_harness();

    h.document("old.py", b"print('new')\n".to_vec()).await;

    assert!(h.last_text().contains("already exists"), "{}", h.last_text());
    assert_eq!(read(&h, "/bots/old.py"), "print('old')\n");
    assert!(!h.fs.exists(Path::new("/bots/old")));
}

#[tokio::test]
async fn unsolicited_other_files_are_refused() {
    let mut h = harness();

    h.document("report.pdf", b"%PDF".to_vec()).await;

    assert!(h.last_text().contains("Unsupported file"));
    assert!(h.runtime.registry().is_empty());
    assert!(h.runtime.conversations().get(USER).is_none());
}

#[tokio::test]
async fn zip_with_several_scripts_asks_for_the_entry_point() {
    let mut h = harness();
    let archive = zip_bytes(&[("a.py", "print('a')"), ("b.py", "print('b')"), ("README.md", "")]);

    h.text("/new multi").await;
    h.choice("method:zip").await;
    h.document("multi.zip", archive).await;

    assert_eq!(h.transport.last_choices(CHAT), vec!["entry:a.py", "entry:b.py"]);
    assert!(!h.runtime.registry().contains("multi"));

    h.choice("entry:../a.py").await;
    assert!(h.last_text().contains("is not a .py script inside the project"));
    h.choice("entry:c.py").await;
    assert!(h.last_text().contains("is not one of the candidates"));
    assert!(matches!(
        h.runtime.conversations().get(USER),
        Some(ConversationState::AwaitingEntrySelection { .. })
    ));

    h.choice("entry:b.py").await;

    assert_eq!(entry_of(&h, "multi"), PathBuf::from("/bots/multi/b.py"));
    assert!(h.runtime.conversations().get(USER).is_none());
}

#[tokio::test]
async fn entry_point_can_be_picked_by_number() {
    let mut h = harness();
    let archive = zip_bytes(&[("src/app.py", ""), ("src/util.py", "")]);

    h.text("/new numbered").await;
    h.choice("method:zip").await;
    h.document("numbered.zip", archive).await;
    h.text("2").await;

    assert_eq!(
        entry_of(&h, "numbered"),
        PathBuf::from("/bots/numbered/src/util.py")
    );
}

#[tokio::test]
async fn zip_with_one_script_completes_immediately() {
    let mut h = harness();
    let archive = zip_bytes(&[("bot/run.py", "print('run')"), ("bot/data.json", "{}")]);

    h.document("solo.zip", archive).await;

    assert_eq!(entry_of(&h, "solo"), PathBuf::from("/bots/solo/bot/run.py"));
}

#[tokio::test]
async fn zip_without_scripts_is_discarded() {
    let mut h = harness();
    let archive = zip_bytes(&[("README.md", "# nothing")]);

    h.document("empty.zip", archive).await;

    assert!(h.last_text().contains("No .py files found"));
    assert!(!h.runtime.registry().contains("empty"));
    assert!(!h.fs.exists(Path::new("/bots/empty")));
}

#[tokio::test]
async fn unreadable_extraction_is_discarded() {
    let mut h = harness();
    h.fs.fail_read_dir("/bots/broken");

    h.document("broken.zip", zip_bytes(&[("main.py", "print(1)")])).await;

    assert!(h.last_text().starts_with("❌"), "{}", h.last_text());
    assert!(!h.runtime.registry().contains("broken"));
    assert!(!h.fs.exists(Path::new("/bots/broken")));
    assert!(h.runtime.conversations().get(USER).is_none());
}

#[tokio::test]
async fn unsolicited_zip_for_an_existing_bot_is_refused() {
    let mut h = harness();
    h.create_bot("echo", "print(1)\n").await;

    h.document("echo.zip", zip_bytes(&[("main.py", "")])).await;

    assert!(h.last_text().contains("already exists"));
    assert_eq!(entry_of(&h, "echo"), PathBuf::from("/bots/echo/echo.py"));
}

#[tokio::test]
async fn requirements_can_be_pasted() {
    let mut h = harness();
    h.create_bot("echo", "print(1)\n").await;

    h.text("/uploadreq echo").await;
    h.text("requests==2.32.3\nrich\n\n").await;

    assert_eq!(read(&h, "/bots/echo/requirements.txt"), "requests==2.32.3\nrich\n");
    assert!(h.last_text().contains("Requirements saved"));

    h.start("echo").await.unwrap();
    assert_eq!(h.tools.install_count(), 1);
}

#[tokio::test]
async fn requirements_can_be_uploaded() {
    let mut h = harness();
    h.create_bot("echo", "print(1)\n").await;

    h.text("/req echo").await;
    h.document("requirements.py", b"x".to_vec()).await;
    assert!(h.last_text().contains("is not a .txt file"));
    h.document("reqs.txt", b"flask\n".to_vec()).await;

    assert_eq!(read(&h, "/bots/echo/requirements.txt"), "flask\n");
}

#[tokio::test]
async fn cancel_drops_the_flow() {
    let mut h = harness();

    h.text("/new echo").await;
    h.text("/cancel").await;

    assert_eq!(h.last_text(), "Cancelled.");
    assert!(h.runtime.conversations().get(USER).is_none());

    h.text("/cancel").await;
    assert_eq!(h.last_text(), "Nothing to cancel.");
}

#[tokio::test]
async fn cancelling_an_entry_selection_removes_the_extracted_files() {
    let mut h = harness();
    let archive = zip_bytes(&[("a.py", ""), ("b.py", "")]);

    h.text("/new multi").await;
    h.choice("method:zip").await;
    h.document("multi.zip", archive).await;
    assert!(h.fs.exists(Path::new("/bots/multi/a.py")));

    h.text("/cancel").await;

    assert_eq!(h.last_text(), "Cancelled.");
    assert!(!h.fs.exists(Path::new("/bots/multi")));
}

#[tokio::test]
async fn another_command_abandons_a_paste() {
    let mut h = harness();

    h.text("/new echo").await;
    h.choice("method:paste").await;
    h.text("print(1)").await;
    h.text("/list").await;

    assert!(h.runtime.conversations().get(USER).is_none());
    assert!(!h.runtime.registry().contains("echo"));
}

#[tokio::test]
async fn new_refuses_existing_names() {
    let mut h = harness();
    h.create_bot("echo", "print(1)\n").await;

    h.text("/new echo").await;

    assert!(h.last_text().contains("already exists"));
    assert!(h.runtime.conversations().get(USER).is_none());
}

#[tokio::test]
async fn edit_requires_a_stopped_bot() {
    let mut h = harness();
    h.create_bot("echo", "print(1)\n").await;
    h.start("echo").await.unwrap();

    h.text("/edit echo").await;

    assert!(h.last_text().contains("is running"));
    assert!(h.runtime.conversations().get(USER).is_none());
}

#[tokio::test]
async fn edit_replaces_the_code() {
    let mut h = harness();
    h.create_bot("echo", "print(1)\n").await;

    h.text("/edit echo").await;
    h.choice("method:paste").await;
    h.text("print(2)").await;
    h.text("/done").await;

    assert_eq!(entry_of(&h, "echo"), PathBuf::from("/bots/echo/main.py"));
    assert_eq!(read(&h, "/bots/echo/main.py"), "print(2)\n");
    assert_eq!(h.runtime.registry().len(), 1);
}

#[tokio::test]
async fn editing_a_legacy_bot_moves_it_to_its_own_directory() {
    let mut h = legacy_harness();
    assert_eq!(
        h.runtime.registry().get("old").unwrap().paths().kind,
        LayoutKind::Legacy
    );

    h.text("/edit old").await;
    h.choice("method:paste").await;
    h.text("print('new')").await;
    h.text("/done").await;

    let project = h.runtime.registry().get("old").unwrap();
    assert_eq!(project.paths().kind, LayoutKind::Consolidated);
    assert_eq!(project.entry_point(), Path::new("/bots/old/main.py"));
    assert_eq!(read(&h, "/bots/old/requirements.txt"), "requests\n");
    assert!(!h.fs.exists(Path::new("/bots/old.py")));
    assert!(!h.fs.exists(Path::new("/bots/old_requirements.txt")));
}
