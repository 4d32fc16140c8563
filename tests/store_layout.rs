// tests/store_layout.rs

mod common;
use crate::common::builders::ConfigFileBuilder;
use crate::common::zip_bytes;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use botvisor::fs::mock::MockFileSystem;
use botvisor::fs::FileSystem;
use botvisor::store::{sanitize_file_name, sanitize_name, ArtifactStore, LayoutKind};

fn store_with(fs: &MockFileSystem) -> ArtifactStore {
    let cfg = ConfigFileBuilder::new().build();
    ArtifactStore::from_config(Arc::new(fs.clone()), &cfg).unwrap()
}

#[test]
fn names_are_sanitised() {
    assert_eq!(sanitize_name("my bot").as_deref(), Some("my_bot"));
    assert_eq!(sanitize_name("  echo-2 ").as_deref(), Some("echo-2"));
    assert_eq!(sanitize_name("../../etc").as_deref(), Some("etc"));
    assert_eq!(sanitize_name("///"), None);
    assert_eq!(sanitize_name(""), None);

    assert_eq!(sanitize_file_name("my bot.py").as_deref(), Some("my_bot.py"));
    assert_eq!(sanitize_file_name("dir/sub/run.py").as_deref(), Some("run.py"));
    assert_eq!(sanitize_file_name("noext").as_deref(), Some("noext"));
}

#[test]
fn consolidated_and_legacy_paths() {
    let fs = MockFileSystem::new();
    let store = store_with(&fs);

    let paths = store.consolidated_paths("echo");
    assert_eq!(paths.kind, LayoutKind::Consolidated);
    assert_eq!(paths.dir, PathBuf::from("/bots/echo"));
    assert_eq!(paths.manifest, PathBuf::from("/bots/echo/requirements.txt"));
    assert_eq!(paths.env_dir, PathBuf::from("/bots/echo/.venv"));

    let legacy = store.legacy_paths("old");
    assert_eq!(legacy.kind, LayoutKind::Legacy);
    assert_eq!(legacy.dir, PathBuf::from("/bots"));
    assert_eq!(legacy.manifest, PathBuf::from("/bots/old_requirements.txt"));
    assert_eq!(legacy.env_dir, PathBuf::from("/bots/old_venv"));
}

#[test]
fn candidates_skip_environment_and_caches() {
    let fs = MockFileSystem::new();
    fs.add_file("/bots/app/main.py", "print(1)");
    fs.add_file("/bots/app/lib/util.py", "x = 1");
    fs.add_file("/bots/app/README.md", "# app");
    fs.add_file("/bots/app/.venv/lib/site.py", "");
    fs.add_file("/bots/app/lib/__pycache__/util.py", "");

    let store = store_with(&fs);
    let candidates = store
        .entry_candidates(&store.consolidated_paths("app"))
        .unwrap();

    assert_eq!(
        candidates,
        vec![PathBuf::from("lib/util.py"), PathBuf::from("main.py")]
    );
}

#[test]
fn candidate_paths_must_stay_inside_the_project() {
    let fs = MockFileSystem::new();
    let store = store_with(&fs);

    assert!(store.is_candidate_path(Path::new("main.py")));
    assert!(store.is_candidate_path(Path::new("src/run.py")));
    assert!(!store.is_candidate_path(Path::new("../other/main.py")));
    assert!(!store.is_candidate_path(Path::new("/etc/main.py")));
    assert!(!store.is_candidate_path(Path::new("notes.txt")));
    assert!(!store.is_candidate_path(Path::new(".venv/bin/activate.py")));
}

#[test]
fn zip_extraction_skips_escaping_entries() {
    let fs = MockFileSystem::new();
    let store = store_with(&fs);
    let paths = store.consolidated_paths("zipped");

    let bytes = zip_bytes(&[
        ("bot.py", "print('hi')"),
        ("pkg/helpers.py", "x = 1"),
        ("../escape.py", "bad"),
    ]);
    let written = store.extract_archive(&paths, &bytes).unwrap();

    assert_eq!(written, 2);
    assert!(fs.is_file(Path::new("/bots/zipped/bot.py")));
    assert!(fs.is_file(Path::new("/bots/zipped/pkg/helpers.py")));
    assert!(!fs.exists(Path::new("/bots/escape.py")));
}

#[test]
fn extracting_garbage_fails() {
    let fs = MockFileSystem::new();
    let store = store_with(&fs);
    let paths = store.consolidated_paths("broken");
    assert!(store.extract_archive(&paths, b"not a zip").is_err());
}

#[test]
fn discover_finds_both_layouts() {
    let fs = MockFileSystem::new();
    fs.add_file("/bots/legacy.py", "print(1)");
    fs.add_file("/bots/legacy_requirements.txt", "requests\n");
    fs.add_dir("/bots/legacy_venv");
    fs.add_file("/bots/single/bot.py", "print(2)");
    fs.add_file("/bots/multi/main.py", "print(3)");
    fs.add_file("/bots/multi/tools.py", "");
    fs.add_file("/bots/ambiguous/a.py", "");
    fs.add_file("/bots/ambiguous/b.py", "");
    fs.add_file("/bots/notes.txt", "");

    let store = store_with(&fs);
    let found = store.discover().unwrap();
    let summary: Vec<(&str, LayoutKind, PathBuf)> = found
        .iter()
        .map(|p| (p.name.as_str(), p.paths.kind, p.entry_point.clone()))
        .collect();

    assert_eq!(
        summary,
        vec![
            ("legacy", LayoutKind::Legacy, PathBuf::from("/bots/legacy.py")),
            ("multi", LayoutKind::Consolidated, PathBuf::from("/bots/multi/main.py")),
            ("single", LayoutKind::Consolidated, PathBuf::from("/bots/single/bot.py")),
        ]
    );
}

#[test]
fn removing_a_legacy_project_leaves_the_root() {
    let fs = MockFileSystem::new();
    fs.add_file("/bots/old.py", "print(1)");
    fs.add_file("/bots/old_requirements.txt", "requests\n");
    fs.add_file("/bots/old_venv/bin/python", "");
    fs.add_file("/bots/other.py", "print(2)");

    let store = store_with(&fs);
    let paths = store.legacy_paths("old");
    store
        .remove_project(&paths, Path::new("/bots/old.py"))
        .unwrap();

    assert!(!fs.exists(Path::new("/bots/old.py")));
    assert!(!fs.exists(Path::new("/bots/old_requirements.txt")));
    assert!(!fs.exists(Path::new("/bots/old_venv")));
    assert!(fs.is_file(Path::new("/bots/other.py")));
    assert!(fs.is_dir(Path::new("/bots")));
}

#[test]
fn removing_a_consolidated_project_drops_its_directory() {
    let fs = MockFileSystem::new();
    fs.add_file("/bots/app/main.py", "print(1)");
    fs.add_file("/bots/app/.venv/bin/python", "");

    let store = store_with(&fs);
    let paths = store.consolidated_paths("app");
    store
        .remove_project(&paths, Path::new("/bots/app/main.py"))
        .unwrap();

    assert!(fs.file_paths().is_empty());
    assert!(!fs.exists(Path::new("/bots/app")));
}
