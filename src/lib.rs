// src/lib.rs

pub mod bridge;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod ingest;
pub mod logging;
pub mod provision;
pub mod registry;
pub mod store;
pub mod supervisor;
pub mod transport;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{load_or_default, ConfigFile};
use crate::engine::{Runtime, SupervisorEvent};
use crate::exec::RealProcessBackend;
use crate::fs::{FileSystem, RealFileSystem};
use crate::provision::RealToolRunner;
use crate::store::{ArtifactStore, DiscoveredProject};
use crate::transport::{spawn_console_reader, ConsoleTransport};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (plus the `--root` override)
/// - the artifact store and startup discovery
/// - the runtime with the real process backend and tool runner
/// - the console transport
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = load_or_default(&args.config)?;
    if let Some(root) = &args.root {
        cfg.storage.root = PathBuf::from(root);
    }
    // Tools run with the project directory as working directory, so every
    // path handed to them must be absolute.
    cfg.storage.root = std::path::absolute(&cfg.storage.root)
        .with_context(|| format!("resolving storage root {:?}", cfg.storage.root))?;

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let store = ArtifactStore::from_config(fs.clone(), &cfg)?;
    store.ensure_root()?;

    let discovered = if cfg.storage.discover_existing {
        store.discover()?
    } else {
        Vec::new()
    };

    if args.dry_run {
        print_dry_run(&cfg, &discovered);
        return Ok(());
    }

    // Runtime event channel.
    let (tx, rx) = mpsc::channel::<SupervisorEvent>(256);

    let backend = RealProcessBackend::new(tx.clone());
    let transport = ConsoleTransport::new();
    let mut runtime = Runtime::new(
        &cfg,
        fs,
        Arc::new(RealToolRunner),
        backend,
        transport,
        tx.clone(),
    )?;
    runtime.adopt(discovered);

    // Ctrl-C → graceful shutdown.
    {
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(SupervisorEvent::ShutdownRequested).await;
        });
    }

    let _reader = spawn_console_reader(args.chat, args.chat, tx);
    info!(root = ?cfg.storage.root, chat = args.chat, "console transport ready; type /help");

    runtime.run(rx).await?;
    Ok(())
}

/// Simple dry-run output: effective config and discovered projects.
fn print_dry_run(cfg: &ConfigFile, discovered: &[DiscoveredProject]) {
    println!("botvisor dry-run");
    println!("  storage.root = {}", cfg.storage.root.display());
    println!("  runtime.interpreter = {} {:?}", cfg.runtime.interpreter, cfg.runtime.interpreter_args);
    println!("  runtime.isolated_env = {}", cfg.runtime.isolated_env);
    println!("  bridge.prompt_pattern = {}", cfg.bridge.prompt_pattern);
    println!("  bridge.input_timeout = {:?}", cfg.input_timeout());
    println!("  logs.capacity = {}", cfg.logs.capacity);
    println!("  ingest.script_extension = {}", cfg.ingest.script_extension);
    println!();

    println!("projects ({}):", discovered.len());
    for project in discovered {
        println!("  - {} ({:?})", project.name, project.paths.kind);
        println!("      entry: {}", project.entry_point.display());
        println!("      manifest: {}", project.paths.manifest.display());
        println!("      env: {}", project.paths.env_dir.display());
    }

    debug!("dry-run complete (no execution)");
}
