// src/provision/mod.rs

//! Environment provisioner.
//!
//! `ensure` brings a project's runtime environment up to date:
//!
//! 1. create the isolated environment if its directory is missing,
//! 2. skip installation when the manifest is absent, empty, or unchanged
//!    since the last successful install,
//! 3. otherwise run the installer against the manifest.
//!
//! Tool output is streamed to a [`LogSink`] as it is produced. Each step is
//! attempted once; failures are returned as `ProvisionFailure` and never
//! retried here.

pub mod stamp;
pub mod tool;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

pub use tool::{LogSink, RealToolRunner, ToolExit, ToolInvocation, ToolRunner};

use crate::config::ConfigFile;
use crate::errors::{BotvisorError, ProvisionStage, Result};
use crate::fs::FileSystem;
use crate::store::ProjectPaths;
use crate::supervisor::outcome::truncate_tail;

/// What `ensure` did for the dependency manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Manifest absent or empty.
    NoManifest,
    /// Manifest unchanged since the last install.
    UpToDate,
    Installed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionReport {
    pub created_env: bool,
    pub install: InstallOutcome,
}

/// Command line that runs a project's entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Provisioner {
    fs: Arc<dyn FileSystem>,
    tools: Arc<dyn ToolRunner>,
    interpreter: String,
    interpreter_args: Vec<String>,
    isolated_env: bool,
    diagnostic_chars: usize,
}

impl Provisioner {
    pub fn new(fs: Arc<dyn FileSystem>, tools: Arc<dyn ToolRunner>, cfg: &ConfigFile) -> Self {
        Self {
            fs,
            tools,
            interpreter: cfg.runtime.interpreter.clone(),
            interpreter_args: cfg.runtime.interpreter_args.clone(),
            isolated_env: cfg.runtime.isolated_env,
            diagnostic_chars: cfg.logs.diagnostic_chars,
        }
    }

    /// Make the environment for `paths` ready to run.
    ///
    /// `sink` is consumed so that it closes when provisioning ends.
    pub async fn ensure(&self, project: &str, paths: &ProjectPaths, sink: LogSink) -> Result<ProvisionReport> {
        let created_env = if self.isolated_env && !self.fs.is_dir(&paths.env_dir) {
            self.create_environment(project, paths, &sink).await?;
            true
        } else {
            false
        };

        let manifest = match self.fs.file_len(&paths.manifest) {
            Some(len) if len > 0 => self.fs.read(&paths.manifest)?,
            _ => {
                info!(project, "no dependency manifest; skipping install");
                return Ok(ProvisionReport {
                    created_env,
                    install: InstallOutcome::NoManifest,
                });
            }
        };
        if manifest.iter().all(u8::is_ascii_whitespace) {
            info!(project, "dependency manifest is blank; skipping install");
            return Ok(ProvisionReport {
                created_env,
                install: InstallOutcome::NoManifest,
            });
        }

        if self.isolated_env && stamp::is_current(self.fs.as_ref(), &paths.env_dir, &manifest) {
            info!(project, "dependencies unchanged since last install");
            return Ok(ProvisionReport {
                created_env,
                install: InstallOutcome::UpToDate,
            });
        }

        self.install(project, paths, &sink).await?;

        if self.isolated_env {
            if let Err(e) = stamp::write_stamp(self.fs.as_ref(), &paths.env_dir, &manifest) {
                warn!(project, error = %e, "failed to record manifest stamp");
            }
        }

        Ok(ProvisionReport {
            created_env,
            install: InstallOutcome::Installed,
        })
    }

    async fn create_environment(&self, project: &str, paths: &ProjectPaths, sink: &LogSink) -> Result<()> {
        info!(project, env = ?paths.env_dir, "creating runtime environment");
        let invocation = ToolInvocation {
            program: PathBuf::from(&self.interpreter),
            args: vec![
                "-m".to_string(),
                "venv".to_string(),
                paths.env_dir.to_string_lossy().into_owned(),
            ],
            cwd: paths.dir.clone(),
        };
        self.run_step(ProvisionStage::CreateEnvironment, &invocation, sink).await
    }

    async fn install(&self, project: &str, paths: &ProjectPaths, sink: &LogSink) -> Result<()> {
        info!(project, manifest = ?paths.manifest, "installing dependencies");
        let invocation = ToolInvocation {
            program: self.interpreter_for(paths),
            args: vec![
                "-m".to_string(),
                "pip".to_string(),
                "install".to_string(),
                "-r".to_string(),
                paths.manifest.to_string_lossy().into_owned(),
            ],
            cwd: paths.dir.clone(),
        };
        self.run_step(ProvisionStage::InstallDependencies, &invocation, sink).await
    }

    async fn run_step(
        &self,
        stage: ProvisionStage,
        invocation: &ToolInvocation,
        sink: &LogSink,
    ) -> Result<()> {
        let exit = self.tools.run(invocation, sink).await.map_err(|e| {
            BotvisorError::ProvisionFailure {
                stage,
                code: None,
                diagnostic: truncate_tail(&e.to_string(), self.diagnostic_chars),
            }
        })?;

        if exit.success() {
            return Ok(());
        }

        warn!(%stage, code = ?exit.code, "provisioning step failed");
        let diagnostic = match exit.stderr.trim() {
            "" => "no diagnostic output".to_string(),
            text => truncate_tail(text, self.diagnostic_chars),
        };
        Err(BotvisorError::ProvisionFailure {
            stage,
            code: exit.code,
            diagnostic,
        })
    }

    /// Interpreter used for installs and runs of this project.
    pub fn interpreter_for(&self, paths: &ProjectPaths) -> PathBuf {
        if self.isolated_env {
            env_interpreter(&paths.env_dir)
        } else {
            PathBuf::from(&self.interpreter)
        }
    }

    /// Command that runs `entry_point`.
    pub fn run_command(&self, paths: &ProjectPaths, entry_point: &Path) -> RunCommand {
        let mut args = self.interpreter_args.clone();
        args.push(entry_point.to_string_lossy().into_owned());
        RunCommand {
            program: self.interpreter_for(paths),
            args,
        }
    }
}

/// Interpreter inside an isolated environment.
pub fn env_interpreter(env_dir: &Path) -> PathBuf {
    if cfg!(windows) {
        env_dir.join("Scripts").join("python.exe")
    } else {
        env_dir.join("bin").join("python")
    }
}
