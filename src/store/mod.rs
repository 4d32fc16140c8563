// src/store/mod.rs

//! Artifact store: where project files live on disk.
//!
//! - [`layout`] resolves consolidated and legacy project paths.
//! - [`names`] sanitises user-supplied project and file names.
//! - [`candidates`] enumerates entry-point candidates in a project tree.
//! - [`archive`] extracts uploaded zip archives.
//!
//! All access goes through a [`FileSystem`] so the store can be exercised
//! against [`crate::fs::mock::MockFileSystem`] in tests.

pub mod archive;
pub mod candidates;
pub mod layout;
pub mod names;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::fs::FileSystem;

pub use archive::extract_zip_bytes;
pub use candidates::{collect_candidates, CandidateMatcher};
pub use layout::{LayoutKind, ProjectPaths};
pub use names::{sanitize_file_name, sanitize_name};

/// A project found on disk at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredProject {
    pub name: String,
    pub paths: ProjectPaths,
    pub entry_point: PathBuf,
}

/// Filesystem layout of all managed projects under one root.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    manifest_name: String,
    env_dir_name: String,
    matcher: CandidateMatcher,
}

impl ArtifactStore {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
        manifest_name: &str,
        env_dir_name: &str,
        matcher: CandidateMatcher,
    ) -> Self {
        Self {
            fs,
            root: root.into(),
            manifest_name: manifest_name.to_string(),
            env_dir_name: env_dir_name.to_string(),
            matcher,
        }
    }

    pub fn from_config(fs: Arc<dyn FileSystem>, cfg: &ConfigFile) -> Result<Self> {
        let matcher = CandidateMatcher::new(&cfg.ingest.script_extension, &cfg.ingest.exclude)?;
        Ok(Self::new(
            fs,
            cfg.storage.root.clone(),
            &cfg.ingest.manifest_name,
            &cfg.runtime.env_dir_name,
            matcher,
        ))
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn script_extension(&self) -> &str {
        self.matcher.extension()
    }

    pub fn ensure_root(&self) -> Result<()> {
        self.fs.create_dir_all(&self.root)
    }

    pub fn consolidated_paths(&self, name: &str) -> ProjectPaths {
        ProjectPaths::consolidated(&self.root, name, &self.manifest_name, &self.env_dir_name)
    }

    pub fn legacy_paths(&self, name: &str) -> ProjectPaths {
        ProjectPaths::legacy(&self.root, name)
    }

    /// Whether `file_name` has the runnable script extension.
    pub fn is_script_name(&self, file_name: &str) -> bool {
        Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(self.matcher.extension()))
    }

    /// Write an uploaded or pasted script and return its path.
    ///
    /// Legacy projects keep their fixed `<name>.<ext>` entry; consolidated
    /// projects store the file under its (sanitised) upload name.
    pub fn write_script(
        &self,
        paths: &ProjectPaths,
        name: &str,
        file_name: &str,
        contents: &[u8],
    ) -> Result<PathBuf> {
        let target = match paths.kind {
            LayoutKind::Legacy => {
                ProjectPaths::legacy_entry(&self.root, name, self.matcher.extension())
            }
            LayoutKind::Consolidated => paths.dir.join(file_name),
        };
        self.fs.write(&target, contents)?;
        info!(project = %name, path = ?target, bytes = contents.len(), "wrote script");
        Ok(target)
    }

    pub fn write_manifest(&self, paths: &ProjectPaths, contents: &[u8]) -> Result<()> {
        self.fs.write(&paths.manifest, contents)?;
        debug!(path = ?paths.manifest, bytes = contents.len(), "wrote dependency manifest");
        Ok(())
    }

    /// Extract a zip upload into the project directory.
    pub fn extract_archive(&self, paths: &ProjectPaths, bytes: &[u8]) -> Result<usize> {
        extract_zip_bytes(self.fs.as_ref(), bytes, &paths.dir)
    }

    /// Entry-point candidates under the project directory, relative and sorted.
    pub fn entry_candidates(&self, paths: &ProjectPaths) -> Result<Vec<PathBuf>> {
        if !self.fs.is_dir(&paths.dir) {
            return Ok(Vec::new());
        }
        collect_candidates(self.fs.as_ref(), &paths.dir, &self.matcher)
    }

    /// Check that `rel` names a script inside the project tree.
    pub fn is_candidate_path(&self, rel: &Path) -> bool {
        if !archive::is_safe_relative_path(rel) {
            return false;
        }
        let rel_str = rel.to_string_lossy().replace('\\', "/");
        self.matcher.matches(&rel_str)
    }

    /// Delete everything a project owns.
    pub fn remove_project(&self, paths: &ProjectPaths, entry_point: &Path) -> Result<()> {
        match paths.kind {
            LayoutKind::Consolidated => {
                if self.fs.is_dir(&paths.dir) {
                    self.fs.remove_dir_all(&paths.dir)?;
                }
            }
            LayoutKind::Legacy => {
                for file in [entry_point, paths.manifest.as_path()] {
                    if self.fs.is_file(file) {
                        self.fs.remove_file(file)?;
                    }
                }
                if self.fs.is_dir(&paths.env_dir) {
                    self.fs.remove_dir_all(&paths.env_dir)?;
                }
            }
        }
        info!(dir = ?paths.dir, kind = ?paths.kind, "removed project files");
        Ok(())
    }

    /// Remove a consolidated directory left behind by a failed ingestion.
    pub fn discard_dir(&self, paths: &ProjectPaths) -> Result<()> {
        if paths.kind == LayoutKind::Consolidated && self.fs.is_dir(&paths.dir) {
            self.fs.remove_dir_all(&paths.dir)?;
        }
        Ok(())
    }

    /// Find projects already present under the root.
    ///
    /// - `<name>.<ext>` files are legacy projects.
    /// - Directories are consolidated projects when their entry is
    ///   unambiguous: a single candidate, `main.<ext>` or `<name>.<ext>`.
    pub fn discover(&self) -> Result<Vec<DiscoveredProject>> {
        if !self.fs.is_dir(&self.root) {
            return Ok(Vec::new());
        }

        let ext = self.matcher.extension().to_string();
        let mut found = Vec::new();

        for path in self.fs.read_dir(&self.root)? {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if file_name.starts_with('.') {
                continue;
            }

            if self.fs.is_file(&path) {
                let Some(stem) = file_name.strip_suffix(&format!(".{ext}")) else {
                    continue;
                };
                if sanitize_name(stem).as_deref() != Some(stem) {
                    warn!(file = %file_name, "skipping legacy script with unsupported name");
                    continue;
                }
                found.push(DiscoveredProject {
                    name: stem.to_string(),
                    paths: self.legacy_paths(stem),
                    entry_point: path.clone(),
                });
            } else if self.fs.is_dir(&path) {
                if file_name.ends_with("_venv") || sanitize_name(file_name).as_deref() != Some(file_name) {
                    continue;
                }
                let paths = self.consolidated_paths(file_name);
                let candidates = self.entry_candidates(&paths)?;
                let preferred = [
                    PathBuf::from(format!("main.{ext}")),
                    PathBuf::from(format!("{file_name}.{ext}")),
                ];
                let entry = match candidates.as_slice() {
                    [only] => Some(only.clone()),
                    _ => preferred.into_iter().find(|p| candidates.contains(p)),
                };
                match entry {
                    Some(rel) => found.push(DiscoveredProject {
                        name: file_name.to_string(),
                        entry_point: paths.dir.join(rel),
                        paths,
                    }),
                    None => warn!(
                        dir = %file_name,
                        candidates = candidates.len(),
                        "skipping project directory without an unambiguous entry point"
                    ),
                }
            }
        }

        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }
}
