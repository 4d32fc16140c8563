// src/store/candidates.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::fs::FileSystem;

/// Decides which files in a project tree are entry-point candidates.
#[derive(Clone)]
pub struct CandidateMatcher {
    extension: String,
    include: GlobSet,
    exclude: GlobSet,
}

impl fmt::Debug for CandidateMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CandidateMatcher")
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

impl CandidateMatcher {
    pub fn new(extension: &str, exclude: &[String]) -> Result<Self> {
        let include = build_globset(&[format!("**/*.{extension}")])?;
        let exclude = build_globset(exclude)?;
        Ok(Self {
            extension: extension.to_string(),
            include,
            exclude,
        })
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// `rel_path` uses `/` separators and is relative to the project dir.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.include.is_match(rel_path) && !self.exclude.is_match(rel_path)
    }

    /// A directory is skipped when any file directly inside it would be
    /// excluded (e.g. `.venv/**`).
    fn skips_dir(&self, rel_dir: &str) -> bool {
        self.exclude.is_match(format!("{rel_dir}/_"))
    }
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Collect every candidate script under `root`, returned relative to `root`
/// and sorted.
pub fn collect_candidates(
    fs: &dyn FileSystem,
    root: &Path,
    matcher: &CandidateMatcher,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            if fs.is_dir(&path) {
                if !matcher.skips_dir(&rel_str) {
                    stack.push(path);
                }
            } else if fs.is_file(&path) && matcher.matches(&rel_str) {
                files.push(rel.to_path_buf());
            }
        }
    }

    files.sort();
    Ok(files)
}
