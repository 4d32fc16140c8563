// src/store/layout.rs

//! On-disk layouts of a managed project.
//!
//! Two layouts coexist under the storage root:
//!
//! ```text
//! <root>/<name>/                   consolidated: source tree,
//! <root>/<name>/requirements.txt   manifest and environment
//! <root>/<name>/.venv/             live together
//!
//! <root>/<name>.py                 legacy flat files
//! <root>/<name>_requirements.txt
//! <root>/<name>_venv/
//! ```

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    Consolidated,
    Legacy,
}

/// Resolved paths owned by one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub kind: LayoutKind,
    /// Working directory for runs. For legacy projects this is the shared
    /// storage root, which the project does not own.
    pub dir: PathBuf,
    pub manifest: PathBuf,
    pub env_dir: PathBuf,
}

impl ProjectPaths {
    pub fn consolidated(root: &Path, name: &str, manifest_name: &str, env_dir_name: &str) -> Self {
        let dir = root.join(name);
        Self {
            kind: LayoutKind::Consolidated,
            manifest: dir.join(manifest_name),
            env_dir: dir.join(env_dir_name),
            dir,
        }
    }

    pub fn legacy(root: &Path, name: &str) -> Self {
        Self {
            kind: LayoutKind::Legacy,
            dir: root.to_path_buf(),
            manifest: root.join(format!("{name}_requirements.txt")),
            env_dir: root.join(format!("{name}_venv")),
        }
    }

    /// Entry script of a legacy project.
    pub fn legacy_entry(root: &Path, name: &str, extension: &str) -> PathBuf {
        root.join(format!("{name}.{extension}"))
    }
}
