// src/provision/stamp.rs

//! Manifest stamp: a blake3 digest of the last successfully installed
//! manifest, stored inside the environment directory.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::fs::FileSystem;

pub const STAMP_FILE: &str = ".botvisor-manifest.blake3";

pub fn manifest_digest(contents: &[u8]) -> String {
    blake3::hash(contents).to_hex().to_string()
}

pub fn stamp_path(env_dir: &Path) -> PathBuf {
    env_dir.join(STAMP_FILE)
}

/// Whether the environment was last provisioned from exactly `contents`.
pub fn is_current(fs: &dyn FileSystem, env_dir: &Path, contents: &[u8]) -> bool {
    match fs.read_to_string(&stamp_path(env_dir)) {
        Ok(stored) => stored.trim() == manifest_digest(contents),
        Err(_) => false,
    }
}

pub fn write_stamp(fs: &dyn FileSystem, env_dir: &Path, contents: &[u8]) -> Result<()> {
    fs.write(&stamp_path(env_dir), manifest_digest(contents).as_bytes())
}
