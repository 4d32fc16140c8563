// src/store/archive.rs

use std::io::{Cursor, Read};
use std::path::{Component, Path};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::fs::FileSystem;

pub(crate) fn is_safe_relative_path(path: &Path) -> bool {
    !path.is_absolute()
        && !path.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        })
}

/// Extract a zip archive into `output_dir`, overwriting existing files.
///
/// Entries whose names would escape `output_dir` are skipped. Returns the
/// number of files written.
pub fn extract_zip_bytes(fs: &dyn FileSystem, bytes: &[u8], output_dir: &Path) -> Result<usize> {
    let reader = Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(reader).context("not a valid zip archive")?;
    let mut written = 0;

    fs.create_dir_all(output_dir)?;

    for i in 0..archive.len() {
        let mut f = archive
            .by_index(i)
            .with_context(|| format!("reading zip entry #{i}"))?;
        let Some(raw_name) = f.enclosed_name().map(|p| p.to_path_buf()) else {
            warn!(entry = %f.name(), "skipping zip entry with unsafe path");
            continue;
        };
        if !is_safe_relative_path(&raw_name) {
            warn!(entry = ?raw_name, "skipping zip entry with unsafe path");
            continue;
        }
        let outpath = output_dir.join(&raw_name);
        if f.is_dir() {
            fs.create_dir_all(&outpath)?;
        } else {
            let mut contents = Vec::with_capacity(f.size() as usize);
            f.read_to_end(&mut contents)
                .with_context(|| format!("decompressing {:?}", raw_name))?;
            fs.write(&outpath, &contents)?;
            debug!(path = ?outpath, bytes = contents.len(), "extracted zip entry");
            written += 1;
        }
    }
    Ok(written)
}
