#![allow(dead_code)]

pub use botvisor_test_utils::builders;
pub use botvisor_test_utils::harness::{Harness, CHAT, USER};
pub use botvisor_test_utils::{init_tracing, with_timeout};

use std::io::Write;

/// Build an in-memory zip archive from `(path, contents)` pairs.
pub fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (path, contents) in files {
        writer.start_file(*path, options).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
