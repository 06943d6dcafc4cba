//! Zip entries.

use super::Sink;
use crate::error::Result;
use std::fs::File;
use std::io::BufReader;

/// File type bits of a unix mode.
const S_IFMT: u32 = 0o170_000;
/// Symbolic link file type.
const S_IFLNK: u32 = 0o120_000;

pub(super) fn unpack(file: File, sink: &mut Sink<'_>) -> Result<()> {
    let mut archive = zip::ZipArchive::new(BufReader::new(file))?;

    for index in 0..archive.len() {
        sink.checkpoint()?;

        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        let mode = entry.unix_mode();

        if entry.is_dir() {
            sink.directory(&name, mode)?;
        } else if mode.is_some_and(|m| m & S_IFMT == S_IFLNK) {
            sink.unsupported(&name, "symlink");
        } else {
            sink.file(&name, &mut entry, mode)?;
        }
    }

    Ok(())
}
