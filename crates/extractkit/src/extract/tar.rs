//! Tar entries, compressed or not.

use super::Sink;
use crate::error::{Error, Result};
use std::io::Read;
use tar::EntryType;

pub(super) fn unpack<R: Read>(reader: R, kind: &'static str, sink: &mut Sink<'_>) -> Result<()> {
    let invalid = |e: std::io::Error| Error::InvalidArchive {
        kind,
        message: e.to_string(),
    };

    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries().map_err(invalid)? {
        sink.checkpoint()?;

        let mut entry = entry.map_err(invalid)?;
        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let entry_type = entry.header().entry_type();
        let mode = entry.header().mode().ok();

        if entry_type.is_dir() {
            sink.directory(&name, mode)?;
        } else if entry_type.is_file() || entry_type == EntryType::Continuous {
            sink.file(&name, &mut entry, mode)?;
        } else if is_metadata(entry_type) {
            log::debug!("Skipping {entry_type:?} header");
        } else {
            sink.unsupported(&name, describe(entry_type));
        }
    }

    Ok(())
}

/// Header-only entries that carry no filesystem object.
fn is_metadata(entry_type: EntryType) -> bool {
    entry_type.is_pax_global_extensions()
        || entry_type.is_pax_local_extensions()
        || entry_type.is_gnu_longname()
        || entry_type.is_gnu_longlink()
}

fn describe(entry_type: EntryType) -> &'static str {
    if entry_type.is_symlink() {
        "symlink"
    } else if entry_type.is_hard_link() {
        "hard link"
    } else if entry_type.is_character_special() {
        "character device"
    } else if entry_type.is_block_special() {
        "block device"
    } else if entry_type.is_fifo() {
        "fifo"
    } else {
        "unknown"
    }
}
