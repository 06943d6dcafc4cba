//! Archive extraction into a destination directory.
//!
//! Every entry goes through [`Sink`], which resolves the entry name against
//! the destination, refuses names that climb out of it, and records what it
//! creates. Cancellation is checked before opening the archive, before the
//! destination is created, and before every entry. A canceled or failed
//! extraction leaves whatever was already written in place.

mod tar;
mod zip;

use crate::error::{Error, ExtractWarning, Result};
use crate::types::{ArchiveKind, Extraction};
use declarative::CancelToken;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

/// Extract `archive` into `destination`.
///
/// Files, directory entries and parent directories that did not exist are
/// recorded in creation order, each file after its parents. Files that
/// already existed are overwritten but not recorded. The destination root is
/// never recorded; `destination_created` reports whether it was created.
pub fn extract(
    archive: &Path,
    kind: ArchiveKind,
    destination: &Path,
    cancel: &CancelToken,
) -> Result<Extraction> {
    cancel.check()?;

    let file = File::open(archive).map_err(|source| Error::SourceUnreadable {
        path: archive.to_path_buf(),
        source,
    })?;

    cancel.check()?;
    let destination_created = !destination.exists();
    fs::create_dir_all(destination).map_err(|e| Error::mkdir(destination, e))?;
    if destination_created {
        log::debug!("Created destination {}", destination.display());
    }

    let mut sink = Sink::new(destination, cancel);
    match kind {
        ArchiveKind::Zip => zip::unpack(file, &mut sink)?,
        ArchiveKind::TarGz => tar::unpack(
            flate2::read::GzDecoder::new(BufReader::new(file)),
            kind.name(),
            &mut sink,
        )?,
        ArchiveKind::Tar => tar::unpack(BufReader::new(file), kind.name(), &mut sink)?,
    }
    sink.finish();

    log::info!(
        "Extracted {} into {} ({} paths created)",
        archive.display(),
        destination.display(),
        sink.created.len()
    );

    Ok(Extraction {
        created_paths: sink.created,
        destination_created,
        warnings: sink.warnings,
    })
}

/// Resolve an archive entry name to a path inside `destination`.
///
/// Root and prefix components are dropped so absolute names land inside the
/// destination. `..` is allowed only while it stays inside. Returns `None`
/// for names that resolve to the destination itself.
pub fn resolve_entry_path(destination: &Path, entry: &str) -> Result<Option<PathBuf>> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();

    for component in Path::new(entry).components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(Error::UnsafeEntryPath {
                        entry: entry.to_string(),
                        destination: destination.to_path_buf(),
                    });
                }
            }
            Component::Normal(part) => parts.push(part),
        }
    }

    if parts.is_empty() {
        return Ok(None);
    }

    let mut resolved = destination.to_path_buf();
    resolved.extend(parts);
    Ok(Some(resolved))
}

/// Writes entries below the destination and records what it creates.
pub(crate) struct Sink<'a> {
    destination: &'a Path,
    cancel: &'a CancelToken,
    created: Vec<PathBuf>,
    recorded: HashSet<PathBuf>,
    warnings: Vec<ExtractWarning>,
    /// Directory modes are applied last so a read-only directory can still
    /// receive its files.
    deferred_modes: Vec<(PathBuf, u32)>,
}

impl<'a> Sink<'a> {
    fn new(destination: &'a Path, cancel: &'a CancelToken) -> Self {
        Self {
            destination,
            cancel,
            created: Vec::new(),
            recorded: HashSet::new(),
            warnings: Vec::new(),
            deferred_modes: Vec::new(),
        }
    }

    /// Per-entry cancellation checkpoint.
    pub(crate) fn checkpoint(&self) -> Result<()> {
        self.cancel.check().map_err(Error::from)
    }

    /// Handle a directory entry.
    pub(crate) fn directory(&mut self, entry: &str, mode: Option<u32>) -> Result<()> {
        let Some(path) = resolve_entry_path(self.destination, entry)? else {
            return Ok(());
        };
        self.ensure_dir(&path)?;
        if let Some(mode) = mode {
            self.deferred_modes.push((path, mode));
        }
        Ok(())
    }

    /// Handle a regular file entry, copying `content` byte for byte.
    pub(crate) fn file(&mut self, entry: &str, content: &mut dyn Read, mode: Option<u32>) -> Result<()> {
        let Some(path) = resolve_entry_path(self.destination, entry)? else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            self.ensure_dir(parent)?;
        }

        let existed = fs::symlink_metadata(&path).is_ok();
        let mut out = File::create(&path).map_err(|e| Error::write(&path, e))?;
        io::copy(content, &mut out).map_err(|e| Error::write(&path, e))?;

        // An overwritten file belongs to whoever created it
        if existed {
            log::debug!("Overwrote existing {}", path.display());
        } else {
            log::debug!("Wrote {}", path.display());
            self.record(path.clone());
        }
        if let Some(mode) = mode {
            self.apply_mode(&path, mode);
        }
        Ok(())
    }

    /// Skip an entry type that is not extracted.
    pub(crate) fn unsupported(&mut self, entry: &str, kind: &str) {
        log::warn!("Skipping unsupported {kind} entry {entry:?}");
        self.warnings.push(ExtractWarning::UnsupportedEntry {
            entry: entry.to_string(),
            kind: kind.to_string(),
        });
    }

    /// Create `path` and any missing ancestors below the destination,
    /// recording each one that did not exist.
    fn ensure_dir(&mut self, path: &Path) -> Result<()> {
        let mut missing = Vec::new();
        let mut current = path;
        while current != self.destination {
            match fs::metadata(current) {
                Ok(meta) if meta.is_dir() => break,
                Ok(_) => {
                    return Err(Error::mkdir(
                        current,
                        io::Error::new(io::ErrorKind::AlreadyExists, "a file is in the way"),
                    ));
                }
                Err(_) => missing.push(current.to_path_buf()),
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        for dir in missing.into_iter().rev() {
            match fs::create_dir(&dir) {
                Ok(()) => {
                    log::debug!("Created directory {}", dir.display());
                    self.record(dir);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => {}
                Err(e) => return Err(Error::mkdir(&dir, e)),
            }
        }
        Ok(())
    }

    fn record(&mut self, path: PathBuf) {
        if self.recorded.insert(path.clone()) {
            self.created.push(path);
        }
    }

    #[cfg(unix)]
    fn apply_mode(&mut self, path: &Path, mode: u32) {
        use std::os::unix::fs::PermissionsExt;

        let permissions = fs::Permissions::from_mode(mode & 0o7777);
        if let Err(e) = fs::set_permissions(path, permissions) {
            log::warn!("Could not set mode {:o} on {}: {e}", mode & 0o7777, path.display());
            self.warnings.push(ExtractWarning::PermissionApplyFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            });
        }
    }

    #[cfg(not(unix))]
    fn apply_mode(&mut self, _path: &Path, _mode: u32) {}

    fn finish(&mut self) {
        // Deepest first so a read-only parent doesn't block its children.
        let mut deferred = std::mem::take(&mut self.deferred_modes);
        deferred.sort_by_key(|(path, _)| std::cmp::Reverse(path.components().count()));
        for (path, mode) in deferred {
            self.apply_mode(&path, mode);
        }
    }
}
