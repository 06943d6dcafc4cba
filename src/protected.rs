//! Protected-path denylist for the local directory resource
//!
//! The set is injectable: the provider configuration may replace it and
//! tests construct their own.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

/// System directories whose ownership, permissions and existence are
/// never changed.
pub const DEFAULT_PROTECTED_PATHS: &[&str] = &[
    "/", "/etc", "/usr", "/var/lib", "/bin", "/sbin", "/boot", "/proc", "/sys", "/dev", "/lib",
    "/opt", "/tmp", "/var/run", "/var/lock", "/var/cache", "/var/log", "/home", "/root", "/mnt",
    "/media", "/srv", "/var/spool", "/var/tmp", "/libexec",
];

/// Set of paths matched exactly after lexical normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedPaths {
    paths: BTreeSet<String>,
}

impl ProtectedPaths {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            paths: paths
                .into_iter()
                .map(|p| key(Path::new(p.as_ref())))
                .collect(),
        }
    }

    /// An empty denylist.
    #[cfg(test)]
    pub fn none() -> Self {
        Self {
            paths: BTreeSet::new(),
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(&key(path))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }
}

impl Default for ProtectedPaths {
    fn default() -> Self {
        Self::new(DEFAULT_PROTECTED_PATHS)
    }
}

fn key(path: &Path) -> String {
    normalize(path).to_string_lossy().into_owned()
}

/// Resolve `.`, `..` and repeated or trailing separators without touching
/// the filesystem. `..` never climbs above the root.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}
