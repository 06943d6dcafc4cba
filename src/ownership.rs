//! Ownership capability
//!
//! Ownership is modeled as an interface with two implementations, picked
//! once at startup by [`detect`]: [`PosixOwnership`] on unix and
//! [`NoopOwnership`] elsewhere. Resources never check the platform
//! themselves.

use anyhow::Result;
use std::fs::Metadata;
use std::path::Path;
use std::sync::Arc;

/// Placeholder reported where the platform has no ownership model
pub const NOT_AVAILABLE: &str = "N/A";

/// User and group lookups plus ownership changes
pub trait OwnershipProvider: Send + Sync {
    /// Whether this platform has a user/group ownership model
    fn supported(&self) -> bool;

    /// Name of the user running the provider
    fn current_user(&self) -> Result<String>;

    /// Primary group name of the user running the provider
    fn current_group(&self) -> Result<String>;

    /// Resolve a user name to a uid (`None` when unsupported)
    fn user_id(&self, name: &str) -> Result<Option<u32>>;

    /// Resolve a group name to a gid (`None` when unsupported)
    fn group_id(&self, name: &str) -> Result<Option<u32>>;

    /// Resolve a uid to a user name
    fn user_name(&self, uid: u32) -> Result<String>;

    /// Resolve a gid to a group name
    fn group_name(&self, gid: u32) -> Result<String>;

    /// Owning uid and gid of a path (`None` when unsupported)
    fn owner(&self, path: &Path) -> Result<Option<(u32, u32)>>;

    /// Change ownership; `None` leaves that id unchanged
    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> Result<()>;
}

/// Pick the ownership implementation for this platform
pub fn detect() -> Arc<dyn OwnershipProvider> {
    #[cfg(unix)]
    {
        Arc::new(PosixOwnership)
    }
    #[cfg(not(unix))]
    {
        Arc::new(NoopOwnership)
    }
}

/// Permission bits of `metadata` as a 4-digit octal string, e.g. `0755`
pub fn permission_string(metadata: &Metadata) -> String {
    format!("{:04o}", permission_bits(metadata))
}

#[cfg(unix)]
fn permission_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn permission_bits(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() { 0o555 } else { 0o777 }
}

/// Apply octal permission bits to a path
pub fn set_permission_bits(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use anyhow::Context;
        use std::os::unix::fs::PermissionsExt;

        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .with_context(|| format!("Failed to set permissions {mode:04o} on {}", path.display()))
    }
    #[cfg(not(unix))]
    {
        log::debug!("Ignoring permissions {mode:04o} for {} on this platform", path.display());
        Ok(())
    }
}

// ============================================================================
// POSIX
// ============================================================================

/// Ownership backed by the system user and group databases
#[cfg(unix)]
pub struct PosixOwnership;

#[cfg(unix)]
impl OwnershipProvider for PosixOwnership {
    fn supported(&self) -> bool {
        true
    }

    fn current_user(&self) -> Result<String> {
        let uid = nix::unistd::getuid();
        let user = nix::unistd::User::from_uid(uid)?
            .ok_or_else(|| anyhow::anyhow!("No user entry for uid {uid}"))?;
        Ok(user.name)
    }

    fn current_group(&self) -> Result<String> {
        let uid = nix::unistd::getuid();
        let user = nix::unistd::User::from_uid(uid)?
            .ok_or_else(|| anyhow::anyhow!("No user entry for uid {uid}"))?;
        self.group_name(user.gid.as_raw())
    }

    fn user_id(&self, name: &str) -> Result<Option<u32>> {
        let user = nix::unistd::User::from_name(name)?
            .ok_or_else(|| anyhow::anyhow!("Unknown user: {name}"))?;
        Ok(Some(user.uid.as_raw()))
    }

    fn group_id(&self, name: &str) -> Result<Option<u32>> {
        let group = nix::unistd::Group::from_name(name)?
            .ok_or_else(|| anyhow::anyhow!("Unknown group: {name}"))?;
        Ok(Some(group.gid.as_raw()))
    }

    fn user_name(&self, uid: u32) -> Result<String> {
        let user = nix::unistd::User::from_uid(nix::unistd::Uid::from_raw(uid))?
            .ok_or_else(|| anyhow::anyhow!("No user entry for uid {uid}"))?;
        Ok(user.name)
    }

    fn group_name(&self, gid: u32) -> Result<String> {
        let group = nix::unistd::Group::from_gid(nix::unistd::Gid::from_raw(gid))?
            .ok_or_else(|| anyhow::anyhow!("No group entry for gid {gid}"))?;
        Ok(group.name)
    }

    fn owner(&self, path: &Path) -> Result<Option<(u32, u32)>> {
        use anyhow::Context;
        use std::os::unix::fs::MetadataExt;

        let metadata = std::fs::metadata(path)
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        Ok(Some((metadata.uid(), metadata.gid())))
    }

    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> Result<()> {
        use anyhow::Context;

        nix::unistd::chown(
            path,
            uid.map(nix::unistd::Uid::from_raw),
            gid.map(nix::unistd::Gid::from_raw),
        )
        .with_context(|| format!("Failed to change ownership of {}", path.display()))
    }
}

// ============================================================================
// No-op
// ============================================================================

/// Ownership for platforms without uids and gids
///
/// Lookups report [`NOT_AVAILABLE`] and ownership changes do nothing.
pub struct NoopOwnership;

impl OwnershipProvider for NoopOwnership {
    fn supported(&self) -> bool {
        false
    }

    fn current_user(&self) -> Result<String> {
        Ok(std::env::var("USERNAME")
            .or_else(|_| std::env::var("USER"))
            .unwrap_or_else(|_| NOT_AVAILABLE.to_string()))
    }

    fn current_group(&self) -> Result<String> {
        Ok(NOT_AVAILABLE.to_string())
    }

    fn user_id(&self, _name: &str) -> Result<Option<u32>> {
        Ok(None)
    }

    fn group_id(&self, _name: &str) -> Result<Option<u32>> {
        Ok(None)
    }

    fn user_name(&self, _uid: u32) -> Result<String> {
        Ok(NOT_AVAILABLE.to_string())
    }

    fn group_name(&self, _gid: u32) -> Result<String> {
        Ok(NOT_AVAILABLE.to_string())
    }

    fn owner(&self, _path: &Path) -> Result<Option<(u32, u32)>> {
        Ok(None)
    }

    fn chown(&self, path: &Path, _uid: Option<u32>, _gid: Option<u32>) -> Result<()> {
        log::debug!("Ownership not supported, leaving {} as is", path.display());
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Ownership double with a fixed user database that records chown calls
    #[derive(Default)]
    pub(crate) struct FakeOwnership {
        pub chowns: Mutex<Vec<(std::path::PathBuf, Option<u32>, Option<u32>)>>,
    }

    impl OwnershipProvider for FakeOwnership {
        fn supported(&self) -> bool {
            true
        }
        fn current_user(&self) -> Result<String> {
            Ok("alice".to_string())
        }
        fn current_group(&self) -> Result<String> {
            Ok("staff".to_string())
        }
        fn user_id(&self, name: &str) -> Result<Option<u32>> {
            match name {
                "alice" => Ok(Some(1000)),
                "bob" => Ok(Some(1001)),
                _ => anyhow::bail!("Unknown user: {name}"),
            }
        }
        fn group_id(&self, name: &str) -> Result<Option<u32>> {
            match name {
                "staff" => Ok(Some(50)),
                "wheel" => Ok(Some(0)),
                _ => anyhow::bail!("Unknown group: {name}"),
            }
        }
        fn user_name(&self, uid: u32) -> Result<String> {
            match uid {
                1001 => Ok("bob".to_string()),
                _ => Ok("alice".to_string()),
            }
        }
        fn group_name(&self, gid: u32) -> Result<String> {
            match gid {
                0 => Ok("wheel".to_string()),
                50 => Ok("staff".to_string()),
                _ => anyhow::bail!("No group entry for gid {gid}"),
            }
        }
        fn owner(&self, path: &Path) -> Result<Option<(u32, u32)>> {
            let chowns = self.chowns.lock().unwrap();
            let last = chowns.iter().rev().find(|(p, _, _)| p == path);
            Ok(Some(match last {
                Some((_, uid, gid)) => (uid.unwrap_or(1000), gid.unwrap_or(50)),
                None => (1000, 50),
            }))
        }
        fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> Result<()> {
            self.chowns.lock().unwrap().push((path.to_path_buf(), uid, gid));
            Ok(())
        }
    }

    #[test]
    fn test_noop_ownership() {
        let noop = NoopOwnership;
        assert!(!noop.supported());
        assert_eq!(noop.user_id("anyone").unwrap(), None);
        assert_eq!(noop.group_name(0).unwrap(), NOT_AVAILABLE);
        assert_eq!(noop.owner(Path::new("/")).unwrap(), None);
        assert!(noop.chown(Path::new("/nonexistent"), Some(0), Some(0)).is_ok());
    }

    #[test]
    fn test_permission_string_is_four_digits() {
        let temp = TempDir::new().unwrap();
        let metadata = std::fs::metadata(temp.path()).unwrap();
        let perms = permission_string(&metadata);
        assert_eq!(perms.len(), 4);
        assert!(perms.starts_with('0'));
    }

    #[cfg(unix)]
    #[test]
    fn test_set_permission_bits() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("d");
        std::fs::create_dir(&dir).unwrap();

        set_permission_bits(&dir, 0o750).unwrap();
        let metadata = std::fs::metadata(&dir).unwrap();
        assert_eq!(permission_string(&metadata), "0750");
    }

    #[cfg(unix)]
    #[test]
    fn test_posix_owner_of_own_file() {
        let temp = TempDir::new().unwrap();
        let posix = PosixOwnership;
        let (uid, _gid) = posix.owner(temp.path()).unwrap().unwrap();
        assert_eq!(uid, nix::unistd::getuid().as_raw());
    }

    #[cfg(unix)]
    #[test]
    fn test_posix_unknown_user() {
        let posix = PosixOwnership;
        assert!(posix.user_id("no-such-user-utilities-test").is_err());
    }
}
