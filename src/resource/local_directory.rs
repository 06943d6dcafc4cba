//! Local directory resource - `utilities_local_directory`
//!
//! A directory is *managed* when this resource created it (or changed its
//! permissions on update). Only managed or `force`d directories are removed
//! on delete; protected system paths are never touched.

use crate::ownership::{self, NOT_AVAILABLE, OwnershipProvider};
use crate::protected::ProtectedPaths;
use anyhow::{Context, Result, bail};
use declarative::{ApplyContext, Diagnostics, Outcome, Resource};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const PERMISSIONS_PATTERN: &str = r"^0[0-7]{3}$";

/// Declared configuration of one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryConfig {
    pub path: PathBuf,
    /// Owner; defaults to the current user
    pub user: Option<String>,
    /// Group; defaults to the current user's primary group
    pub group: Option<String>,
    /// Octal mode such as `0755`
    pub permissions: Option<String>,
    /// Remove the directory on delete even when it was not created here
    pub force: bool,
}

/// Observed state of one directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    pub path: PathBuf,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub permissions: String,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub force: bool,
}

pub struct LocalDirectory {
    ownership: Arc<dyn OwnershipProvider>,
    protected: ProtectedPaths,
}

impl LocalDirectory {
    pub fn new(ownership: Arc<dyn OwnershipProvider>, protected: ProtectedPaths) -> Self {
        Self {
            ownership,
            protected,
        }
    }

    /// Fail if `path` exists as anything but a directory
    fn existing_directory(path: &Path) -> Result<bool> {
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => Ok(true),
            Ok(_) => bail!(
                "Invalid Directory Path: '{}' exists but is not a directory",
                path.display()
            ),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to check the path '{}'", path.display())),
        }
    }

    fn resolve_owner(&self, config: &DirectoryConfig) -> Result<(String, String, Option<u32>, Option<u32>)> {
        let user = match config.user.as_deref() {
            Some(user) => user.to_string(),
            None => self
                .ownership
                .current_user()
                .context("Failed to retrieve the current user")?,
        };
        let group = match config.group.as_deref() {
            Some(group) => group.to_string(),
            None => self
                .ownership
                .current_group()
                .context("Failed to retrieve the current group")?,
        };

        let uid = self
            .ownership
            .user_id(&user)
            .with_context(|| format!("Invalid User '{user}'"))?;
        let gid = self
            .ownership
            .group_id(&group)
            .with_context(|| format!("Invalid Group '{group}'"))?;

        Ok((user, group, uid, gid))
    }

    /// Shared body of create and update
    fn converge(&self, config: &DirectoryConfig, prior: Option<&DirectoryRecord>) -> Result<Outcome<DirectoryRecord>> {
        let path = &config.path;
        let existed = Self::existing_directory(path)?;
        let (user, group, uid, gid) = self.resolve_owner(config)?;

        let mut managed = prior.is_some_and(|p| p.managed && p.path == *path);
        let mut diagnostics = Diagnostics::new();

        if !existed {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory '{}'", path.display()))?;
            log::info!("Created directory {}", path.display());
            managed = true;
        }

        if self.protected.contains(path) {
            log::warn!("Skipping ownership changes for protected path {}", path.display());
            diagnostics.warn(
                "Protected Path",
                format!(
                    "'{}' is critical to the operating system; ownership and permissions were left unchanged",
                    path.display()
                ),
            );
        } else {
            self.ownership.chown(path, uid, gid)?;

            if let Some(perms) = config.permissions.as_deref() {
                let mode = u32::from_str_radix(perms, 8)
                    .with_context(|| format!("Invalid Permissions '{perms}'"))?;
                ownership::set_permission_bits(path, mode)?;
                if prior.is_some() {
                    managed = true;
                }
            }
        }

        let metadata = fs::metadata(path)
            .with_context(|| format!("Failed to read directory info for '{}'", path.display()))?;

        let record = DirectoryRecord {
            path: path.clone(),
            user,
            group,
            permissions: ownership::permission_string(&metadata),
            managed,
            force: config.force,
        };
        Ok(Outcome::with_diagnostics(record, diagnostics))
    }
}

impl Resource for LocalDirectory {
    type Config = DirectoryConfig;
    type State = DirectoryRecord;

    fn type_name(&self) -> &'static str {
        crate::provider::LOCAL_DIRECTORY
    }

    fn validate(&self, config: &DirectoryConfig) -> Result<()> {
        if config.path.as_os_str().is_empty() {
            bail!("path cannot be empty");
        }
        if config.user.as_deref().is_some_and(str::is_empty) {
            bail!("user cannot be empty when set");
        }
        if config.group.as_deref().is_some_and(str::is_empty) {
            bail!("group cannot be empty when set");
        }
        if let Some(perms) = config.permissions.as_deref() {
            let pattern = Regex::new(PERMISSIONS_PATTERN)?;
            if !pattern.is_match(perms) {
                bail!("permissions must be a valid octal permission (e.g. 0755), got '{perms}'");
            }
        }
        Ok(())
    }

    fn create(&self, _ctx: &ApplyContext, config: &DirectoryConfig) -> Result<Outcome<DirectoryRecord>> {
        self.converge(config, None)
    }

    fn read(&self, _ctx: &ApplyContext, prior: &DirectoryRecord) -> Result<Outcome<DirectoryRecord>> {
        let path = &prior.path;
        let mut diagnostics = Diagnostics::new();

        let metadata = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!("Directory {} does not exist", path.display());
                diagnostics.warn(
                    "Directory Not Found",
                    format!("'{}' no longer exists", path.display()),
                );
                let record = DirectoryRecord {
                    user: String::new(),
                    group: String::new(),
                    permissions: String::new(),
                    ..prior.clone()
                };
                return Ok(Outcome::with_diagnostics(record, diagnostics));
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to check the path '{}'", path.display()));
            }
        };

        if !metadata.is_dir() {
            bail!(
                "Invalid Directory Path: '{}' exists but is not a directory",
                path.display()
            );
        }

        let (user, group) = match self.ownership.owner(path)? {
            Some((uid, gid)) => {
                let user = self
                    .ownership
                    .user_name(uid)
                    .with_context(|| format!("Failed to retrieve user information for UID {uid}"))?;
                let group = match self.ownership.group_name(gid) {
                    Ok(name) => name,
                    Err(e) => {
                        diagnostics.warn(
                            "Error Retrieving Group Info",
                            format!("Failed to retrieve group information for GID {gid}: {e}"),
                        );
                        String::new()
                    }
                };
                (user, group)
            }
            None => (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string()),
        };

        let record = DirectoryRecord {
            user,
            group,
            permissions: ownership::permission_string(&metadata),
            ..prior.clone()
        };
        log::debug!(
            "Read {}: {}:{} {}",
            path.display(),
            record.user,
            record.group,
            record.permissions
        );
        Ok(Outcome::with_diagnostics(record, diagnostics))
    }

    fn update(
        &self,
        _ctx: &ApplyContext,
        config: &DirectoryConfig,
        prior: &DirectoryRecord,
    ) -> Result<Outcome<DirectoryRecord>> {
        self.converge(config, Some(prior))
    }

    fn delete(&self, _ctx: &ApplyContext, prior: &DirectoryRecord) -> Result<Outcome<()>> {
        let path = &prior.path;
        let mut diagnostics = Diagnostics::new();

        match fs::metadata(path) {
            Ok(meta) if !meta.is_dir() => bail!(
                "Invalid Directory Path: '{}' exists but is not a directory",
                path.display()
            ),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("Directory {} does not exist, skipping deletion", path.display());
                return Ok(Outcome::ok(()));
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to access directory '{}'", path.display()));
            }
        }

        if self.protected.contains(path) {
            log::warn!("Refusing to delete protected path {}", path.display());
            diagnostics.warn(
                "Protected Path",
                format!("'{}' is protected and was not deleted", path.display()),
            );
            return Ok(Outcome::with_diagnostics((), diagnostics));
        }

        if prior.force || prior.managed {
            fs::remove_dir_all(path)
                .with_context(|| format!("Failed to delete directory '{}'", path.display()))?;
            log::info!("Deleted directory {}", path.display());
        } else {
            log::info!("Directory {} is unmanaged, leaving it on disk", path.display());
        }

        Ok(Outcome::with_diagnostics((), diagnostics))
    }

    fn needs_update(&self, config: &DirectoryConfig, prior: &DirectoryRecord) -> Result<bool> {
        let differs = |wanted: Option<&str>, recorded: &str| wanted.is_some_and(|w| w != recorded);

        Ok(config.path != prior.path
            || config.force != prior.force
            || !config.path.is_dir()
            || differs(config.user.as_deref(), &prior.user)
            || differs(config.group.as_deref(), &prior.group)
            || differs(config.permissions.as_deref(), &prior.permissions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ownership::tests::FakeOwnership;
    use declarative::Completion;
    use tempfile::TempDir;

    fn resource(protected: ProtectedPaths) -> (LocalDirectory, Arc<FakeOwnership>) {
        let fake = Arc::new(FakeOwnership::default());
        (LocalDirectory::new(fake.clone(), protected), fake)
    }

    fn config(path: &Path) -> DirectoryConfig {
        DirectoryConfig {
            path: path.to_path_buf(),
            user: None,
            group: None,
            permissions: None,
            force: false,
        }
    }

    fn ctx() -> ApplyContext {
        ApplyContext::default()
    }

    #[test]
    fn test_validate_permissions() {
        let (dir, _) = resource(ProtectedPaths::none());
        let mut cfg = config(Path::new("/srv/app"));

        cfg.permissions = Some("0755".into());
        assert!(dir.validate(&cfg).is_ok());

        for bad in ["755", "0855", "00755", "rwx"] {
            cfg.permissions = Some(bad.into());
            assert!(dir.validate(&cfg).is_err(), "{bad} should be rejected");
        }

        cfg.permissions = None;
        cfg.user = Some(String::new());
        assert!(dir.validate(&cfg).is_err());
    }

    #[test]
    fn test_create_new_directory_is_managed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a").join("b");
        let (dir, fake) = resource(ProtectedPaths::none());

        let outcome = dir.create(&ctx(), &config(&path)).unwrap();
        let record = outcome.value;

        assert!(path.is_dir());
        assert!(record.managed);
        assert_eq!(record.user, "alice");
        assert_eq!(record.group, "staff");
        assert_eq!(record.permissions.len(), 4);
        assert_eq!(
            fake.chowns.lock().unwrap().as_slice(),
            &[(path.clone(), Some(1000), Some(50))]
        );
    }

    #[test]
    fn test_create_existing_directory_is_unmanaged() {
        let temp = TempDir::new().unwrap();
        let (dir, _) = resource(ProtectedPaths::none());

        let mut cfg = config(temp.path());
        cfg.user = Some("bob".into());
        cfg.group = Some("wheel".into());
        let record = dir.create(&ctx(), &cfg).unwrap().value;

        assert!(!record.managed);
        assert_eq!(record.user, "bob");
        assert_eq!(record.group, "wheel");
    }

    #[test]
    fn test_create_on_file_fails() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file");
        fs::write(&file, "x").unwrap();
        let (dir, _) = resource(ProtectedPaths::none());

        let err = dir.create(&ctx(), &config(&file)).unwrap_err();
        assert!(err.to_string().contains("Invalid Directory Path"));
    }

    #[test]
    fn test_create_unknown_user_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("d");
        let (dir, _) = resource(ProtectedPaths::none());

        let mut cfg = config(&path);
        cfg.user = Some("mallory".into());
        assert!(dir.create(&ctx(), &cfg).is_err());
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_create_applies_permissions() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("d");
        let (dir, _) = resource(ProtectedPaths::none());

        let mut cfg = config(&path);
        cfg.permissions = Some("0750".into());
        let record = dir.create(&ctx(), &cfg).unwrap().value;
        assert_eq!(record.permissions, "0750");
    }

    #[cfg(unix)]
    #[test]
    fn test_protected_path_is_left_alone() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("system");
        fs::create_dir(&path).unwrap();
        ownership::set_permission_bits(&path, 0o755).unwrap();
        let (dir, fake) = resource(ProtectedPaths::new([path.to_string_lossy()]));

        let mut cfg = config(&path);
        cfg.permissions = Some("0700".into());
        cfg.force = true;
        let outcome = dir.create(&ctx(), &cfg).unwrap();

        assert_eq!(outcome.completion(), Completion::DoneWithWarnings);
        assert_eq!(outcome.value.permissions, "0755");
        assert!(fake.chowns.lock().unwrap().is_empty());

        let deleted = dir.delete(&ctx(), &outcome.value).unwrap();
        assert_eq!(deleted.completion(), Completion::DoneWithWarnings);
        assert!(path.is_dir());
    }

    #[test]
    fn test_forced_delete_refuses_protected_spellings() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("system");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep.txt"), "x").unwrap();
        let (dir, _) = resource(ProtectedPaths::new([path.to_string_lossy()]));

        for spelling in [
            path.join("."),
            PathBuf::from(format!("{}//system/", temp.path().display())),
        ] {
            let mut cfg = config(&spelling);
            cfg.force = true;
            let record = dir.create(&ctx(), &cfg).unwrap().value;

            let deleted = dir.delete(&ctx(), &record).unwrap();
            assert_eq!(deleted.completion(), Completion::DoneWithWarnings, "{}", spelling.display());
            assert!(path.join("keep.txt").exists());
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_update_permissions_marks_managed() {
        let temp = TempDir::new().unwrap();
        let (dir, _) = resource(ProtectedPaths::none());
        let path = temp.path().join("existing");
        fs::create_dir(&path).unwrap();

        let record = dir.create(&ctx(), &config(&path)).unwrap().value;
        assert!(!record.managed);

        let mut cfg = config(&path);
        cfg.permissions = Some("0700".into());
        assert!(dir.needs_update(&cfg, &record).unwrap());

        let updated = dir.update(&ctx(), &cfg, &record).unwrap().value;
        assert!(updated.managed);
        assert_eq!(updated.permissions, "0700");
        assert!(!dir.needs_update(&cfg, &updated).unwrap());
    }

    #[test]
    fn test_read_refreshes_and_handles_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("d");
        let (dir, _) = resource(ProtectedPaths::none());
        let record = dir.create(&ctx(), &config(&path)).unwrap().value;

        let read = dir.read(&ctx(), &record).unwrap();
        assert_eq!(read.value, record);

        fs::remove_dir(&path).unwrap();
        let missing = dir.read(&ctx(), &record).unwrap();
        assert_eq!(missing.completion(), Completion::DoneWithWarnings);
        assert!(missing.value.user.is_empty());
        assert!(missing.value.permissions.is_empty());
        assert!(missing.value.managed);
        assert!(dir.needs_update(&config(&path), &missing.value).unwrap());
    }

    #[test]
    fn test_read_on_file_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("d");
        let (dir, _) = resource(ProtectedPaths::none());
        let record = dir.create(&ctx(), &config(&path)).unwrap().value;

        fs::remove_dir(&path).unwrap();
        fs::write(&path, "now a file").unwrap();
        assert!(dir.read(&ctx(), &record).is_err());
        assert!(dir.delete(&ctx(), &record).is_err());
    }

    #[test]
    fn test_delete_managed_removes_recursively() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("d");
        let (dir, _) = resource(ProtectedPaths::none());
        let record = dir.create(&ctx(), &config(&path)).unwrap().value;
        fs::write(path.join("inner.txt"), "x").unwrap();

        let outcome = dir.delete(&ctx(), &record).unwrap();
        assert_eq!(outcome.completion(), Completion::Done);
        assert!(!path.exists());

        // Already gone
        assert!(dir.delete(&ctx(), &record).is_ok());
    }

    #[test]
    fn test_delete_unmanaged_keeps_directory_unless_forced() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("d");
        fs::create_dir(&path).unwrap();
        let (dir, _) = resource(ProtectedPaths::none());

        let record = dir.create(&ctx(), &config(&path)).unwrap().value;
        dir.delete(&ctx(), &record).unwrap();
        assert!(path.is_dir());

        let mut forced = config(&path);
        forced.force = true;
        let record = dir.create(&ctx(), &forced).unwrap().value;
        dir.delete(&ctx(), &record).unwrap();
        assert!(!path.exists());
    }
}
