use crate::ownership::{self, NOT_AVAILABLE, OwnershipProvider};
use anyhow::{Context, Result};
use declarative::{ApplyContext, DataSource, Diagnostics, Outcome};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// Facts about a directory on the local filesystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryInfo {
    /// Same as `path`
    pub id: String,
    pub path: String,
    pub exists: bool,
    /// Octal mode such as `0755`, empty when the directory is absent
    pub permissions: String,
    pub user: String,
    pub group: String,
}

pub struct LocalDirectoryData {
    ownership: Arc<dyn OwnershipProvider>,
}

impl LocalDirectoryData {
    pub fn new(ownership: Arc<dyn OwnershipProvider>) -> Self {
        Self { ownership }
    }
}

impl DataSource for LocalDirectoryData {
    type Args = PathBuf;
    type Output = DirectoryInfo;

    fn type_name(&self) -> &'static str {
        crate::provider::LOCAL_DIRECTORY
    }

    fn read(&self, _ctx: &ApplyContext, path: PathBuf) -> Result<Outcome<DirectoryInfo>> {
        let display = path.to_string_lossy().into_owned();
        let mut info = DirectoryInfo {
            id: display.clone(),
            path: display,
            exists: false,
            permissions: String::new(),
            user: String::new(),
            group: String::new(),
        };
        let mut diagnostics = Diagnostics::new();

        let metadata = match fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => meta,
            Ok(_) => {
                log::debug!("{} is not a directory", path.display());
                return Ok(Outcome::ok(info));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Outcome::ok(info)),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to check the path '{}'", path.display()));
            }
        };

        info.exists = true;
        info.permissions = ownership::permission_string(&metadata);

        match self.ownership.owner(&path)? {
            Some((uid, gid)) => {
                info.user = self.ownership.user_name(uid).unwrap_or_else(|e| {
                    diagnostics.warn("Error Retrieving User Info", e.to_string());
                    String::new()
                });
                info.group = self.ownership.group_name(gid).unwrap_or_else(|e| {
                    diagnostics.warn("Error Retrieving Group Info", e.to_string());
                    String::new()
                });
            }
            None => {
                info.user = NOT_AVAILABLE.to_string();
                info.group = NOT_AVAILABLE.to_string();
            }
        }

        Ok(Outcome::with_diagnostics(info, diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ownership::NoopOwnership;
    use crate::ownership::tests::FakeOwnership;
    use tempfile::TempDir;

    #[test]
    fn test_existing_directory() {
        let temp = TempDir::new().unwrap();
        let data = LocalDirectoryData::new(Arc::new(FakeOwnership::default()));

        let info = data.read(&ApplyContext::default(), temp.path().to_path_buf()).unwrap().value;
        assert!(info.exists);
        assert_eq!(info.id, info.path);
        assert_eq!(info.user, "alice");
        assert_eq!(info.group, "staff");
        assert_eq!(info.permissions.len(), 4);
    }

    #[test]
    fn test_missing_directory() {
        let temp = TempDir::new().unwrap();
        let data = LocalDirectoryData::new(Arc::new(FakeOwnership::default()));

        let info = data
            .read(&ApplyContext::default(), temp.path().join("missing"))
            .unwrap()
            .value;
        assert!(!info.exists);
        assert!(info.permissions.is_empty());
        assert!(info.user.is_empty());
    }

    #[test]
    fn test_file_is_not_a_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("f");
        fs::write(&file, "x").unwrap();
        let data = LocalDirectoryData::new(Arc::new(FakeOwnership::default()));

        let info = data.read(&ApplyContext::default(), file).unwrap().value;
        assert!(!info.exists);
    }

    #[test]
    fn test_platform_without_ownership() {
        let temp = TempDir::new().unwrap();
        let data = LocalDirectoryData::new(Arc::new(NoopOwnership));

        let info = data.read(&ApplyContext::default(), temp.path().to_path_buf()).unwrap().value;
        assert_eq!(info.user, NOT_AVAILABLE);
        assert_eq!(info.group, NOT_AVAILABLE);
    }
}
