//! Provider registry: the type names and descriptions of everything the
//! `utilities` provider offers.

use extractkit::ArchiveKind;
use serde::Serialize;

pub const PROVIDER_NAME: &str = "utilities";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const EXTRACT_ZIP: &str = "utilities_extract_zip";
pub const EXTRACT_TAR_GZ: &str = "utilities_extract_tar_gz";
pub const EXTRACT_TAR: &str = "utilities_extract_tar";
pub const LOCAL_DIRECTORY: &str = "utilities_local_directory";
pub const BCRYPT_HASH: &str = "utilities_bcrypt_hash";

/// Archive kinds in the order they are planned and applied
pub const ARCHIVE_KINDS: [ArchiveKind; 3] = [ArchiveKind::Zip, ArchiveKind::TarGz, ArchiveKind::Tar];

pub fn extract_type_name(kind: ArchiveKind) -> &'static str {
    match kind {
        ArchiveKind::Zip => EXTRACT_ZIP,
        ArchiveKind::TarGz => EXTRACT_TAR_GZ,
        ArchiveKind::Tar => EXTRACT_TAR,
    }
}

/// One registered type or function
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub name: &'static str,
    pub description: &'static str,
}

/// Everything the provider exposes
#[derive(Debug, Clone, Serialize)]
pub struct Provider {
    pub name: &'static str,
    pub version: &'static str,
    pub resources: Vec<Entry>,
    pub data_sources: Vec<Entry>,
    pub functions: Vec<Entry>,
}

impl Provider {
    pub fn new() -> Self {
        Self {
            name: PROVIDER_NAME,
            version: VERSION,
            resources: vec![
                Entry {
                    name: EXTRACT_ZIP,
                    description: "Extracts a ZIP archive to a specified directory",
                },
                Entry {
                    name: EXTRACT_TAR_GZ,
                    description: "Extracts a gzip-compressed TAR archive to a specified directory",
                },
                Entry {
                    name: EXTRACT_TAR,
                    description: "Extracts a TAR archive to a specified directory",
                },
                Entry {
                    name: LOCAL_DIRECTORY,
                    description: "Manages a local directory with ownership and permissions",
                },
            ],
            data_sources: vec![
                Entry {
                    name: LOCAL_DIRECTORY,
                    description: "Reads existence, permissions and ownership of a local directory",
                },
                Entry {
                    name: BCRYPT_HASH,
                    description: "Generates a stable bcrypt hash for a plaintext and cost",
                },
            ],
            functions: vec![
                Entry {
                    name: "path_exists",
                    description: "Checks if a given path exists",
                },
                Entry {
                    name: "path_owner",
                    description: "Returns the owner of a given path",
                },
                Entry {
                    name: "path_permission",
                    description: "Returns the permissions of a given path",
                },
                Entry {
                    name: "http_request",
                    description: "Makes an HTTP request and returns the response body and status code",
                },
            ],
        }
    }

    pub fn has_resource(&self, name: &str) -> bool {
        self.resources.iter().any(|e| e.name == name)
    }
}

impl Default for Provider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{HttpRequest, PathExists, PathOwner, PathPermission};
    use declarative::Function;
    use std::time::Duration;

    #[test]
    fn test_registry_contents() {
        let provider = Provider::new();
        assert_eq!(provider.name, "utilities");
        assert_eq!(provider.resources.len(), 4);
        assert_eq!(provider.data_sources.len(), 2);
        assert_eq!(provider.functions.len(), 4);
        for kind in ARCHIVE_KINDS {
            assert!(provider.has_resource(extract_type_name(kind)));
        }
        assert!(!provider.has_resource(BCRYPT_HASH));
    }

    #[test]
    fn test_function_names_match_implementations() {
        let provider = Provider::new();
        let names: Vec<_> = provider.functions.iter().map(|e| e.name).collect();
        let ownership = crate::ownership::detect();

        assert!(names.contains(&PathExists.name()));
        assert!(names.contains(&PathOwner::new(ownership).name()));
        assert!(names.contains(&PathPermission.name()));
        assert!(names.contains(&HttpRequest::new(Duration::from_secs(1)).name()));
    }

    #[test]
    fn test_serializes_to_json() {
        let json = serde_json::to_string(&Provider::new()).unwrap();
        assert!(json.contains("utilities_local_directory"));
    }
}
