//! Provider configuration file
//!
//! ```toml
//! [provider]
//! http_timeout_secs = 120
//! protected_paths = ["/", "/etc"]
//!
//! [[extract_zip]]
//! name = "site"
//! source = "~/build/site.zip"
//! destination = "/srv/www/site"
//!
//! [[local_directory]]
//! name = "cache"
//! path = "/var/cache/myapp"
//! permissions = "0750"
//! ```

use crate::paths;
use crate::protected::ProtectedPaths;
use crate::resource::extract_archive::ExtractConfig;
use crate::resource::local_directory::DirectoryConfig;
use anyhow::{Context, Result, bail};
use extractkit::ArchiveKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Provider Config
// ============================================================================

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub provider: ProviderSettings,

    #[serde(default)]
    pub extract_zip: Vec<ExtractBlock>,

    #[serde(default)]
    pub extract_tar_gz: Vec<ExtractBlock>,

    #[serde(default)]
    pub extract_tar: Vec<ExtractBlock>,

    #[serde(default)]
    pub local_directory: Vec<DirectoryBlock>,
}

/// Provider-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Replaces the default protected-path denylist when set
    #[serde(default)]
    pub protected_paths: Option<Vec<String>>,

    /// Timeout for archive downloads and HTTP requests
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Instances worked on in parallel
    #[serde(default)]
    pub jobs: Option<usize>,
}

fn default_http_timeout() -> u64 {
    300
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            protected_paths: None,
            http_timeout_secs: default_http_timeout(),
            jobs: None,
        }
    }
}

/// One `[[extract_*]]` block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractBlock {
    pub name: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    pub destination: String,
}

/// One `[[local_directory]]` block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryBlock {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub permissions: Option<String>,
    #[serde(default)]
    pub force: bool,
}

impl ProviderConfig {
    /// Load the configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load the configuration file, or an empty configuration if it is missing
    pub fn load_optional(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn protected_paths(&self) -> ProtectedPaths {
        self.provider
            .protected_paths
            .as_ref()
            .map_or_else(ProtectedPaths::default, ProtectedPaths::new)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.http_timeout_secs)
    }

    fn extract_blocks(&self, kind: ArchiveKind) -> &[ExtractBlock] {
        match kind {
            ArchiveKind::Zip => &self.extract_zip,
            ArchiveKind::TarGz => &self.extract_tar_gz,
            ArchiveKind::Tar => &self.extract_tar,
        }
    }

    /// Declared archive extractions of one kind, keyed by name
    pub fn desired_extracts(&self, kind: ArchiveKind) -> Result<BTreeMap<String, ExtractConfig>> {
        let mut desired = BTreeMap::new();
        for block in self.extract_blocks(kind) {
            let config = ExtractConfig {
                source: block.source.as_deref().map(expand_string),
                url: block.url.clone(),
                destination: paths::expand(&block.destination),
            };
            if desired.insert(block.name.clone(), config).is_some() {
                bail!("Duplicate extract_{} block named '{}'", block_suffix(kind), block.name);
            }
        }
        Ok(desired)
    }

    /// Declared local directories, keyed by name
    pub fn desired_directories(&self) -> Result<BTreeMap<String, DirectoryConfig>> {
        let mut desired = BTreeMap::new();
        for block in &self.local_directory {
            let config = DirectoryConfig {
                path: paths::expand(&block.path),
                user: block.user.clone(),
                group: block.group.clone(),
                permissions: block.permissions.clone(),
                force: block.force,
            };
            if desired.insert(block.name.clone(), config).is_some() {
                bail!("Duplicate local_directory block named '{}'", block.name);
            }
        }
        Ok(desired)
    }
}

fn block_suffix(kind: ArchiveKind) -> &'static str {
    match kind {
        ArchiveKind::Zip => "zip",
        ArchiveKind::TarGz => "tar_gz",
        ArchiveKind::Tar => "tar",
    }
}

fn expand_string(value: &str) -> String {
    paths::expand(value).to_string_lossy().into_owned()
}

// ============================================================================
// Tests
// ============================================================================
