use crate::resource::extract_archive::ExtractionRecord;
use crate::resource::local_directory::DirectoryRecord;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use extractkit::ArchiveKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// ============================================================================
// State Structures
// ============================================================================

/// Recorded state of every managed instance, keyed by instance name
///
/// The orchestrator owns this; resources only ever see one record at a time.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProviderState {
    #[serde(default)]
    pub extract_zip: BTreeMap<String, ExtractionRecord>,

    #[serde(default)]
    pub extract_tar_gz: BTreeMap<String, ExtractionRecord>,

    #[serde(default)]
    pub extract_tar: BTreeMap<String, ExtractionRecord>,

    #[serde(default)]
    pub local_directory: BTreeMap<String, DirectoryRecord>,

    /// Generated bcrypt hashes keyed by data source id
    #[serde(default)]
    pub bcrypt_hash: BTreeMap<String, String>,

    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,
}

// ============================================================================
// ProviderState Implementation
// ============================================================================

impl ProviderState {
    /// Load state from disk, or return default if file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: ProviderState = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content = toml::to_string_pretty(&self).context("Failed to serialize state to TOML")?;

        fs::write(path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    /// Update the last_updated timestamp and save
    pub fn touch(&mut self, path: &Path) -> Result<()> {
        self.last_updated = Utc::now();
        self.save(path)
    }

    // ========================================================================
    // Record Helpers
    // ========================================================================

    pub fn extracts(&self, kind: ArchiveKind) -> &BTreeMap<String, ExtractionRecord> {
        match kind {
            ArchiveKind::Zip => &self.extract_zip,
            ArchiveKind::TarGz => &self.extract_tar_gz,
            ArchiveKind::Tar => &self.extract_tar,
        }
    }

    pub fn extracts_mut(&mut self, kind: ArchiveKind) -> &mut BTreeMap<String, ExtractionRecord> {
        match kind {
            ArchiveKind::Zip => &mut self.extract_zip,
            ArchiveKind::TarGz => &mut self.extract_tar_gz,
            ArchiveKind::Tar => &mut self.extract_tar,
        }
    }

    /// Addresses of all recorded resource instances, `<type>.<name>`
    pub fn addresses(&self) -> Vec<String> {
        let mut addresses = Vec::new();
        for kind in crate::provider::ARCHIVE_KINDS {
            let type_name = crate::provider::extract_type_name(kind);
            addresses.extend(self.extracts(kind).keys().map(|n| format!("{type_name}.{n}")));
        }
        addresses.extend(
            self.local_directory
                .keys()
                .map(|n| format!("{}.{n}", crate::provider::LOCAL_DIRECTORY)),
        );
        addresses
    }

    /// Render one recorded instance as TOML
    pub fn show(&self, address: &str) -> Result<Option<String>> {
        let Some((type_name, name)) = address.split_once('.') else {
            return Ok(None);
        };

        if type_name == crate::provider::LOCAL_DIRECTORY {
            return self
                .local_directory
                .get(name)
                .map(|r| toml::to_string_pretty(r).context("Failed to render record"))
                .transpose();
        }

        for kind in crate::provider::ARCHIVE_KINDS {
            if type_name == crate::provider::extract_type_name(kind) {
                return self
                    .extracts(kind)
                    .get(name)
                    .map(|r| toml::to_string_pretty(r).context("Failed to render record"))
                    .transpose();
            }
        }
        Ok(None)
    }
}

impl Default for ProviderState {
    fn default() -> Self {
        Self {
            extract_zip: BTreeMap::new(),
            extract_tar_gz: BTreeMap::new(),
            extract_tar: BTreeMap::new(),
            local_directory: BTreeMap::new(),
            bcrypt_hash: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
