//! Archive extraction resource - `utilities_extract_{zip,tar_gz,tar}`

use anyhow::{Context, Result};
use declarative::{ApplyContext, Diagnostics, Outcome, Resource};
use extractkit::{ArchiveKind, ArchiveSource, Client, Extraction};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Declared configuration of one extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractConfig {
    /// Local archive path
    pub source: Option<String>,
    /// Remote archive URL
    pub url: Option<String>,
    /// Directory the archive is extracted into
    pub destination: PathBuf,
}

impl ExtractConfig {
    fn archive_source(&self, kind: ArchiveKind) -> extractkit::Result<ArchiveSource> {
        ArchiveSource::from_options(self.source.as_deref(), self.url.as_deref(), kind)
    }
}

/// What one extraction put on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    pub destination: PathBuf,

    /// Hex digest of the local source; absent for URL sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_fingerprint: Option<String>,

    /// Paths created by the extraction, in creation order
    #[serde(default)]
    pub created_paths: Vec<PathBuf>,

    #[serde(default)]
    pub destination_was_created: bool,

    /// Set when a read found the source changed since the last extraction
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub source_drifted: bool,
}

impl ExtractionRecord {
    fn archive_source(&self) -> Option<ArchiveSource> {
        match (&self.source, &self.url) {
            (Some(path), _) => Some(ArchiveSource::LocalPath(path.clone())),
            (None, Some(url)) => Some(ArchiveSource::RemoteUrl(url.clone())),
            (None, None) => None,
        }
    }

    fn same_origin(&self, source: &ArchiveSource, destination: &Path) -> bool {
        self.archive_source().as_ref() == Some(source) && self.destination == destination
    }
}

/// Extracts one kind of archive into a destination directory
pub struct ExtractArchive {
    kind: ArchiveKind,
    client: Client,
}

impl ExtractArchive {
    pub fn new(kind: ArchiveKind, client: Client) -> Self {
        Self { kind, client }
    }

    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    /// Fingerprint, stage and extract, producing a fresh record
    fn extract(&self, ctx: &ApplyContext, config: &ExtractConfig) -> Result<Outcome<ExtractionRecord>> {
        let source = config.archive_source(self.kind)?;

        let fingerprint = self
            .client
            .fingerprint(&source)
            .with_context(|| format!("File Hash Calculation Failed for {source}"))?;

        let extraction = self
            .client
            .extract(&source, self.kind, &config.destination, &ctx.cancel)
            .map_err(|e| {
                let category = e.category();
                anyhow::Error::new(e).context(format!(
                    "Extraction Failed: {} archive {source} into {} ({}; {})",
                    self.kind,
                    config.destination.display(),
                    category.description(),
                    category.advice()
                ))
            })?;

        let diagnostics = warnings_of(&extraction);
        let (source, url) = match source {
            ArchiveSource::LocalPath(path) => (Some(path), None),
            ArchiveSource::RemoteUrl(url) => (None, Some(url)),
        };
        let record = ExtractionRecord {
            source,
            url,
            destination: config.destination.clone(),
            content_fingerprint: fingerprint.map(|f| f.as_str().to_string()),
            created_paths: extraction.created_paths,
            destination_was_created: extraction.destination_created,
            source_drifted: false,
        };

        Ok(Outcome::with_diagnostics(record, diagnostics))
    }
}

fn warnings_of(extraction: &Extraction) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    for warning in &extraction.warnings {
        log::warn!("{warning}");
        diagnostics.warn("Extraction Warning", warning.to_string());
    }
    diagnostics
}

impl Resource for ExtractArchive {
    type Config = ExtractConfig;
    type State = ExtractionRecord;

    fn type_name(&self) -> &'static str {
        crate::provider::extract_type_name(self.kind)
    }

    fn validate(&self, config: &ExtractConfig) -> Result<()> {
        config.archive_source(self.kind)?;
        Ok(())
    }

    fn create(&self, ctx: &ApplyContext, config: &ExtractConfig) -> Result<Outcome<ExtractionRecord>> {
        self.extract(ctx, config)
    }

    fn read(&self, _ctx: &ApplyContext, prior: &ExtractionRecord) -> Result<Outcome<ExtractionRecord>> {
        // URL content is treated as immutable
        let Some(path) = prior.source.as_ref() else {
            return Ok(Outcome::ok(prior.clone()));
        };

        let current = extractkit::Fingerprint::of_file(path)
            .with_context(|| format!("File Hash Calculation Failed for {}", path.display()))?;

        if prior.content_fingerprint.as_deref() == Some(current.as_str()) {
            return Ok(Outcome::ok(prior.clone()));
        }

        log::info!("Source {} changed since last extraction", path.display());
        let mut diagnostics = Diagnostics::new();
        diagnostics.warn(
            "File Hash Mismatch Detected",
            format!(
                "The hash of {} has changed, marking the resource for update",
                path.display()
            ),
        );

        let mut record = prior.clone();
        record.content_fingerprint = Some(current.as_str().to_string());
        record.source_drifted = true;
        Ok(Outcome::with_diagnostics(record, diagnostics))
    }

    /// Re-extract when the source, destination or source content changed.
    ///
    /// Into the same destination the stored paths are the union of the prior
    /// and new ones rather than a replacement, so Delete still finds what the
    /// first extraction created.
    fn update(
        &self,
        ctx: &ApplyContext,
        config: &ExtractConfig,
        prior: &ExtractionRecord,
    ) -> Result<Outcome<ExtractionRecord>> {
        if !self.needs_update(config, prior)? {
            log::debug!("{} unchanged, skipping extraction", config.destination.display());
            return Ok(Outcome::ok(prior.clone()));
        }

        // Previously extracted files are overwritten in place, never removed
        let outcome = self.extract(ctx, config)?;
        if prior.destination != config.destination {
            return Ok(outcome);
        }

        Ok(outcome.map(|fresh| merge_records(prior, fresh)))
    }

    fn delete(&self, _ctx: &ApplyContext, prior: &ExtractionRecord) -> Result<Outcome<()>> {
        let mut diagnostics = Diagnostics::new();

        for path in prior.created_paths.iter().rev() {
            let removed = match fs::symlink_metadata(path) {
                Ok(meta) if meta.is_dir() => fs::remove_dir(path),
                Ok(_) => fs::remove_file(path),
                Err(e) => Err(e),
            };

            match removed {
                Ok(()) => log::debug!("Removed {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::debug!("Already gone: {}", path.display());
                }
                Err(e) => {
                    log::warn!("Could not delete {}: {e}", path.display());
                    diagnostics.warn(
                        "File Deletion Failed",
                        format!("Could not delete '{}': {e}", path.display()),
                    );
                }
            }
        }

        if prior.destination_was_created {
            match fs::remove_dir(&prior.destination) {
                Ok(()) => log::debug!("Removed {}", prior.destination.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    diagnostics.warn(
                        "Destination Not Removed",
                        format!("Left '{}' in place: {e}", prior.destination.display()),
                    );
                }
            }
        }

        Ok(Outcome::with_diagnostics((), diagnostics))
    }

    fn needs_update(&self, config: &ExtractConfig, prior: &ExtractionRecord) -> Result<bool> {
        // Let update surface an invalid source
        let Ok(source) = config.archive_source(self.kind) else {
            return Ok(true);
        };
        if !prior.same_origin(&source, &config.destination) || prior.source_drifted {
            return Ok(true);
        }

        let Some(ArchiveSource::LocalPath(path)) = prior.archive_source() else {
            return Ok(false);
        };

        match extractkit::Fingerprint::of_file(&path) {
            Ok(current) => Ok(prior.content_fingerprint.as_deref() != Some(current.as_str())),
            // Let update surface the read error
            Err(_) => Ok(true),
        }
    }
}

/// Combine a re-extraction into the same destination with the prior record
///
/// Paths the prior extraction created stay listed (the new extraction sees
/// their directories as pre-existing), followed by anything new.
fn merge_records(prior: &ExtractionRecord, fresh: ExtractionRecord) -> ExtractionRecord {
    let mut seen = HashSet::new();
    let created_paths = prior
        .created_paths
        .iter()
        .chain(fresh.created_paths.iter())
        .filter(|p| seen.insert((*p).clone()))
        .cloned()
        .collect();

    ExtractionRecord {
        created_paths,
        destination_was_created: prior.destination_was_created || fresh.destination_was_created,
        ..fresh
    }
}
