//! # extractkit
//!
//! Stage, fingerprint and extract archives.
//!
//! This crate provides functionality for:
//! - Resolving an archive source (local path or http(s) URL)
//! - Downloading remote archives into self-cleaning temporary files
//! - Extracting zip, tar.gz and tar archives with path-traversal protection
//! - Fingerprinting archive content for drift detection
//!
//! ## Example
//!
//! ```no_run
//! use declarative::CancelToken;
//! use extractkit::{ArchiveKind, ArchiveSource, Client};
//! use std::path::Path;
//!
//! let client = Client::new();
//! let source = ArchiveSource::from_options(Some("/tmp/site.zip"), None, ArchiveKind::Zip).unwrap();
//!
//! let extraction = client
//!     .extract(&source, ArchiveKind::Zip, Path::new("/srv/site"), &CancelToken::new())
//!     .expect("extraction failed");
//!
//! for path in &extraction.created_paths {
//!     println!("created {}", path.display());
//! }
//! ```
//!
//! ## Safety
//!
//! Entry names are resolved component by component. Any name whose `..`
//! components would climb above the destination fails with
//! [`Error::UnsafeEntryPath`] before anything is written for it.

#![warn(clippy::all)]

pub mod error;
pub mod extract;
pub mod fetch;
pub mod fingerprint;
pub mod types;

pub use error::{Error, ErrorCategory, ExtractWarning, Result};
pub use fetch::{Fetcher, HttpTransport, MockTransport, StagedArchive, Transport};
pub use fingerprint::Fingerprint;
pub use types::{ArchiveKind, ArchiveSource, Extraction};

use declarative::CancelToken;
use std::path::Path;
use std::time::Duration;

/// High-level client combining staging, fingerprinting and extraction.
pub struct Client {
    fetcher: Fetcher,
}

impl Client {
    /// Create a client with the default HTTP transport.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(fetch::DEFAULT_TIMEOUT)
    }

    /// Create a client whose downloads time out after `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            fetcher: Fetcher::http(timeout),
        }
    }

    /// Create a client with a custom fetcher (useful for testing).
    #[must_use]
    pub fn with_fetcher(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Fingerprint a local source. Remote sources have no fingerprint.
    pub fn fingerprint(&self, source: &ArchiveSource) -> Result<Option<Fingerprint>> {
        match source {
            ArchiveSource::LocalPath(path) => Fingerprint::of_file(path).map(Some),
            ArchiveSource::RemoteUrl(_) => Ok(None),
        }
    }

    /// Stage `source` and extract it into `destination`.
    ///
    /// A downloaded archive is removed before this returns, whatever the
    /// outcome.
    pub fn extract(
        &self,
        source: &ArchiveSource,
        kind: ArchiveKind,
        destination: &Path,
        cancel: &CancelToken,
    ) -> Result<Extraction> {
        cancel.check()?;
        let staged = self.fetcher.stage(source, kind, cancel)?;
        log::info!("Extracting {source} into {}", destination.display());
        extract::extract(staged.path(), kind, destination, cancel)
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}
