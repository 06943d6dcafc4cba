//! Source and result types for archive operations.

use crate::error::{Error, ExtractWarning, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveKind {
    /// `.zip`
    Zip,
    /// gzip-compressed tarball, `.tar.gz` or `.tgz`
    TarGz,
    /// Uncompressed tarball, `.tar`
    Tar,
}

impl ArchiveKind {
    /// Canonical file extension, including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Zip => ".zip",
            Self::TarGz => ".tar.gz",
            Self::Tar => ".tar",
        }
    }

    /// Short name used in messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
            Self::Tar => "tar",
        }
    }

    /// Pattern a remote URL must match for this archive kind.
    fn url_pattern(&self) -> &'static str {
        match self {
            Self::Zip => r"^https?://.+\.zip$",
            Self::TarGz => r"^https?://.+\.(tar\.gz|tgz)$",
            Self::Tar => r"^https?://.+\.tar$",
        }
    }

    /// Whether `url` is an http(s) URL ending in this kind's extension.
    pub fn matches_url(&self, url: &str) -> bool {
        Regex::new(self.url_pattern()).is_ok_and(|re| re.is_match(url))
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Where an archive comes from. Exactly one source is ever set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveSource {
    /// Archive already on the local filesystem.
    LocalPath(PathBuf),
    /// Archive to download over http(s).
    RemoteUrl(String),
}

impl ArchiveSource {
    /// Build a source from the two optional configuration fields.
    ///
    /// Empty strings count as unset. Fails with [`Error::InvalidSource`]
    /// when both or neither are set, or when the URL does not end in the
    /// archive kind's extension. No I/O happens here.
    pub fn from_options(source: Option<&str>, url: Option<&str>, kind: ArchiveKind) -> Result<Self> {
        let source = source.filter(|s| !s.is_empty());
        let url = url.filter(|u| !u.is_empty());

        match (source, url) {
            (Some(_), Some(_)) => Err(Error::InvalidSource(
                "only one of source or url can be set".to_string(),
            )),
            (None, None) => Err(Error::InvalidSource(
                "one of source or url must be set".to_string(),
            )),
            (Some(path), None) => Ok(Self::LocalPath(PathBuf::from(path))),
            (None, Some(url)) => {
                if kind.matches_url(url) {
                    Ok(Self::RemoteUrl(url.to_string()))
                } else {
                    Err(Error::InvalidSource(format!(
                        "url must be an http(s) URL ending in {}: {url}",
                        kind.extension()
                    )))
                }
            }
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteUrl(_))
    }
}

impl fmt::Display for ArchiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalPath(path) => write!(f, "{}", path.display()),
            Self::RemoteUrl(url) => write!(f, "{url}"),
        }
    }
}

/// What an extraction did to the filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Paths written or created, in creation order. Never contains the
    /// destination root or directories that existed beforehand.
    pub created_paths: Vec<PathBuf>,
    /// Whether the destination directory did not exist before.
    pub destination_created: bool,
    /// Non-fatal problems met along the way.
    pub warnings: Vec<ExtractWarning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_source() {
        let source = ArchiveSource::from_options(Some("/tmp/a.zip"), None, ArchiveKind::Zip).unwrap();
        assert_eq!(source, ArchiveSource::LocalPath(PathBuf::from("/tmp/a.zip")));
        assert!(!source.is_remote());
    }

    #[test]
    fn test_remote_source() {
        let source = ArchiveSource::from_options(
            None,
            Some("https://example.com/pkg.zip"),
            ArchiveKind::Zip,
        )
        .unwrap();
        assert!(source.is_remote());
        assert_eq!(source.to_string(), "https://example.com/pkg.zip");
    }

    #[test]
    fn test_both_sources_rejected() {
        let err = ArchiveSource::from_options(
            Some("/tmp/a.zip"),
            Some("https://example.com/a.zip"),
            ArchiveKind::Zip,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSource(_)));
    }

    #[test]
    fn test_no_source_rejected() {
        let err = ArchiveSource::from_options(Some(""), None, ArchiveKind::Zip).unwrap_err();
        assert!(err.to_string().contains("must be set"));
    }

    #[test]
    fn test_url_suffix_must_match_kind() {
        assert!(ArchiveKind::Zip.matches_url("http://host/a.zip"));
        assert!(!ArchiveKind::Zip.matches_url("https://host/a.tar"));
        assert!(!ArchiveKind::Zip.matches_url("ftp://host/a.zip"));
        assert!(!ArchiveKind::Zip.matches_url("https://.zip"));
        assert!(ArchiveKind::TarGz.matches_url("https://host/a.tar.gz"));
        assert!(ArchiveKind::TarGz.matches_url("https://host/a.tgz"));
        assert!(ArchiveKind::Tar.matches_url("https://host/a.tar"));
        assert!(!ArchiveKind::Tar.matches_url("https://host/a.tar.gz"));

        let err = ArchiveSource::from_options(None, Some("https://host/a.tar"), ArchiveKind::Zip)
            .unwrap_err();
        assert!(err.to_string().contains(".zip"));
    }
}
