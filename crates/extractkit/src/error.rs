//! Error types for archive operations.
//!
//! Errors are categorized so callers can tell configuration mistakes from
//! transient network trouble, and a cancellation from a genuine failure.

use declarative::Canceled;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of archive errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid source configuration, detected before any I/O.
    Config,
    /// Local archive missing.
    NotFound,
    /// Download failure (transient, retryable by the caller).
    Network,
    /// Archive entry tried to escape the destination.
    Security,
    /// Filesystem write or read failure.
    Filesystem,
    /// Archive could not be parsed.
    Format,
    /// Stopped at a cancellation checkpoint.
    Canceled,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Canceled)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Config => "Invalid archive source",
            Self::NotFound => "Archive not found",
            Self::Network => "Network connectivity issue",
            Self::Security => "Unsafe archive entry",
            Self::Filesystem => "Filesystem error",
            Self::Format => "Invalid archive format",
            Self::Canceled => "Operation canceled",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Config => "Set exactly one of source or url, with a matching file extension",
            Self::NotFound => "Verify the archive path exists and is a regular file",
            Self::Network => "Check the URL and your internet connection, then try again",
            Self::Security => "The archive contains paths outside the destination; do not trust it",
            Self::Filesystem => "Check permissions and free space at the destination",
            Self::Format => "The archive may be corrupted or of a different type",
            Self::Canceled => "Run the operation again",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while staging, fingerprinting or extracting.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Source configuration is invalid.
    #[error("invalid archive source: {0}")]
    InvalidSource(String),

    /// Local archive path does not exist or is not a regular file.
    #[error("archive not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// Remote archive could not be fetched.
    #[error("download failed for {url}: {message}")]
    DownloadFailed {
        url: String,
        message: String,
        /// HTTP status code if the server answered.
        status: Option<u16>,
    },

    /// An entry path would resolve outside the destination.
    #[error("unsafe entry path {entry:?}: escapes {}", destination.display())]
    UnsafeEntryPath { entry: String, destination: PathBuf },

    /// A directory could not be created.
    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The archive could not be opened or read for fingerprinting.
    #[error("cannot read {}: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The archive is not a valid archive of the expected kind.
    #[error("invalid {kind} archive: {message}")]
    InvalidArchive { kind: &'static str, message: String },

    /// A cancellation checkpoint observed a canceled token.
    #[error(transparent)]
    Canceled(#[from] Canceled),
}

impl Error {
    /// Create a download error.
    pub fn download(url: impl Into<String>, message: impl Into<String>, status: Option<u16>) -> Self {
        Self::DownloadFailed {
            url: url.into(),
            message: message.into(),
            status,
        }
    }

    /// Create a file write error with path context.
    pub fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileWriteFailed {
            path: path.into(),
            source,
        }
    }

    /// Create a directory creation error with path context.
    pub fn mkdir(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::DirectoryCreationFailed {
            path: path.into(),
            source,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidSource(_) => ErrorCategory::Config,
            Error::SourceNotFound { .. } => ErrorCategory::NotFound,
            Error::DownloadFailed { .. } => ErrorCategory::Network,
            Error::UnsafeEntryPath { .. } => ErrorCategory::Security,
            Error::DirectoryCreationFailed { .. }
            | Error::FileWriteFailed { .. }
            | Error::SourceUnreadable { .. } => ErrorCategory::Filesystem,
            Error::InvalidArchive { .. } => ErrorCategory::Format,
            Error::Canceled(_) => ErrorCategory::Canceled,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether the operation stopped because it was canceled.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::Canceled(_))
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Self::InvalidArchive {
            kind: "zip",
            message: err.to_string(),
        }
    }
}

/// Warnings produced while extracting. They never abort the extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractWarning {
    /// The entry's mode could not be applied to the written path.
    PermissionApplyFailed { path: PathBuf, message: String },
    /// The entry type is not supported and was skipped.
    UnsupportedEntry { entry: String, kind: String },
}

impl fmt::Display for ExtractWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermissionApplyFailed { path, message } => {
                write!(f, "could not set permissions on {}: {message}", path.display())
            }
            Self::UnsupportedEntry { entry, kind } => {
                write!(f, "skipped unsupported {kind} entry {entry:?}")
            }
        }
    }
}
