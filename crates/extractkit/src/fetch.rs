//! Staging archives on the local filesystem.
//!
//! A local source is used in place. A remote source is streamed into a
//! temporary file owned by the returned [`StagedArchive`]; dropping it
//! removes the file, so nothing leaks on success or failure.
//!
//! # Testing
//!
//! Use [`MockTransport`] to stage remote archives without network access:
//!
//! ```
//! use declarative::CancelToken;
//! use extractkit::{ArchiveKind, ArchiveSource, Fetcher, MockTransport};
//!
//! let mock = MockTransport::new();
//! mock.add_response("https://example.com/a.zip", 200, b"PK".to_vec());
//!
//! let fetcher = Fetcher::new(Box::new(mock));
//! let source = ArchiveSource::RemoteUrl("https://example.com/a.zip".into());
//! let staged = fetcher.stage(&source, ArchiveKind::Zip, &CancelToken::new()).unwrap();
//! assert!(staged.path().exists());
//! ```

use crate::error::{Error, Result};
use crate::types::{ArchiveKind, ArchiveSource};
use declarative::CancelToken;
use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::NamedTempFile;

/// Default timeout for a whole download.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Prefix of temporary download files.
const TEMP_PREFIX: &str = "utilities-download-";

/// Transport for fetching remote archives.
pub trait Transport: Send + Sync {
    /// Start a GET request and return the response body.
    ///
    /// # Errors
    ///
    /// Returns `Error::DownloadFailed` on transport failure or a non-2xx
    /// status, and `Error::Canceled` if `cancel` already fired.
    fn get(&self, url: &str, cancel: &CancelToken) -> Result<Box<dyn Read>>;
}

/// HTTP transport backed by a ureq agent.
pub struct HttpTransport {
    agent: ureq::Agent,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport whose requests never run longer than `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: config.into(),
            timeout,
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, cancel: &CancelToken) -> Result<Box<dyn Read>> {
        cancel.check()?;

        let timeout = cancel
            .remaining()
            .map_or(self.timeout, |remaining| remaining.min(self.timeout));

        log::debug!("GET {url} (timeout {}s)", timeout.as_secs());
        let response = self
            .agent
            .get(url)
            .config()
            .timeout_global(Some(timeout))
            .build()
            .call()
            .map_err(|e| match e {
                ureq::Error::StatusCode(code) => Error::download(url, format!("HTTP {code}"), Some(code)),
                other => Error::download(url, other.to_string(), None),
            })?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(Error::download(url, format!("HTTP {status}"), Some(status)));
        }

        Ok(Box::new(response.into_body().into_reader()))
    }
}

/// Canned response for [`MockTransport`].
#[derive(Debug, Clone)]
struct MockResponse {
    status: u16,
    body: Vec<u8>,
    /// Fail the body read after this many bytes.
    fail_after: Option<usize>,
}

/// In-memory transport for tests.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    /// Create a new empty mock transport. Unknown URLs answer 404.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a response for `url`.
    pub fn add_response(&self, url: impl Into<String>, status: u16, body: Vec<u8>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(
                url.into(),
                MockResponse {
                    status,
                    body,
                    fail_after: None,
                },
            );
        }
    }

    /// Register a 200 response whose body breaks after `fail_after` bytes.
    pub fn add_broken_body(&self, url: impl Into<String>, body: Vec<u8>, fail_after: usize) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(
                url.into(),
                MockResponse {
                    status: 200,
                    body,
                    fail_after: Some(fail_after),
                },
            );
        }
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Transport for MockTransport {
    fn get(&self, url: &str, cancel: &CancelToken) -> Result<Box<dyn Read>> {
        cancel.check()?;
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }

        let response = self
            .responses
            .lock()
            .ok()
            .and_then(|r| r.get(url).cloned())
            .unwrap_or(MockResponse {
                status: 404,
                body: Vec::new(),
                fail_after: None,
            });

        if !(200..300).contains(&response.status) {
            let status = response.status;
            return Err(Error::download(url, format!("HTTP {status}"), Some(status)));
        }

        match response.fail_after {
            Some(limit) => Ok(Box::new(BrokenReader {
                inner: Cursor::new(response.body),
                remaining: limit,
            })),
            None => Ok(Box::new(Cursor::new(response.body))),
        }
    }
}

/// Reader that errors after a fixed number of bytes.
struct BrokenReader {
    inner: Cursor<Vec<u8>>,
    remaining: usize,
}

impl Read for BrokenReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
        }
        let len = buf.len().min(self.remaining);
        let n = self.inner.read(&mut buf[..len])?;
        self.remaining -= n;
        Ok(n)
    }
}

/// An archive ready to be read from the local filesystem.
#[derive(Debug)]
pub enum StagedArchive {
    /// The configured local path, used in place.
    Local(PathBuf),
    /// A downloaded temporary file, removed on drop.
    Downloaded(NamedTempFile),
}

impl StagedArchive {
    pub fn path(&self) -> &Path {
        match self {
            Self::Local(path) => path,
            Self::Downloaded(file) => file.path(),
        }
    }
}

/// Stages archive sources through a [`Transport`].
pub struct Fetcher {
    transport: Box<dyn Transport>,
    temp_dir: Option<PathBuf>,
}

impl Fetcher {
    /// Create a fetcher using the given transport and the system temp dir.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            temp_dir: None,
        }
    }

    /// Create a fetcher with the default HTTP transport.
    pub fn http(timeout: Duration) -> Self {
        Self::new(Box::new(HttpTransport::new(timeout)))
    }

    /// Put downloads in `dir` instead of the system temp dir.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Make `source` readable from the local filesystem.
    ///
    /// # Errors
    ///
    /// `Error::SourceNotFound` for a missing or non-regular local path,
    /// `Error::DownloadFailed` for any remote failure, `Error::Canceled`
    /// when the token fires during the download.
    pub fn stage(&self, source: &ArchiveSource, kind: ArchiveKind, cancel: &CancelToken) -> Result<StagedArchive> {
        match source {
            ArchiveSource::LocalPath(path) => {
                let is_file = std::fs::metadata(path).is_ok_and(|m| m.is_file());
                if !is_file {
                    return Err(Error::SourceNotFound { path: path.clone() });
                }
                Ok(StagedArchive::Local(path.clone()))
            }
            ArchiveSource::RemoteUrl(url) => self.download(url, kind, cancel).map(StagedArchive::Downloaded),
        }
    }

    fn download(&self, url: &str, kind: ArchiveKind, cancel: &CancelToken) -> Result<NamedTempFile> {
        // The request has to succeed before a temp file exists.
        let mut body = self.transport.get(url, cancel)?;

        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX).suffix(kind.extension());
        let mut file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| Error::write(self.temp_dir.clone().unwrap_or_else(std::env::temp_dir), e))?;

        let mut buffer = [0u8; 65536];
        let mut total: u64 = 0;
        loop {
            cancel.check()?;
            let n = body
                .read(&mut buffer)
                .map_err(|e| Error::download(url, format!("reading response body: {e}"), None))?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n])
                .map_err(|e| Error::write(file.path(), e))?;
            total += n as u64;
        }
        file.flush().map_err(|e| Error::write(file.path(), e))?;

        log::debug!("Downloaded {total} bytes from {url} to {}", file.path().display());
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn leftovers(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_stage_local_file() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("a.zip");
        std::fs::write(&archive, b"PK").unwrap();

        let fetcher = Fetcher::new(Box::new(MockTransport::new()));
        let staged = fetcher
            .stage(&ArchiveSource::LocalPath(archive.clone()), ArchiveKind::Zip, &CancelToken::new())
            .unwrap();
        assert_eq!(staged.path(), archive);
    }

    #[test]
    fn test_stage_missing_local_file() {
        let temp = TempDir::new().unwrap();
        let fetcher = Fetcher::new(Box::new(MockTransport::new()));

        let missing = ArchiveSource::LocalPath(temp.path().join("missing.zip"));
        let err = fetcher.stage(&missing, ArchiveKind::Zip, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, Error::SourceNotFound { .. }));

        // A directory is not a regular file either
        let dir = ArchiveSource::LocalPath(temp.path().to_path_buf());
        let err = fetcher.stage(&dir, ArchiveKind::Zip, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, Error::SourceNotFound { .. }));
    }

    #[test]
    fn test_download_writes_temp_file_and_cleans_up_on_drop() {
        let temp = TempDir::new().unwrap();
        let mock = MockTransport::new();
        mock.add_response("https://example.com/a.zip", 200, b"archive bytes".to_vec());

        let fetcher = Fetcher::new(Box::new(mock.clone())).with_temp_dir(temp.path());
        let source = ArchiveSource::RemoteUrl("https://example.com/a.zip".into());
        let staged = fetcher.stage(&source, ArchiveKind::Zip, &CancelToken::new()).unwrap();

        let path = staged.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"archive bytes");
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(TEMP_PREFIX));
        assert!(name.ends_with(".zip"));
        assert_eq!(mock.requests(), vec!["https://example.com/a.zip".to_string()]);

        drop(staged);
        assert!(!path.exists());
        assert_eq!(leftovers(temp.path()), 0);
    }

    #[test]
    fn test_http_404_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let mock = MockTransport::new();
        mock.add_response("https://example.com/gone.zip", 404, Vec::new());

        let fetcher = Fetcher::new(Box::new(mock)).with_temp_dir(temp.path());
        let source = ArchiveSource::RemoteUrl("https://example.com/gone.zip".into());
        let err = fetcher.stage(&source, ArchiveKind::Zip, &CancelToken::new()).unwrap_err();

        match err {
            Error::DownloadFailed { status, .. } => assert_eq!(status, Some(404)),
            other => panic!("Expected DownloadFailed, got {other:?}"),
        }
        assert_eq!(leftovers(temp.path()), 0);
    }

    #[test]
    fn test_broken_body_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let mock = MockTransport::new();
        mock.add_broken_body("https://example.com/a.zip", vec![7u8; 1024], 100);

        let fetcher = Fetcher::new(Box::new(mock)).with_temp_dir(temp.path());
        let source = ArchiveSource::RemoteUrl("https://example.com/a.zip".into());
        let err = fetcher.stage(&source, ArchiveKind::Zip, &CancelToken::new()).unwrap_err();

        assert!(matches!(err, Error::DownloadFailed { status: None, .. }));
        assert_eq!(leftovers(temp.path()), 0);
    }

    #[test]
    fn test_canceled_download() {
        let temp = TempDir::new().unwrap();
        let mock = MockTransport::new();
        mock.add_response("https://example.com/a.zip", 200, b"bytes".to_vec());
        let token = CancelToken::new();
        token.cancel();

        let fetcher = Fetcher::new(Box::new(mock.clone())).with_temp_dir(temp.path());
        let source = ArchiveSource::RemoteUrl("https://example.com/a.zip".into());
        let err = fetcher.stage(&source, ArchiveKind::Zip, &token).unwrap_err();

        assert!(err.is_canceled());
        assert!(mock.requests().is_empty());
        assert_eq!(leftovers(temp.path()), 0);
    }
}
