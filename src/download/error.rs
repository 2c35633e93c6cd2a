//! Error types for the download module.
//!
//! This module defines structured errors for fetch operations and the coarse
//! [`FailureKind`] taxonomy used in run summaries.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while fetching and persisting one document.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS, body read).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request did not complete within the configured timeout.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Any response status other than 200.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response is not a PDF.
    #[error(
        "invalid content type for {url}: {} (expected application/pdf)",
        .content_type.as_deref().unwrap_or("<missing>")
    )]
    ContentType {
        /// The URL whose response was rejected.
        url: String,
        /// The `Content-Type` header value, if any.
        content_type: Option<String>,
    },

    /// The server answered 200 with a zero-length body.
    #[error("downloaded 0 bytes for {url}; not creating file")]
    EmptyBody {
        /// The URL that returned no content.
        url: String,
    },

    /// File system error while probing, creating or writing the destination.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The candidate is not an absolute http(s) URL.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a content-type error.
    pub fn content_type(url: impl Into<String>, content_type: Option<String>) -> Self {
        Self::ContentType {
            url: url.into(),
            content_type,
        }
    }

    /// Creates an empty-body error.
    pub fn empty_body(url: impl Into<String>) -> Self {
        Self::EmptyBody { url: url.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Maps a reqwest error, separating timeouts from other transport failures.
    pub fn from_request(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::timeout(url)
        } else {
            Self::network(url, source)
        }
    }

    /// Returns the summary category for this error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => FailureKind::Network,
            Self::HttpStatus { .. } => FailureKind::HttpStatus,
            Self::ContentType { .. } => FailureKind::ContentType,
            Self::EmptyBody { .. } => FailureKind::EmptyBody,
            Self::Io { .. } => FailureKind::FileSystem,
            Self::InvalidUrl { .. } => FailureKind::InvalidUrl,
        }
    }
}

/// Coarse failure categories reported per URL.
///
/// No category is treated as transient: every failure is retried only by
/// running the tool again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transport-level failure, including timeouts.
    Network,
    /// Non-200 response status.
    HttpStatus,
    /// Response was not `application/pdf`.
    ContentType,
    /// Response body was empty.
    EmptyBody,
    /// Create, write or probe failure on the destination file.
    FileSystem,
    /// Candidate could not be parsed as an absolute http(s) URL.
    InvalidUrl,
    /// The download task panicked or was aborted.
    Internal,
}

impl FailureKind {
    /// Returns the stable label used in logs and JSON output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::HttpStatus => "http_status",
            Self::ContentType => "content_type",
            Self::EmptyBody => "empty_body",
            Self::FileSystem => "file_system",
            Self::InvalidUrl => "invalid_url",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_timeout_display() {
        let error = DownloadError::timeout("https://example.com/file/1/");
        assert!(error.to_string().contains("timeout"));
        assert!(error.to_string().contains("https://example.com/file/1/"));
        assert_eq!(error.kind(), FailureKind::Network);
    }

    #[test]
    fn test_download_error_http_status_display() {
        let error = DownloadError::http_status("https://example.com/file/1/", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(
            msg.contains("https://example.com/file/1/"),
            "Expected URL in: {msg}"
        );
        assert_eq!(error.kind(), FailureKind::HttpStatus);
    }

    #[test]
    fn test_download_error_content_type_display() {
        let error = DownloadError::content_type(
            "https://example.com/file/1/",
            Some("text/html; charset=utf-8".to_string()),
        );
        let msg = error.to_string();
        assert!(msg.contains("text/html"), "Expected header in: {msg}");
        assert!(msg.contains("expected application/pdf"));
        assert_eq!(error.kind(), FailureKind::ContentType);

        let missing = DownloadError::content_type("https://example.com/file/1/", None);
        assert!(missing.to_string().contains("<missing>"));
    }

    #[test]
    fn test_download_error_empty_body_kind() {
        let error = DownloadError::empty_body("https://example.com/file/1/");
        assert!(error.to_string().contains("0 bytes"));
        assert_eq!(error.kind(), FailureKind::EmptyBody);
    }

    #[test]
    fn test_download_error_io_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = DownloadError::io(PathBuf::from("/tmp/test.pdf"), io_error);
        let msg = error.to_string();
        assert!(msg.contains("/tmp/test.pdf"), "Expected path in: {msg}");
        assert_eq!(error.kind(), FailureKind::FileSystem);
    }

    #[test]
    fn test_download_error_invalid_url_display() {
        let error = DownloadError::invalid_url("not-a-url");
        let msg = error.to_string();
        assert!(msg.contains("invalid URL"), "Expected 'invalid URL' in: {msg}");
        assert!(msg.contains("not-a-url"), "Expected URL in: {msg}");
        assert_eq!(error.kind(), FailureKind::InvalidUrl);
    }

    #[test]
    fn test_failure_kind_serializes_as_snake_case() {
        let json = serde_json::to_string(&FailureKind::ContentType).unwrap();
        assert_eq!(json, "\"content_type\"");
        assert_eq!(FailureKind::FileSystem.to_string(), "file_system");
    }
}
