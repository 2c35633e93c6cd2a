//! Concurrent fetch-and-persist of PDF documents.
//!
//! This module provides functionality for fetching documents over HTTP/HTTPS,
//! validating them, and writing each one to a new file under a flat output
//! directory.
//!
//! # Features
//!
//! - Bounded concurrency with a semaphore
//! - Fixed per-host pause between requests
//! - Filename extraction from Content-Disposition headers, with a URL fallback
//! - Existing files are never overwritten
//! - Structured error types with full context
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::download::{HttpClient, ensure_output_dir};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let output_dir = Path::new("PDFs");
//! ensure_output_dir(output_dir).await?;
//! let client = HttpClient::new()?;
//! let outcome = client
//!     .fetch_document("https://example.com/file/1/", output_dir)
//!     .await?;
//! println!("Saved: {}", outcome.path().display());
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod engine;
mod error;
mod filename;
pub mod rate_limiter;

use std::path::Path;
use std::time::Duration;

use tracing::debug;

pub use client::{FetchOutcome, HttpClient};
pub use constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_RATE_LIMIT_MS, REQUEST_TIMEOUT_SECS, STALE_PARTIAL_AGE_SECS,
};
pub use engine::{
    DEFAULT_CONCURRENCY, DownloadEngine, DownloadStats, EngineError, RunControl, RunSummary,
    SkipReason, UrlOutcome, UrlReport,
};
pub use error::{DownloadError, FailureKind};
pub use filename::{destination_filename, fallback_filename_from_url};
pub use rate_limiter::{RateLimiter, extract_host};

/// Creates the output directory (and missing parents) if it does not exist.
///
/// New directories get mode `0755` on unix. Hidden `.part` files older than
/// [`STALE_PARTIAL_AGE_SECS`], left by runs killed mid-write, are removed.
///
/// # Errors
///
/// Returns the underlying IO error if the directory cannot be created, or if
/// the path exists and is not a directory.
pub async fn ensure_output_dir(path: &Path) -> std::io::Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o755);
    builder.create(path).await?;
    client::remove_stale_partials(path, Duration::from_secs(STALE_PARTIAL_AGE_SECS)).await;
    debug!(path = %path.display(), "output directory ready");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_output_dir_creates_nested_directories() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("a").join("b").join("PDFs");

        ensure_output_dir(&target).await.unwrap();
        assert!(target.is_dir());

        // Existing directory is fine
        ensure_output_dir(&target).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ensure_output_dir_uses_0755() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("PDFs");
        ensure_output_dir(&target).await.unwrap();

        let mode = std::fs::metadata(&target).unwrap().permissions().mode();
        // umask can only clear bits
        assert_eq!(mode & 0o7000, 0);
        assert_eq!(mode & !0o755 & 0o777, 0);
    }

    #[tokio::test]
    async fn test_ensure_output_dir_sweeps_stale_partial_files() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("PDFs");
        std::fs::create_dir(&target).unwrap();
        let leftover = target.join(".doc.pdf.77-3.part");
        let old = std::time::SystemTime::now() - Duration::from_secs(2 * STALE_PARTIAL_AGE_SECS);
        std::fs::File::create(&leftover)
            .unwrap()
            .set_modified(old)
            .unwrap();
        std::fs::write(target.join("doc.pdf"), b"%PDF").unwrap();

        ensure_output_dir(&target).await.unwrap();

        assert!(!leftover.exists());
        assert!(target.join("doc.pdf").exists());
    }

    #[tokio::test]
    async fn test_ensure_output_dir_rejects_file() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("not-a-dir");
        std::fs::write(&target, b"x").unwrap();

        assert!(ensure_output_dir(&target).await.is_err());
    }
}
