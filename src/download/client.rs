//! HTTP client wrapper for fetching documents and listing pages.
//!
//! This module provides the `HttpClient` struct, which performs one GET per
//! document, validates the response, and persists the body under the output
//! directory without ever overwriting an existing file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, PDF_CONTENT_TYPE, REQUEST_TIMEOUT_SECS};
use super::error::DownloadError;
use super::filename::destination_filename;

/// User-Agent sent with every request.
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Result of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The body was written to a new file.
    Fetched {
        /// Path of the created file.
        path: PathBuf,
        /// Number of bytes written, equal to the response body length.
        bytes: u64,
    },
    /// A non-empty file already exists at the destination; nothing was written.
    AlreadyExists {
        /// The existing destination path.
        path: PathBuf,
    },
}

impl FetchOutcome {
    /// Returns the destination path.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Fetched { path, .. } | Self::AlreadyExists { path } => path,
        }
    }
}

/// HTTP client for fetching documents.
///
/// This client is designed to be created once and reused for every fetch,
/// taking advantage of connection pooling. Cloning is cheap.
///
/// # Example
///
/// ```no_run
/// use harvester_core::download::{FetchOutcome, HttpClient};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new()?;
/// match client.fetch_document("https://example.com/file/1/", Path::new("PDFs")).await? {
///     FetchOutcome::Fetched { path, bytes } => println!("{bytes} bytes -> {}", path.display()),
///     FetchOutcome::AlreadyExists { path } => println!("exists: {}", path.display()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the default timeouts (10s connect, 30s total).
    ///
    /// # Errors
    ///
    /// Returns the underlying `reqwest::Error` if the client cannot be built
    /// (for example, when the TLS backend fails to initialize).
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeouts(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        )
    }

    /// Creates a client with explicit connect and total request timeouts.
    ///
    /// # Errors
    ///
    /// Returns the underlying `reqwest::Error` if the client cannot be built.
    #[instrument(level = "debug")]
    pub fn with_timeouts(
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .gzip(true)
            .build()?;
        Ok(Self { client })
    }

    /// Fetches one document and persists it under `output_dir`.
    ///
    /// Steps, in order: GET, require status 200, require a `Content-Type`
    /// containing `application/pdf`, derive the filename, short-circuit if a
    /// non-empty file already exists there, buffer the body, reject an empty
    /// body, then publish the file without overwriting anything.
    ///
    /// Nothing touches the filesystem before the final write, except removal
    /// of a zero-length leftover at the destination.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] describing the first failed step. No file
    /// is left behind on error.
    #[instrument(skip(self, output_dir), fields(url = %url))]
    pub async fn fetch_document(
        &self,
        url: &str,
        output_dir: &Path,
    ) -> Result<FetchOutcome, DownloadError> {
        let parsed = parse_http_url(url)?;

        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| DownloadError::from_request(url, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let content_type = header_str(&response, CONTENT_TYPE);
        if !is_pdf_content_type(content_type.as_deref()) {
            return Err(DownloadError::content_type(url, content_type));
        }

        let filename = destination_filename(
            header_str(&response, CONTENT_DISPOSITION).as_deref(),
            &parsed,
        );
        let destination = output_dir.join(&filename);
        debug!(filename = %filename, path = %destination.display(), "resolved destination");

        if destination_is_occupied(&destination).await? {
            info!(path = %destination.display(), "file already exists; skipping download");
            return Ok(FetchOutcome::AlreadyExists { path: destination });
        }

        let body = read_body(response, url).await?;
        if body.is_empty() {
            return Err(DownloadError::empty_body(url));
        }

        match write_new_file(&destination, &body).await {
            Ok(bytes) => {
                info!(bytes, url = %url, path = %destination.display(), "successfully downloaded");
                Ok(FetchOutcome::Fetched {
                    path: destination,
                    bytes,
                })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                // Another task claimed this destination between the probe and the create.
                info!(path = %destination.display(), "file created concurrently; skipping write");
                Ok(FetchOutcome::AlreadyExists { path: destination })
            }
            Err(e) => Err(DownloadError::io(destination, e)),
        }
    }

    /// Fetches a listing page and returns its body as text.
    ///
    /// Only the status is validated; any content type is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`], [`DownloadError::HttpStatus`],
    /// [`DownloadError::Timeout`] or [`DownloadError::Network`].
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_page(&self, url: &str) -> Result<String, DownloadError> {
        let parsed = parse_http_url(url)?;
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| DownloadError::from_request(url, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let text = response
            .text()
            .await
            .map_err(|e| DownloadError::from_request(url, e))?;
        debug!(bytes = text.len(), "fetched listing page");
        Ok(text)
    }

    /// Returns the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

fn parse_http_url(url: &str) -> Result<Url, DownloadError> {
    let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(DownloadError::invalid_url(url));
    }
    Ok(parsed)
}

fn header_str(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(std::string::ToString::to_string)
}

fn is_pdf_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains(PDF_CONTENT_TYPE))
}

/// Returns true when a non-empty file already sits at `path`.
///
/// A zero-length file is treated as a leftover from an interrupted write and
/// removed so the fetch can proceed.
async fn destination_is_occupied(path: &Path) -> Result<bool, DownloadError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Err(DownloadError::io(
            path,
            std::io::Error::other("destination is a directory"),
        )),
        Ok(meta) if meta.len() == 0 => {
            warn!(path = %path.display(), "removing zero-length leftover before download");
            match tokio::fs::remove_file(path).await {
                Ok(()) => Ok(false),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(DownloadError::io(path, e)),
            }
        }
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(DownloadError::io(path, e)),
    }
}

/// Buffers the full response body in memory.
async fn read_body(response: reqwest::Response, url: &str) -> Result<Vec<u8>, DownloadError> {
    let capacity = response
        .content_length()
        .and_then(|len| usize::try_from(len).ok())
        .unwrap_or(0);
    let mut body = Vec::with_capacity(capacity);
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DownloadError::from_request(url, e))?;
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

/// Writes `body` to `path`, which must not exist yet.
///
/// The bytes go to a hidden sibling file first and are published with a hard
/// link, which fails with `AlreadyExists` instead of replacing a file. The
/// destination therefore never appears partially written and is never
/// overwritten, even when several tasks race for the same name. Where hard
/// links are unavailable the destination is written in place instead.
async fn write_new_file(path: &Path, body: &[u8]) -> std::io::Result<u64> {
    let partial = partial_path(path);
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&partial)
        .await?;

    let written = async {
        file.write_all(body).await?;
        file.flush().await?;
        file.sync_all().await
    }
    .await;
    drop(file);

    let published = match written {
        Ok(()) => publish(&partial, path, body).await,
        Err(e) => Err(e),
    };

    if let Err(e) = tokio::fs::remove_file(&partial).await {
        debug!(path = %partial.display(), error = %e, "failed to remove partial file");
    }

    published.map(|()| body.len() as u64)
}

/// Links `partial` into place, falling back to a create-new write of `body`
/// when the filesystem refuses the link for any reason other than an
/// existing destination (FAT/exFAT volumes, some network mounts).
async fn publish(partial: &Path, path: &Path, body: &[u8]) -> std::io::Result<()> {
    match tokio::fs::hard_link(partial, path).await {
        Err(e) if e.kind() != ErrorKind::AlreadyExists => {
            debug!(
                path = %path.display(),
                error = %e,
                "hard link failed; writing destination directly"
            );
            write_in_place(path, body).await
        }
        linked => linked,
    }
}

async fn write_in_place(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;

    let written = async {
        file.write_all(body).await?;
        file.flush().await?;
        file.sync_all().await
    }
    .await;
    drop(file);

    if written.is_err()
        && let Err(e) = tokio::fs::remove_file(path).await
    {
        warn!(path = %path.display(), error = %e, "failed to remove partially written file");
    }
    written
}

/// Removes partial files left behind by killed runs.
///
/// Only hidden `.part` files whose last modification is older than `max_age`
/// are removed, so writes in flight in a concurrent run are left alone.
/// Failures are logged; returns the number of files removed.
pub(crate) async fn remove_stale_partials(dir: &Path, max_age: Duration) -> usize {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(path = %dir.display(), error = %e, "cannot scan for partial files");
            return 0;
        }
    };

    let mut removed = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        if !is_partial_name(&entry.file_name().to_string_lossy()) {
            continue;
        }
        let stale = entry
            .metadata()
            .await
            .ok()
            .filter(std::fs::Metadata::is_file)
            .and_then(|meta| meta.modified().ok())
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age >= max_age);
        if !stale {
            continue;
        }

        let path = entry.path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "removed stale partial file");
                removed += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to remove stale partial file");
            }
        }
    }

    if removed > 0 {
        info!(path = %dir.display(), removed, "swept stale partial files");
    }
    removed
}

fn is_partial_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(".part")
}

/// Sibling path used while a download is being written.
fn partial_path(path: &Path) -> PathBuf {
    static NEXT_PARTIAL_ID: AtomicU64 = AtomicU64::new(0);

    let id = NEXT_PARTIAL_ID.fetch_add(1, Ordering::Relaxed);
    let name = path
        .file_name()
        .map_or_else(|| "download".into(), |n| n.to_string_lossy());
    path.with_file_name(format!(".{name}.{}-{id}.part", std::process::id()))
}
