//! Append-only ledger of URLs that have already been downloaded.
//!
//! The ledger is what makes repeated runs idempotent: a URL recorded here is
//! never fetched again. It is backed by a plain-text file with one URL per
//! line, opened in append mode for writes and loaded in full at startup.
//!
//! # Concurrency
//!
//! All state lives behind a single [`tokio::sync::Mutex`]. [`Ledger::record`]
//! performs its membership check and its append while holding that lock, so
//! two tasks racing on the same URL produce exactly one line and writes from
//! different tasks never interleave.
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::Ledger;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = Ledger::open("already_downloaded_urls.txt").await;
//! if !ledger.contains("https://example.com/file/1/").await {
//!     ledger.record("https://example.com/file/1/").await?;
//! }
//! # Ok(())
//! # }
//! ```

mod error;

use std::borrow::Cow;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

pub use error::LedgerError;

/// Durable set of downloaded URLs.
///
/// Cloning is cheap: clones share the same state and backing file.
#[derive(Debug, Clone)]
pub struct Ledger {
    state: Arc<Mutex<LedgerState>>,
    path: Option<Arc<PathBuf>>,
}

#[derive(Debug, Default)]
struct LedgerState {
    entries: HashSet<String>,
    /// Insertion order, mirroring the line order of the backing file.
    order: Vec<String>,
    /// Lazily opened append handle; dropped after a write failure so the next
    /// append reopens the file.
    writer: Option<File>,
    /// The file's last line has no terminating newline yet.
    unterminated: bool,
}

impl LedgerState {
    fn insert(&mut self, url: &str) -> bool {
        if self.entries.insert(url.to_string()) {
            self.order.push(url.to_string());
            true
        } else {
            false
        }
    }
}

impl Ledger {
    /// Opens the ledger stored at `path`, loading every recorded URL.
    ///
    /// A missing file yields an empty ledger; the file is created on the first
    /// [`record`](Self::record). Any other read failure is logged and also
    /// yields an empty ledger, so a damaged ledger never aborts a run.
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut state = LedgerState::default();

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let contents = String::from_utf8_lossy(&bytes);
                if matches!(contents, Cow::Owned(_)) {
                    warn!(
                        path = %path.display(),
                        "ledger contains invalid UTF-8; affected lines will not match"
                    );
                }
                state.unterminated = bytes.last().is_some_and(|&b| b != b'\n');

                let mut duplicates = 0usize;
                for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    if !state.insert(line) {
                        duplicates += 1;
                    }
                }
                info!(
                    path = %path.display(),
                    entries = state.order.len(),
                    duplicates,
                    "loaded download ledger"
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "ledger file not found; starting empty");
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to read ledger; treating as empty"
                );
            }
        }

        Self {
            state: Arc::new(Mutex::new(state)),
            path: Some(Arc::new(path)),
        }
    }

    /// Creates a ledger that is never written to disk.
    ///
    /// Useful for dry runs and tests.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState::default())),
            path: None,
        }
    }

    /// Returns the backing file path, or `None` for an in-memory ledger.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref().map(PathBuf::as_path)
    }

    /// Returns true if `url` has been recorded.
    ///
    /// Matching is exact on the trimmed URL string.
    pub async fn contains(&self, url: &str) -> bool {
        self.state.lock().await.entries.contains(url.trim())
    }

    /// Records `url` as downloaded.
    ///
    /// Returns `Ok(true)` when a new entry was appended and `Ok(false)` when
    /// the URL was already present (nothing is written).
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidEntry`] for empty or multi-line values and
    /// [`LedgerError::Io`] if the backing file cannot be opened or written.
    /// On IO failure the URL is not added to the in-memory set either, so the
    /// next run fetches it again.
    #[instrument(level = "debug", skip(self))]
    pub async fn record(&self, url: &str) -> Result<bool, LedgerError> {
        let url = url.trim();
        if url.is_empty() || url.contains(['\n', '\r']) {
            return Err(LedgerError::invalid_entry(url));
        }

        let mut state = self.state.lock().await;
        if state.entries.contains(url) {
            debug!(url = %url, "url already recorded in ledger");
            return Ok(false);
        }

        if let Some(path) = self.path.as_deref() {
            append_line(&mut state, path, url).await?;
        }

        state.insert(url);
        debug!(url = %url, "recorded url in ledger");
        Ok(true)
    }

    /// Returns the number of recorded URLs.
    pub async fn len(&self) -> usize {
        self.state.lock().await.order.len()
    }

    /// Returns true if no URL has been recorded.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Returns the recorded URLs in the order they were added.
    pub async fn entries(&self) -> Vec<String> {
        self.state.lock().await.order.clone()
    }
}

async fn append_line(state: &mut LedgerState, path: &Path, url: &str) -> Result<(), LedgerError> {
    if state.writer.is_none() {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| LedgerError::io(path, e))?;
        state.writer = Some(file);
    }

    let Some(writer) = state.writer.as_mut() else {
        return Err(LedgerError::io(
            path,
            std::io::Error::other("ledger writer unavailable"),
        ));
    };

    let line = if state.unterminated {
        format!("\n{url}\n")
    } else {
        format!("{url}\n")
    };
    let result = async {
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await
    }
    .await;

    if let Err(e) = result {
        state.writer = None;
        return Err(LedgerError::io(path, e));
    }
    state.unterminated = false;
    Ok(())
}
