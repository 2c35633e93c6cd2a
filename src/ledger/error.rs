//! Error types for ledger operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while appending to the download ledger.
///
/// Read failures never surface as errors: an unreadable ledger is logged and
/// treated as empty so a run can still proceed.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The backing file could not be opened or written.
    #[error("IO error on ledger {path}: {source}")]
    Io {
        /// The ledger file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The entry cannot be stored as a single ledger line.
    #[error("invalid ledger entry {url:?}: entries must be non-empty single-line URLs")]
    InvalidEntry {
        /// The rejected value.
        url: String,
    },
}

impl LedgerError {
    /// Creates an IO error for the given ledger path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid-entry error.
    pub fn invalid_entry(url: impl Into<String>) -> Self {
        Self::InvalidEntry { url: url.into() }
    }
}
