//! PDF Harvester Core Library
//!
//! This library provides the fetch-and-persist engine behind the `pdf-harvester`
//! tool: it takes candidate document URLs, skips the ones already recorded in an
//! append-only ledger, fetches the rest with bounded concurrency, validates that
//! each response is a PDF, and writes it to a flat output directory exactly once.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`ledger`] - Append-only record of URLs already downloaded
//! - [`discovery`] - Seed file reading and document link extraction
//! - [`download`] - HTTP fetch worker, request pacing and the concurrent engine

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod discovery;
pub mod download;
pub mod ledger;
#[cfg(test)]
pub mod test_support;

// Re-export commonly used types
pub use discovery::{
    DEFAULT_LINK_PATTERN, DiscoveryError, LinkPattern, dedup_preserving_order, discover_candidates,
    read_seed_file,
};
pub use download::{
    DEFAULT_CONCURRENCY, DEFAULT_RATE_LIMIT_MS, DownloadEngine, DownloadError, DownloadStats,
    EngineError, FailureKind, FetchOutcome, HttpClient, RateLimiter, RunControl, RunSummary,
    SkipReason, UrlOutcome, UrlReport, ensure_output_dir,
};
pub use ledger::{Ledger, LedgerError};
