//! Download engine for concurrent, deduplicated document fetches.
//!
//! This module provides the `DownloadEngine` which coordinates concurrent
//! fetches using a semaphore-based concurrency control pattern and records
//! every success in the [`Ledger`] so later runs skip it.
//!
//! # Overview
//!
//! For each candidate URL the engine, in order:
//!
//! 1. collapses repeats of a candidate already seen in this run,
//! 2. skips URLs the ledger already holds (no request is made),
//! 3. stops scheduling once the run has been interrupted,
//! 4. waits for a free slot, then spawns a task that paces, fetches and
//!    records the URL.
//!
//! Individual failures never abort the run: each URL ends with a
//! [`UrlOutcome`], and all outcomes are collected into a [`RunSummary`].
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::download::{DownloadEngine, HttpClient, RateLimiter};
//! use harvester_core::Ledger;
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = Ledger::open("already_downloaded_urls.txt").await;
//! let rate_limiter = Arc::new(RateLimiter::new(Duration::from_millis(100)));
//! let engine = DownloadEngine::new(10, rate_limiter)?;
//! let client = HttpClient::new()?;
//! let summary = engine
//!     .run(["https://example.com/file/1/"], &ledger, &client, Path::new("PDFs"))
//!     .await?;
//! println!("Downloaded: {}, Failed: {}", summary.downloaded(), summary.failed());
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::client::{FetchOutcome, HttpClient};
use super::error::FailureKind;
use super::rate_limiter::RateLimiter;
use crate::ledger::Ledger;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// How often a task waiting for a permit checks the interrupt flag.
const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Error type for download engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Live counters for a run.
///
/// Updated atomically by the scheduling loop and by download tasks so a
/// progress display can poll them while the run is in flight.
#[derive(Debug, Default)]
pub struct DownloadStats {
    total: AtomicUsize,
    downloaded: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl DownloadStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of candidates handed to the engine.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Returns the number of documents written in this run.
    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::SeqCst)
    }

    /// Returns the number of candidates skipped for any reason.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Returns the number of failed candidates.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns the number of candidates with a final outcome.
    #[must_use]
    pub fn finished(&self) -> usize {
        self.downloaded() + self.skipped() + self.failed()
    }

    fn add_total(&self, count: usize) {
        self.total.fetch_add(count, Ordering::SeqCst);
    }

    fn record(&self, outcome: &UrlOutcome) {
        let counter = match outcome {
            UrlOutcome::Downloaded { .. } => &self.downloaded,
            UrlOutcome::Skipped { .. } => &self.skipped,
            UrlOutcome::Failed { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Shared handle for observing and interrupting a run.
///
/// Cloning is cheap; clones share the same flag and counters, so one clone
/// can be moved into a signal handler while another drives the engine.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    interrupted: Arc<AtomicBool>,
    stats: Arc<DownloadStats>,
}

impl RunControl {
    /// Creates a control handle that is not interrupted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that no further downloads are scheduled.
    ///
    /// Tasks already fetching run to completion.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`interrupt`](Self::interrupt) has been called.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Returns the live counters of the run driven with this handle.
    #[must_use]
    pub fn progress(&self) -> &Arc<DownloadStats> {
        &self.stats
    }
}

/// Why a candidate was not fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The same URL appeared earlier in this run.
    DuplicateCandidate,
    /// The ledger already records the URL; no request was made.
    AlreadyInLedger,
    /// The run was interrupted before the URL was scheduled.
    Cancelled,
    /// A non-empty file already occupies the destination.
    FileExists {
        /// The existing file.
        path: PathBuf,
        /// Whether the URL was recorded in the ledger afterwards.
        ledger_recorded: bool,
    },
}

/// Final outcome for one candidate URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UrlOutcome {
    /// The document was fetched and written to a new file.
    Downloaded {
        /// Path of the new file.
        path: PathBuf,
        /// Bytes written.
        bytes: u64,
        /// False when the ledger append failed; the next run fetches again.
        ledger_recorded: bool,
    },
    /// The candidate was not fetched.
    Skipped {
        /// Why it was skipped.
        reason: SkipReason,
    },
    /// The fetch failed; nothing was written and the ledger is unchanged.
    Failed {
        /// Failure category.
        kind: FailureKind,
        /// Human-readable cause.
        message: String,
    },
}

/// A candidate URL paired with its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlReport {
    /// The candidate URL.
    pub url: String,
    /// What happened to it.
    pub outcome: UrlOutcome,
}

/// Aggregated result of one engine run.
///
/// Reports are listed in candidate order, regardless of completion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    total: usize,
    downloaded: usize,
    skipped: usize,
    failed: usize,
    already_in_ledger: usize,
    ledger_write_failures: usize,
    was_interrupted: bool,
    failures_by_kind: BTreeMap<FailureKind, usize>,
    reports: Vec<UrlReport>,
}

impl RunSummary {
    /// Builds a summary from per-URL reports.
    #[must_use]
    pub fn from_reports(reports: Vec<UrlReport>, was_interrupted: bool) -> Self {
        let mut summary = Self {
            total: reports.len(),
            was_interrupted,
            ..Self::default()
        };

        for report in &reports {
            match &report.outcome {
                UrlOutcome::Downloaded {
                    ledger_recorded, ..
                } => {
                    summary.downloaded += 1;
                    if !ledger_recorded {
                        summary.ledger_write_failures += 1;
                    }
                }
                UrlOutcome::Skipped { reason } => {
                    summary.skipped += 1;
                    match reason {
                        SkipReason::AlreadyInLedger => summary.already_in_ledger += 1,
                        SkipReason::FileExists {
                            ledger_recorded: false,
                            ..
                        } => summary.ledger_write_failures += 1,
                        _ => {}
                    }
                }
                UrlOutcome::Failed { kind, .. } => {
                    summary.failed += 1;
                    *summary.failures_by_kind.entry(*kind).or_default() += 1;
                }
            }
        }

        summary.reports = reports;
        summary
    }

    /// Returns the number of candidates handed to the engine.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Returns the number of documents written in this run.
    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.downloaded
    }

    /// Returns the number of skipped candidates.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Returns the number of failed candidates.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Returns how many candidates were skipped because the ledger held them.
    #[must_use]
    pub fn already_in_ledger(&self) -> usize {
        self.already_in_ledger
    }

    /// Returns how many successes could not be appended to the ledger.
    #[must_use]
    pub fn ledger_write_failures(&self) -> usize {
        self.ledger_write_failures
    }

    /// Returns true if the run was interrupted before every URL was scheduled.
    #[must_use]
    pub fn was_interrupted(&self) -> bool {
        self.was_interrupted
    }

    /// Returns failure counts per category.
    #[must_use]
    pub fn failures_by_kind(&self) -> &BTreeMap<FailureKind, usize> {
        &self.failures_by_kind
    }

    /// Returns per-URL reports in candidate order.
    #[must_use]
    pub fn reports(&self) -> &[UrlReport] {
        &self.reports
    }
}

/// Download engine for concurrent document fetches.
///
/// The engine uses a semaphore to limit the number of concurrent fetches,
/// preventing resource exhaustion on both ends of the connection.
///
/// # Concurrency Model
///
/// - Each fetch runs in its own Tokio task
/// - A semaphore permit is acquired before spawning each task
/// - Permits are released automatically when tasks complete (RAII)
/// - The ledger serializes its own check-then-append, so tasks share it freely
///
/// # Pacing
///
/// Each task waits on the shared [`RateLimiter`] before its request, so
/// requests to one host are spaced by the configured pause.
#[derive(Debug)]
pub struct DownloadEngine {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    rate_limiter: Arc<RateLimiter>,
}

impl DownloadEngine {
    /// Creates a new download engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if `concurrency` is outside
    /// 1..=100.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use std::time::Duration;
    /// use harvester_core::download::{DownloadEngine, RateLimiter};
    ///
    /// let rate_limiter = Arc::new(RateLimiter::new(Duration::from_millis(100)));
    /// let engine = DownloadEngine::new(10, rate_limiter).unwrap();
    /// assert_eq!(engine.concurrency(), 10);
    /// ```
    #[instrument(level = "debug", skip(rate_limiter))]
    pub fn new(concurrency: usize, rate_limiter: Arc<RateLimiter>) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(
            concurrency,
            rate_limit_ms = rate_limiter.delay().as_millis(),
            rate_limit_disabled = rate_limiter.is_disabled(),
            "creating download engine"
        );

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            rate_limiter,
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetches every candidate that is not already recorded in `ledger`.
    ///
    /// Equivalent to [`run_with_control`](Self::run_with_control) with a
    /// fresh [`RunControl`] that is never interrupted.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SemaphoreClosed`] if the semaphore is closed.
    /// Individual download failures never cause this method to error.
    pub async fn run<I, S>(
        &self,
        candidates: I,
        ledger: &Ledger,
        client: &HttpClient,
        output_dir: &Path,
    ) -> Result<RunSummary, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run_with_control(candidates, ledger, client, output_dir, &RunControl::new())
            .await
    }

    /// Fetches candidates, stopping new work once `control` is interrupted.
    ///
    /// When the interrupt flag is set, the engine:
    /// - stops scheduling further candidates (they are reported as
    ///   [`SkipReason::Cancelled`]),
    /// - gives up waiting for a permit,
    /// - still waits for every task already spawned.
    ///
    /// Returns only after every spawned task has completed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SemaphoreClosed`] if the semaphore is closed.
    #[instrument(skip_all, fields(output_dir = %output_dir.display()))]
    pub async fn run_with_control<I, S>(
        &self,
        candidates: I,
        ledger: &Ledger,
        client: &HttpClient,
        output_dir: &Path,
        control: &RunControl,
    ) -> Result<RunSummary, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let candidates: Vec<String> = candidates
            .into_iter()
            .map(|c| c.into().trim().to_string())
            .collect();
        let stats = Arc::clone(control.progress());
        stats.add_total(candidates.len());

        info!(candidates = candidates.len(), "starting downloads");

        let mut outcomes: Vec<Option<UrlOutcome>> = vec![None; candidates.len()];
        let mut handles: Vec<(usize, JoinHandle<UrlOutcome>)> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::with_capacity(candidates.len());

        for (index, url) in candidates.iter().enumerate() {
            let skip = if !seen.insert(url.as_str()) {
                debug!(url = %url, "duplicate candidate; skipping");
                Some(SkipReason::DuplicateCandidate)
            } else if ledger.contains(url).await {
                info!(url = %url, "already downloaded; skipping");
                Some(SkipReason::AlreadyInLedger)
            } else if control.is_interrupted() {
                Some(SkipReason::Cancelled)
            } else {
                None
            };

            if let Some(reason) = skip {
                let outcome = UrlOutcome::Skipped { reason };
                stats.record(&outcome);
                outcomes[index] = Some(outcome);
                continue;
            }

            // Race the permit against the interrupt flag so Ctrl+C during a
            // full-concurrency wait stops scheduling immediately.
            let permit = tokio::select! {
                biased;
                () = wait_for_interrupt(control) => None,
                result = Arc::clone(&self.semaphore).acquire_owned() => {
                    Some(result.map_err(|_| EngineError::SemaphoreClosed)?)
                }
            };
            let Some(permit) = permit else {
                let outcome = UrlOutcome::Skipped {
                    reason: SkipReason::Cancelled,
                };
                stats.record(&outcome);
                outcomes[index] = Some(outcome);
                continue;
            };

            let url = url.clone();
            let ledger = ledger.clone();
            let client = client.clone();
            let output_dir = output_dir.to_path_buf();
            let rate_limiter = Arc::clone(&self.rate_limiter);
            let stats = Arc::clone(&stats);

            handles.push((
                index,
                tokio::spawn(async move {
                    // Permit is dropped when this block exits (RAII)
                    let _permit = permit;
                    let outcome =
                        download_one(&url, &ledger, &client, &output_dir, &rate_limiter).await;
                    stats.record(&outcome);
                    outcome
                }),
            ));
        }

        drop(seen);

        debug!(
            task_count = handles.len(),
            "waiting for downloads to complete"
        );

        for (index, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(url = %candidates[index], error = %e, "download task panicked");
                    let outcome = UrlOutcome::Failed {
                        kind: FailureKind::Internal,
                        message: e.to_string(),
                    };
                    stats.record(&outcome);
                    outcome
                }
            };
            outcomes[index] = Some(outcome);
        }

        let reports = candidates
            .into_iter()
            .zip(outcomes)
            .map(|(url, outcome)| UrlReport {
                url,
                outcome: outcome.unwrap_or_else(|| UrlOutcome::Failed {
                    kind: FailureKind::Internal,
                    message: "no outcome recorded".to_string(),
                }),
            })
            .collect();

        let summary = RunSummary::from_reports(reports, control.is_interrupted());
        info!(
            total = summary.total(),
            downloaded = summary.downloaded(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            interrupted = summary.was_interrupted(),
            "downloads complete"
        );
        Ok(summary)
    }
}

async fn wait_for_interrupt(control: &RunControl) {
    while !control.is_interrupted() {
        tokio::time::sleep(INTERRUPT_POLL_INTERVAL).await;
    }
}

/// Paces, fetches and records a single URL.
#[instrument(skip(ledger, client, output_dir, rate_limiter))]
async fn download_one(
    url: &str,
    ledger: &Ledger,
    client: &HttpClient,
    output_dir: &Path,
    rate_limiter: &RateLimiter,
) -> UrlOutcome {
    rate_limiter.acquire(url).await;

    match client.fetch_document(url, output_dir).await {
        Ok(FetchOutcome::Fetched { path, bytes }) => UrlOutcome::Downloaded {
            path,
            bytes,
            ledger_recorded: record_success(ledger, url).await,
        },
        Ok(FetchOutcome::AlreadyExists { path }) => UrlOutcome::Skipped {
            reason: SkipReason::FileExists {
                path,
                ledger_recorded: record_success(ledger, url).await,
            },
        },
        Err(e) => {
            let kind = e.kind();
            warn!(url = %url, kind = %kind, error = %e, "download failed");
            UrlOutcome::Failed {
                kind,
                message: e.to_string(),
            }
        }
    }
}

/// Appends `url` to the ledger, logging rather than propagating failures.
async fn record_success(ledger: &Ledger, url: &str) -> bool {
    match ledger.record(url).await {
        Ok(_) => true,
        Err(e) => {
            warn!(url = %url, error = %e, "failed to record url in ledger");
            false
        }
    }
}
