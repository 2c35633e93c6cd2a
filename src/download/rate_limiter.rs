//! Fixed per-host pause between requests.
//!
//! All downloads usually target a single content host, so the pause is the
//! only throttle besides the concurrency limit. Hosts are tracked
//! independently: requests to different hosts never wait for each other.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use harvester_core::download::RateLimiter;
//!
//! # async fn example() {
//! let limiter = Arc::new(RateLimiter::new(Duration::from_millis(100)));
//!
//! // First request proceeds immediately
//! limiter.acquire("https://example.com/file/1/").await;
//!
//! // Second request to the same host waits out the pause
//! limiter.acquire("https://example.com/file/2/").await;
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Warning threshold for cumulative pause per host (30 seconds).
const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

/// Per-host request pacer.
///
/// Designed to be wrapped in `Arc` and shared across download tasks.
/// `DashMap` holds per-host state; a `tokio::sync::Mutex` per host makes the
/// read-sleep-update sequence atomic, so concurrent tasks queue up behind
/// each other and leave at least `delay` between consecutive requests.
#[derive(Debug)]
pub struct RateLimiter {
    delay: Duration,
    /// Cloned out of the map before awaiting so no shard lock is held across
    /// a sleep.
    hosts: DashMap<String, Arc<HostState>>,
}

#[derive(Debug, Default)]
struct HostState {
    /// `None` until the first request, which proceeds without delay.
    last_request: Mutex<Option<Instant>>,
    cumulative_delay_ms: AtomicU64,
}

impl HostState {
    #[allow(clippy::cast_possible_truncation)]
    fn add_cumulative_delay(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as u64;
        let total = self
            .cumulative_delay_ms
            .fetch_add(delay_ms, Ordering::SeqCst)
            + delay_ms;
        Duration::from_millis(total)
    }
}

impl RateLimiter {
    /// Creates a pacer that leaves at least `delay` between requests to the
    /// same host. A zero delay disables pacing.
    #[must_use]
    #[instrument(skip_all, fields(delay_ms = delay.as_millis()))]
    pub fn new(delay: Duration) -> Self {
        debug!("creating request pacer");
        Self {
            delay,
            hosts: DashMap::new(),
        }
    }

    /// Creates a pacer that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Returns whether pacing is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.delay.is_zero()
    }

    /// Returns the configured pause.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Waits until a request to `url`'s host is allowed, then claims the slot.
    #[instrument(skip(self), fields(host))]
    pub async fn acquire(&self, url: &str) {
        if self.is_disabled() {
            return;
        }

        let host = extract_host(url);
        tracing::Span::current().record("host", host.as_str());

        let state = self
            .hosts
            .entry(host.clone())
            .or_insert_with(|| Arc::new(HostState::default()))
            .clone();

        let mut last_request = state.last_request.lock().await;
        if let Some(previous) = *last_request {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                let wait = self.delay.saturating_sub(elapsed);
                let cumulative = state.add_cumulative_delay(wait);
                debug!(
                    host = %host,
                    delay_ms = wait.as_millis(),
                    cumulative_ms = cumulative.as_millis(),
                    "pausing before request"
                );
                if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD
                    && cumulative.saturating_sub(wait) < CUMULATIVE_DELAY_WARNING_THRESHOLD
                {
                    warn!(
                        host = %host,
                        cumulative_delay_secs = cumulative.as_secs(),
                        "request pacing has delayed this host for over 30s in total"
                    );
                }
                tokio::time::sleep(wait).await;
            }
        }

        *last_request = Some(Instant::now());
    }

    /// Returns the total time spent waiting for `host` so far.
    #[must_use]
    pub fn cumulative_delay(&self, host: &str) -> Duration {
        self.hosts
            .get(&host.to_lowercase())
            .map_or(Duration::ZERO, |state| {
                Duration::from_millis(state.cumulative_delay_ms.load(Ordering::SeqCst))
            })
    }
}

/// Extracts the lower-cased host from a URL.
///
/// Returns "unknown" for malformed URLs so they are still paced together.
///
/// # Examples
///
/// ```
/// use harvester_core::download::rate_limiter::extract_host;
///
/// assert_eq!(extract_host("https://Example.COM/file/1/"), "example.com");
/// assert_eq!(extract_host("https://localhost:8080/x"), "localhost");
/// assert_eq!(extract_host("not a url"), "unknown");
/// ```
#[must_use]
pub fn extract_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| "unknown".to_string())
}
