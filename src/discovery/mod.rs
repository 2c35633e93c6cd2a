//! Candidate URL discovery.
//!
//! Candidates come from a seed file (one URL per line) or from listing pages:
//! each seed page is fetched and scanned for document links matching a
//! [`LinkPattern`]. Results are de-duplicated in first-seen order before they
//! reach the download engine.
//!
//! When an HTML archive file is configured, every fetched page body is
//! appended to it and links are extracted from the whole archive, so pages
//! fetched by earlier runs keep contributing candidates.

mod error;

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, trace, warn};

use crate::download::{HttpClient, RateLimiter};

pub use error::DiscoveryError;

/// Document links on the content host: `https://www.amresupply.com/file/<id>/`.
pub const DEFAULT_LINK_PATTERN: &str = r"https://www\.amresupply\.com/file/\d+/";

#[allow(clippy::expect_used)]
static DEFAULT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(DEFAULT_LINK_PATTERN).expect("default link pattern is valid")
});

/// Compiled regular expression that recognizes document links in HTML.
#[derive(Debug, Clone)]
pub struct LinkPattern {
    regex: Regex,
}

impl LinkPattern {
    /// Compiles `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::InvalidPattern`] if the pattern does not compile.
    pub fn new(pattern: &str) -> Result<Self, DiscoveryError> {
        let regex =
            Regex::new(pattern).map_err(|e| DiscoveryError::invalid_pattern(pattern, e))?;
        Ok(Self { regex })
    }

    /// Returns the source pattern.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Returns every match in `text`, in order, including repeats.
    ///
    /// # Examples
    ///
    /// ```
    /// use harvester_core::LinkPattern;
    ///
    /// let html = r#"<a href="https://www.amresupply.com/file/12/">a</a>
    ///               <a href="https://www.amresupply.com/file/12/">again</a>"#;
    /// let links = LinkPattern::default().extract_links(html);
    /// assert_eq!(links.len(), 2);
    /// ```
    #[must_use]
    pub fn extract_links(&self, text: &str) -> Vec<String> {
        self.regex
            .find_iter(text)
            .map(|m| {
                trace!(url = m.as_str(), "found link");
                m.as_str().to_string()
            })
            .collect()
    }
}

impl Default for LinkPattern {
    fn default() -> Self {
        Self {
            regex: DEFAULT_REGEX.clone(),
        }
    }
}

/// Removes repeated entries, keeping the first occurrence of each.
#[must_use]
pub fn dedup_preserving_order<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Reads seed URLs from `path`, one per line.
///
/// Surrounding whitespace is trimmed and blank lines are ignored.
///
/// # Errors
///
/// Returns [`DiscoveryError::SeedFile`] if the file cannot be read.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn read_seed_file(path: &Path) -> Result<Vec<String>, DiscoveryError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| DiscoveryError::seed_file(path, e))?;

    let seeds: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    debug!(count = seeds.len(), "read seed urls");
    Ok(seeds)
}

/// Fetches each listing page and returns the unique document links found.
///
/// Page requests are paced by `rate_limiter` like document fetches. A page
/// that cannot be fetched is logged and skipped. With
/// `html_archive`, page bodies are appended to that file and the whole
/// archive is scanned; otherwise only the bodies fetched now are scanned.
///
/// # Errors
///
/// Returns [`DiscoveryError::Archive`] if the archive cannot be written or
/// read back.
#[instrument(
    skip(client, rate_limiter, seeds, pattern),
    fields(seeds = seeds.len(), pattern = pattern.as_str())
)]
pub async fn discover_candidates(
    client: &HttpClient,
    rate_limiter: &RateLimiter,
    seeds: &[String],
    pattern: &LinkPattern,
    html_archive: Option<&Path>,
) -> Result<Vec<String>, DiscoveryError> {
    let mut pages = String::new();
    let mut fetched = 0usize;

    for seed in seeds {
        rate_limiter.acquire(seed).await;
        let body = match client.fetch_page(seed).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %seed, error = %e, "failed to fetch listing page; skipping");
                continue;
            }
        };
        fetched += 1;

        if let Some(archive) = html_archive {
            append_to_archive(archive, &body).await?;
        } else {
            pages.push_str(&body);
            pages.push('\n');
        }
    }

    let text = match html_archive {
        Some(archive) => read_archive(archive).await?,
        None => pages,
    };

    let links = pattern.extract_links(&text);
    let found = links.len();
    let candidates = dedup_preserving_order(links);
    info!(
        pages = fetched,
        links = found,
        candidates = candidates.len(),
        "discovered candidate urls"
    );
    Ok(candidates)
}

async fn append_to_archive(path: &Path, body: &str) -> Result<(), DiscoveryError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| DiscoveryError::archive(path, e))?;
    file.write_all(body.as_bytes())
        .await
        .map_err(|e| DiscoveryError::archive(path, e))?;
    file.write_all(b"\n")
        .await
        .map_err(|e| DiscoveryError::archive(path, e))?;
    file.flush()
        .await
        .map_err(|e| DiscoveryError::archive(path, e))
}

/// Reads the archive; a missing archive (nothing fetched yet) is empty.
async fn read_archive(path: &Path) -> Result<String, DiscoveryError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(DiscoveryError::archive(path, e)),
    }
}
