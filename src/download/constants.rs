//! Constants for the download module (timeouts, pacing, limits).

/// Default HTTP connect timeout (10 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default total request timeout, covering connect, headers and body (30 seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default pause between requests to the same host, in milliseconds.
pub const DEFAULT_RATE_LIMIT_MS: u64 = 100;

/// Age after which a leftover partial file is swept from the output directory (1 hour).
pub const STALE_PARTIAL_AGE_SECS: u64 = 3600;

/// MIME type every downloaded document must carry.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Extension appended to URL-derived fallback filenames.
pub const PDF_EXTENSION: &str = ".pdf";
