//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Bulk-download PDF documents discovered on listing pages.
///
/// Seed URLs are read from a file (or given as arguments), scanned for
/// document links, and every link not yet recorded in the ledger is fetched
/// concurrently into a flat output directory. Re-running is safe: documents
/// already downloaded are skipped without a request.
#[derive(Parser, Debug, Default)]
#[command(name = "pdf-harvester")]
#[command(author, version, about)]
pub struct Args {
    /// Seed URLs; overrides the seed file when given
    #[arg(value_name = "URLS")]
    pub urls: Vec<String>,

    /// File with one seed URL per line [default: urls.txt]
    #[arg(short = 's', long = "seeds", value_name = "FILE")]
    pub seed_file: Option<PathBuf>,

    /// Treat seed URLs as document URLs instead of listing pages to scan
    #[arg(long)]
    pub direct: bool,

    /// Directory for downloaded documents [default: PDFs]
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Ledger of already-downloaded URLs [default: already_downloaded_urls.txt]
    #[arg(long = "ledger", value_name = "FILE")]
    pub ledger_path: Option<PathBuf>,

    /// Maximum concurrent downloads (1-100) [default: 10]
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Minimum delay between requests to the same host in milliseconds (0 to disable, max 60000) [default: 100]
    #[arg(short = 'l', long, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub rate_limit: Option<u64>,

    /// Total request timeout in seconds (1-3600) [default: 30]
    #[arg(long = "timeout", value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub request_timeout_secs: Option<u64>,

    /// Regular expression matching document links in listing pages
    #[arg(long, value_name = "REGEX")]
    pub link_pattern: Option<String>,

    /// Append fetched listing pages to this file and scan the whole file for links
    #[arg(long, value_name = "FILE")]
    pub html_archive: Option<PathBuf>,

    /// Config file [default: $XDG_CONFIG_HOME/pdf-harvester/config.toml]
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}
