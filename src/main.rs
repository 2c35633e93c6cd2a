//! CLI entry point for the pdf-harvester tool.

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use harvester_core::{
    DownloadEngine, HttpClient, Ledger, LinkPattern, RateLimiter, RunControl, RunSummary,
    dedup_preserving_order, discover_candidates, ensure_output_dir, read_seed_file,
};
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod progress;

use app_config::{RunSettings, SeedSource, load_file_config};
use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let file_config = load_file_config(args.config.as_deref())?;
    let settings = RunSettings::resolve(&args, file_config.as_ref().map(|(_, cfg)| cfg));

    // Priority: RUST_LOG env var > CLI flags > config verbosity > default (info)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(settings.log_level()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");
    if let Some((path, _)) = &file_config {
        debug!(path = %path.display(), "loaded config file");
    }
    info!("pdf-harvester starting");

    let client = HttpClient::with_timeouts(settings.connect_timeout, settings.request_timeout)
        .context("Failed to build HTTP client")?;

    let rate_limiter = if settings.rate_limit.is_zero() {
        debug!("rate limiting disabled");
        Arc::new(RateLimiter::disabled())
    } else {
        debug!(rate_limit_ms = settings.rate_limit.as_millis(), "rate limiting enabled");
        Arc::new(RateLimiter::new(settings.rate_limit))
    };

    let seeds = match &settings.seeds {
        SeedSource::Inline(urls) => urls.clone(),
        SeedSource::File(path) => read_seed_file(path).await?,
    };
    if seeds.is_empty() {
        info!("No seed URLs provided. Add URLs to the seed file or pass them as arguments.");
        return Ok(());
    }

    let candidates = if settings.direct {
        dedup_preserving_order(seeds)
    } else {
        let pattern = LinkPattern::new(&settings.link_pattern)?;
        discover_candidates(
            &client,
            &rate_limiter,
            &seeds,
            &pattern,
            settings.html_archive.as_deref(),
        )
        .await?
    };
    if candidates.is_empty() {
        info!("No document links found");
        return Ok(());
    }

    ensure_output_dir(&settings.output_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create output directory '{}'",
                settings.output_dir.display()
            )
        })?;

    let ledger = Ledger::open(&settings.ledger_path).await;

    let engine = DownloadEngine::new(settings.concurrency, rate_limiter)?;

    let control = RunControl::new();
    let signal_task = spawn_interrupt_handler(control.clone());

    let use_spinner = !settings.quiet && io::stderr().is_terminal();
    let (spinner, stop_spinner) =
        progress::spawn_progress_ui(use_spinner, Arc::clone(control.progress()));

    let result = engine
        .run_with_control(candidates, &ledger, &client, &settings.output_dir, &control)
        .await;

    progress::stop_progress_ui(spinner, &stop_spinner).await;
    signal_task.abort();

    let summary = result?;
    report_summary(&summary, settings.json)?;

    Ok(())
}

/// Interrupts the run on the first Ctrl+C. In-flight downloads still finish.
fn spawn_interrupt_handler(control: RunControl) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing in-flight downloads");
            control.interrupt();
        }
    })
}

fn report_summary(summary: &RunSummary, json: bool) -> Result<()> {
    for (kind, count) in summary.failures_by_kind() {
        info!(kind = %kind, count, "failures by kind");
    }
    if summary.ledger_write_failures() > 0 {
        warn!(
            count = summary.ledger_write_failures(),
            "some downloads could not be recorded in the ledger and will be fetched again"
        );
    }
    info!(
        total = summary.total(),
        downloaded = summary.downloaded(),
        skipped = summary.skipped(),
        already_in_ledger = summary.already_in_ledger(),
        failed = summary.failed(),
        interrupted = summary.was_interrupted(),
        "Download complete"
    );

    if json {
        let rendered =
            serde_json::to_string_pretty(summary).context("Failed to serialize run summary")?;
        println!("{rendered}");
    }
    Ok(())
}
