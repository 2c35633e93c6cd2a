//! Progress UI (spinner) for download runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use harvester_core::DownloadStats;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

/// Spawns the progress UI (spinner) when requested.
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When `use_spinner` is false, returns (None, stop) with stop already true.
pub(crate) fn spawn_progress_ui(
    use_spinner: bool,
    stats: Arc<DownloadStats>,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !use_spinner {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_spinner_inner(stats, Arc::clone(&stop));
    (Some(handle), stop)
}

/// Signals the spinner to stop and waits for it to clear the line.
///
/// Returns false if the spinner task ended abnormally; that is logged and
/// otherwise ignored.
pub(crate) async fn stop_progress_ui(
    handle: Option<tokio::task::JoinHandle<()>>,
    stop: &AtomicBool,
) -> bool {
    stop.store(true, Ordering::SeqCst);
    if let Some(handle) = handle
        && let Err(e) = handle.await
    {
        debug!(error = %e, "progress display task ended abnormally");
        return false;
    }
    true
}

fn spawn_spinner_inner(stats: Arc<DownloadStats>, stop: Arc<AtomicBool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));

        while !stop.load(Ordering::SeqCst) {
            spinner.set_message(progress_message(&stats));
            tokio::time::sleep(Duration::from_millis(120)).await;
        }

        spinner.finish_and_clear();
    })
}

fn progress_message(stats: &DownloadStats) -> String {
    format!(
        "[{}/{}] downloaded {}, skipped {}, failed {}",
        stats.finished().min(stats.total()),
        stats.total(),
        stats.downloaded(),
        stats.skipped(),
        stats.failed()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_message_reports_counts() {
        let stats = DownloadStats::new();
        assert_eq!(
            progress_message(&stats),
            "[0/0] downloaded 0, skipped 0, failed 0"
        );
    }

    #[tokio::test]
    async fn spawn_progress_ui_when_disabled_returns_none_handle_and_stop_already_true() {
        let (handle, stop) = spawn_progress_ui(false, Arc::new(DownloadStats::new()));

        assert!(handle.is_none());
        assert!(
            stop.load(Ordering::SeqCst),
            "stop signal should be true when spinner disabled"
        );
    }

    #[tokio::test]
    async fn spawn_progress_ui_when_enabled_stops_on_signal() {
        let (handle, stop) = spawn_progress_ui(true, Arc::new(DownloadStats::new()));

        assert!(
            handle.is_some(),
            "handle should be Some when spinner enabled"
        );
        assert!(!stop.load(Ordering::SeqCst), "stop should be false initially");

        assert!(stop_progress_ui(handle, &stop).await);
    }

    #[tokio::test]
    async fn stop_progress_ui_reports_failed_task() {
        let stop = AtomicBool::new(false);
        let handle: tokio::task::JoinHandle<()> = tokio::spawn(async { panic!("spinner crashed") });

        assert!(!stop_progress_ui(Some(handle), &stop).await);
        assert!(stop.load(Ordering::SeqCst));
    }
}
