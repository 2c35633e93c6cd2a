//! End-to-end CLI tests for the pdf-harvester binary.

// `Command::cargo_bin` is deprecated in assert_cmd >=2.0.17 in favor of
// `cargo::cargo_bin_cmd!` macro. Suppressed until migration to the new API.
#![allow(deprecated)]

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

/// Command isolated from the user's config and working directory.
fn harvester(work: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pdf-harvester").unwrap();
    cmd.current_dir(work)
        .env("XDG_CONFIG_HOME", work.join("config"))
        .env("HOME", work)
        .env_remove("RUST_LOG");
    cmd
}

fn write_harvester_config(work: &Path, contents: &str) {
    let config_dir = work.join("config").join("pdf-harvester");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.toml"), contents).unwrap();
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let work = TempDir::new().unwrap();
    harvester(work.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Bulk-download PDF documents"))
        .stdout(predicate::str::contains("--direct"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let work = TempDir::new().unwrap();
    harvester(work.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pdf-harvester"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    let work = TempDir::new().unwrap();
    harvester(work.path())
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_binary_rejects_out_of_range_concurrency() {
    let work = TempDir::new().unwrap();
    harvester(work.path())
        .args(["-c", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("concurrency"));
}

#[test]
fn test_binary_missing_seed_file_fails() {
    let work = TempDir::new().unwrap();
    harvester(work.path())
        .arg("-q")
        .assert()
        .failure()
        .stderr(predicate::str::contains("urls.txt"));
}

#[test]
fn test_binary_empty_seed_file_succeeds_without_output_dir() {
    let work = TempDir::new().unwrap();
    std::fs::write(work.path().join("urls.txt"), "\n\n").unwrap();

    harvester(work.path()).arg("-q").assert().success();
    assert!(!work.path().join("PDFs").exists());
}

#[test]
fn test_binary_rejects_unknown_config_key() {
    let work = TempDir::new().unwrap();
    write_harvester_config(work.path(), "retries = 3\n");

    harvester(work.path())
        .args(["--direct", "https://example.invalid/file/1/"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config"));
}

#[test]
fn test_binary_rejects_invalid_link_pattern() {
    let work = TempDir::new().unwrap();
    harvester(work.path())
        .args(["--link-pattern", "(", "https://example.invalid/list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid link pattern"));
}

fn seed_ledger(path: &Path, urls: &[&str]) {
    tokio_test::block_on(async {
        let ledger = harvester_core::Ledger::open(path).await;
        for url in urls {
            ledger.record(url).await.unwrap();
        }
    });
}

#[test]
fn test_binary_skips_ledger_urls_without_network() {
    let work = TempDir::new().unwrap();
    let url = "https://example.invalid/file/1/";
    seed_ledger(&work.path().join("already_downloaded_urls.txt"), &[url]);

    let output = harvester(work.path())
        .args(["--direct", "--json", "-q", url])
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["already_in_ledger"], 1);
    assert_eq!(
        summary["reports"][0]["outcome"]["reason"]["kind"],
        "already_in_ledger"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_direct_run_downloads_and_records() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/file/123/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/pdf")
                .insert_header("Content-Disposition", r#"attachment; filename="Doc.pdf""#)
                .set_body_bytes(b"0123456789".to_vec()),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let work = TempDir::new().unwrap();
    let url = format!("{}/file/123/", mock_server.uri());

    let output = harvester(work.path())
        .args(["--direct", "--json", "-q", "-l", "0", &url])
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["downloaded"], 1);
    assert_eq!(summary["reports"][0]["outcome"]["status"], "downloaded");

    assert_eq!(
        std::fs::read(work.path().join("PDFs").join("doc.pdf")).unwrap(),
        b"0123456789"
    );
    assert_eq!(
        std::fs::read_to_string(work.path().join("already_downloaded_urls.txt")).unwrap(),
        format!("{url}\n")
    );

    // Second run makes no request (mock expects exactly one) and still succeeds.
    harvester(work.path())
        .args(["--direct", "-q", &url])
        .assert()
        .success();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_download_failures_still_exit_zero() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let work = TempDir::new().unwrap();
    let seeds = format!(
        "{0}/file/1/\n{0}/file/2/\n",
        mock_server.uri()
    );
    std::fs::write(work.path().join("seeds.txt"), seeds).unwrap();
    write_harvester_config(work.path(), "output_dir = \"downloads\"\nrate_limit_ms = 0\n");

    let output = harvester(work.path())
        .args(["--direct", "--json", "-s", "seeds.txt"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["failed"], 2);
    assert_eq!(summary["failures_by_kind"]["http_status"], 2);
    assert!(work.path().join("downloads").is_dir());
    assert!(!work.path().join("already_downloaded_urls.txt").exists());
}
