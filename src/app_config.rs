//! Application configuration: TOML file defaults merged under CLI flags.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use harvester_core::download::{CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS};
use harvester_core::{DEFAULT_CONCURRENCY, DEFAULT_LINK_PATTERN, DEFAULT_RATE_LIMIT_MS};
use serde::Deserialize;

use crate::cli::Args;

/// Directory name under the user config directory.
const CONFIG_DIR_NAME: &str = "pdf-harvester";

const DEFAULT_OUTPUT_DIR: &str = "PDFs";
const DEFAULT_LEDGER_PATH: &str = "already_downloaded_urls.txt";
const DEFAULT_SEED_FILE: &str = "urls.txt";

/// TOML-backed file configuration. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Default output directory for downloads.
    pub output_dir: Option<PathBuf>,
    /// Default ledger path.
    pub ledger_path: Option<PathBuf>,
    /// Default seed file.
    pub seed_file: Option<PathBuf>,
    /// Default concurrency (same range as CLI).
    pub concurrency: Option<u8>,
    /// Default per-host pause in milliseconds.
    pub rate_limit_ms: Option<u64>,
    /// Total request timeout in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Document link regular expression.
    pub link_pattern: Option<String>,
    /// HTML archive path.
    pub html_archive: Option<PathBuf>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=100).contains(&concurrency)
        {
            bail!("Invalid config value for `concurrency`: {concurrency}. Expected range: 1..=100");
        }

        if let Some(rate_limit_ms) = self.rate_limit_ms
            && rate_limit_ms > 60_000
        {
            bail!(
                "Invalid config value for `rate_limit_ms`: {rate_limit_ms}. Expected range: 0..=60000"
            );
        }

        validate_timeout_secs("request_timeout_secs", self.request_timeout_secs)?;
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/pdf-harvester/config.toml`
/// 2. `$HOME/.config/pdf-harvester/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist. The default path is optional: when it is
/// absent, `Ok(None)` is returned.
pub fn load_file_config(explicit: Option<&Path>) -> Result<Option<(PathBuf, FileConfig)>> {
    if let Some(path) = explicit {
        let config = read_file_config(path)?;
        return Ok(Some((path.to_path_buf(), config)));
    }

    let Some(path) = resolve_default_config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    let config = read_file_config(&path)?;
    Ok(Some((path, config)))
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

/// Effective settings for one run, after merging CLI > file > defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub seeds: SeedSource,
    pub direct: bool,
    pub output_dir: PathBuf,
    pub ledger_path: PathBuf,
    pub concurrency: usize,
    pub rate_limit: Duration,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub link_pattern: String,
    pub html_archive: Option<PathBuf>,
    pub verbose: u8,
    pub quiet: bool,
    pub json: bool,
}

/// Where seed URLs come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedSource {
    /// URLs given on the command line.
    Inline(Vec<String>),
    /// A seed file to read.
    File(PathBuf),
}

impl RunSettings {
    /// Merges CLI flags over the file config over built-in defaults.
    #[must_use]
    pub fn resolve(args: &Args, file: Option<&FileConfig>) -> Self {
        let empty = FileConfig::default();
        let file = file.unwrap_or(&empty);

        let seeds = if args.urls.is_empty() {
            SeedSource::File(
                args.seed_file
                    .clone()
                    .or_else(|| file.seed_file.clone())
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SEED_FILE)),
            )
        } else {
            SeedSource::Inline(args.urls.clone())
        };

        let (verbose, quiet) = if args.verbose > 0 || args.quiet {
            (args.verbose, args.quiet)
        } else {
            match file.verbosity {
                Some(VerbositySetting::Verbose) => (1, false),
                Some(VerbositySetting::Debug) => (2, false),
                Some(VerbositySetting::Quiet) => (0, true),
                Some(VerbositySetting::Default) | None => (0, false),
            }
        };

        Self {
            seeds,
            direct: args.direct,
            output_dir: args
                .output_dir
                .clone()
                .or_else(|| file.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            ledger_path: args
                .ledger_path
                .clone()
                .or_else(|| file.ledger_path.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER_PATH)),
            concurrency: args
                .concurrency
                .or(file.concurrency)
                .map_or(DEFAULT_CONCURRENCY, usize::from),
            rate_limit: Duration::from_millis(
                args.rate_limit
                    .or(file.rate_limit_ms)
                    .unwrap_or(DEFAULT_RATE_LIMIT_MS),
            ),
            request_timeout: Duration::from_secs(
                args.request_timeout_secs
                    .or(file.request_timeout_secs)
                    .unwrap_or(REQUEST_TIMEOUT_SECS),
            ),
            connect_timeout: Duration::from_secs(
                file.connect_timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS),
            ),
            link_pattern: args
                .link_pattern
                .clone()
                .or_else(|| file.link_pattern.clone())
                .unwrap_or_else(|| DEFAULT_LINK_PATTERN.to_string()),
            html_archive: args
                .html_archive
                .clone()
                .or_else(|| file.html_archive.clone()),
            verbose,
            quiet,
            json: args.json,
        }
    }

    /// Default tracing filter directive for the effective verbosity.
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}
