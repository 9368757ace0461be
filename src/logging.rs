//! Tracing setup: daily log files for the interactive chat, stderr for
//! everything else.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;
use tracing_subscriber::{EnvFilter, filter::LevelFilter, fmt, prelude::*};

use crate::config::LoggingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// `companion_YYYYMMDD.log`; only errors are echoed to stderr
    File,
    Stderr,
}

/// `--verbose` forces debug, then `RUST_LOG`, then the configured level.
fn env_filter(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Install the global subscriber. Returns the log file when logging to one.
pub fn init(
    config: &LoggingConfig,
    logs_dir: &Path,
    verbose: bool,
    target: LogTarget,
) -> Result<Option<PathBuf>> {
    let filter = env_filter(config, verbose);

    match target {
        LogTarget::Stderr => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
            Ok(None)
        }
        LogTarget::File => {
            fs::create_dir_all(logs_dir)
                .with_context(|| format!("Failed to create {}", logs_dir.display()))?;
            let today = Local::now().date_naive();
            let pruned = prune_old_logs(logs_dir, config.retention_days, today)?;

            let path = log_file_for(logs_dir, today);
            // Append so several sessions on one day share a file
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?;

            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file))
                        .with_filter(filter),
                )
                .with(
                    fmt::layer()
                        .with_writer(io::stderr)
                        .with_filter(LevelFilter::ERROR),
                )
                .init();

            if pruned > 0 {
                debug!("Removed {} old log file(s)", pruned);
            }
            Ok(Some(path))
        }
    }
}

pub fn log_file_for(logs_dir: &Path, date: NaiveDate) -> PathBuf {
    logs_dir.join(format!("companion_{}.log", date.format("%Y%m%d")))
}

/// Delete `companion_YYYYMMDD.log` files older than `retention_days`.
/// Zero keeps everything.
pub fn prune_old_logs(logs_dir: &Path, retention_days: u32, today: NaiveDate) -> Result<usize> {
    if retention_days == 0 {
        return Ok(0);
    }
    let cutoff = today - chrono::Duration::days(i64::from(retention_days));
    let name_re = Regex::new(r"^companion_(\d{8})\.log$")?;
    let pattern = format!(
        "{}/companion_*.log",
        glob::Pattern::escape(&logs_dir.to_string_lossy())
    );

    let mut removed = 0;
    for path in glob::glob(&pattern)?.flatten() {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(date) = name_re
            .captures(name)
            .and_then(|c| NaiveDate::parse_from_str(&c[1], "%Y%m%d").ok())
        else {
            continue;
        };
        if date < cutoff && fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    Ok(removed)
}
