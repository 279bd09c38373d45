//! Tracing setup for the command-line tools.
//!
//! [`init`] logs to stdout and to a per-launch file under `.softreg/logs`,
//! keeping only the newest [`MAX_LOG_FILES`] files. [`init_console`] logs to
//! stderr only. `RUST_LOG` overrides the default `info` filter.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

use crate::app_dirs;

/// Number of launch logs kept in the log directory.
pub const MAX_LOG_FILES: usize = 10;
const LOG_FILE_PREFIX: &str = "softreg";
const LOG_FILE_EXTENSION: &str = "log";
const DEFAULT_FILTER: &str = "info";

// Holds the file writer guard (if any) so buffered lines flush at exit.
static INSTALLED: OnceLock<Option<WorkerGuard>> = OnceLock::new();

type LocalTimer = OffsetTime<BorrowedFormatItem<'static>>;

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Log directory unavailable: {0}")]
    AppDir(#[from] app_dirs::AppDirError),
    #[error("Failed to list log files in {path}: {source}")]
    ListLogs {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to delete stale log {path}: {source}")]
    PruneLog {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to open a log file in {dir}: {source}")]
    OpenLogFile { dir: PathBuf, source: InitError },
    #[error("Failed to format log file timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error("A global tracing subscriber is already installed: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Log to stdout and to a file in the app logs directory.
///
/// Later calls are no-ops. On error nothing is installed, so callers can fall
/// back to [`init_console`].
pub fn init() -> Result<(), LoggingError> {
    init_in(&app_dirs::logs_dir()?)
}

/// Log to stdout and to `softreg_<timestamp>.log` inside `log_dir`.
pub fn init_in(log_dir: &Path) -> Result<(), LoggingError> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let stem = log_file_stem(now)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(stem.clone())
        .filename_suffix(LOG_FILE_EXTENSION)
        .build(log_dir)
        .map_err(|source| LoggingError::OpenLogFile {
            dir: log_dir.to_path_buf(),
            source,
        })?;
    prune_old_logs(log_dir, MAX_LOG_FILES)?;

    let (file_writer, guard) = tracing_appender::non_blocking(appender);
    let subscriber = Registry::default()
        .with(env_filter())
        .with(fmt::layer().with_timer(local_timer()))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_timer(local_timer())
                .with_writer(file_writer),
        );
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = INSTALLED.set(Some(guard));

    let file = log_dir.join(format!("{stem}.{LOG_FILE_EXTENSION}"));
    tracing::info!(file = %file.display(), "File logging enabled");
    Ok(())
}

/// Log to stderr only, leaving stdout free for command output.
pub fn init_console() -> Result<(), LoggingError> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }
    let subscriber = Registry::default().with(env_filter()).with(
        fmt::layer()
            .with_timer(local_timer())
            .with_writer(std::io::stderr),
    );
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = INSTALLED.set(None);
    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn local_timer() -> LocalTimer {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(
        offset,
        BorrowedFormatItem::Compound(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        )),
    )
}

fn log_file_stem(now: OffsetDateTime) -> Result<String, LoggingError> {
    let stamp = now.format(format_description!(
        "[year]-[month]-[day]_[hour]-[minute]-[second]"
    ))?;
    Ok(format!("{LOG_FILE_PREFIX}_{stamp}"))
}

/// Delete all but the `keep` most recently modified `.log` files in `dir`.
fn prune_old_logs(dir: &Path, keep: usize) -> Result<(), LoggingError> {
    let mut logs = log_files(dir)?;
    logs.sort_by(|a, b| b.0.cmp(&a.0));
    for (_, path) in logs.into_iter().skip(keep) {
        fs::remove_file(&path).map_err(|source| LoggingError::PruneLog { path, source })?;
    }
    Ok(())
}

fn log_files(dir: &Path) -> Result<Vec<(SystemTime, PathBuf)>, LoggingError> {
    let entries = fs::read_dir(dir).map_err(|source| LoggingError::ListLogs {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut logs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != LOG_FILE_EXTENSION) {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if meta.is_file() {
            logs.push((meta.modified().unwrap_or(SystemTime::UNIX_EPOCH), path));
        }
    }
    Ok(logs)
}
