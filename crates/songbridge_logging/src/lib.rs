//! Logging setup for SongBridge binaries.
//!
//! One registry, two layers:
//! - daily log file under `<home>/logs/<app>.<date>.log`, the last
//!   [`MAX_LOG_FILES`] days kept, written off-thread through a non-blocking
//!   writer
//! - stderr, `debug` with `--verbose`, `warn` with `--quiet`
//!
//! `RUST_LOG` overrides the default filter for both layers.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "songbridge=info,songbridge_core=info";
const VERBOSE_LOG_FILTER: &str = "songbridge=debug,songbridge_core=debug";

/// Daily files kept in the logs directory.
pub const MAX_LOG_FILES: usize = 5;

/// Environment variable that relocates the SongBridge home directory.
pub const HOME_ENV: &str = "SONGBRIDGE_HOME";

#[derive(Debug, Clone, Copy)]
pub struct LogConfig<'a> {
    /// Log file prefix.
    pub app_name: &'a str,
    pub verbose: bool,
    /// Only warnings and errors on stderr (the file still gets everything).
    pub quiet: bool,
}

/// Keeps the background log writer alive. Buffered lines are flushed when
/// this is dropped, so hold it until the process exits.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    log_dir: PathBuf,
    _worker: WorkerGuard,
}

impl LogGuard {
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

/// Install the global subscriber.
pub fn init_logging(config: LogConfig<'_>) -> Result<LogGuard> {
    let log_dir = ensure_logs_dir().context("Failed to ensure log directory")?;
    let appender = file_appender(&log_dir, config.app_name)?;
    let (file_writer, worker) = tracing_appender::non_blocking(appender);

    let default_filter = if config.verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let console_filter = if config.quiet {
        EnvFilter::new("warn")
    } else {
        env_filter(default_filter)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_thread_names(true)
                .with_filter(env_filter(default_filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Global tracing subscriber already installed")?;

    Ok(LogGuard {
        log_dir,
        _worker: worker,
    })
}

/// Daily rolling appender writing `<dir>/<app_name>.<date>.log`.
pub fn file_appender(dir: &Path, app_name: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(app_name)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .with_context(|| format!("Failed to open log file in {}", dir.display()))
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// SongBridge home directory: `$SONGBRIDGE_HOME`, else `~/.songbridge`.
///
/// Falls back to `./.songbridge` when no home directory can be determined.
pub fn songbridge_home() -> PathBuf {
    if let Ok(override_path) = std::env::var(HOME_ENV) {
        if !override_path.trim().is_empty() {
            return PathBuf::from(override_path);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".songbridge")
}

/// Logs directory: `<home>/logs`
pub fn logs_dir() -> PathBuf {
    songbridge_home().join("logs")
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn log_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_file_appender_writes_dated_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut appender = file_appender(dir.path(), "songbridge").unwrap();
        appender.write_all(b"dispatch completed\n").unwrap();
        appender.flush().unwrap();

        let names = log_files(dir.path());
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("songbridge."));
        assert!(names[0].ends_with(".log"));
        let content = fs::read_to_string(dir.path().join(&names[0])).unwrap();
        assert_eq!(content, "dispatch completed\n");
    }

    #[test]
    fn test_file_appender_appends_within_a_day() {
        let dir = tempfile::tempdir().unwrap();
        for line in ["first\n", "second\n"] {
            let mut appender = file_appender(dir.path(), "songbridge").unwrap();
            appender.write_all(line.as_bytes()).unwrap();
            appender.flush().unwrap();
        }

        let names = log_files(dir.path());
        assert_eq!(names.len(), 1);
        let content = fs::read_to_string(dir.path().join(&names[0])).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_non_blocking_writer_flushes_on_guard_drop() {
        let dir = tempfile::tempdir().unwrap();
        let appender = file_appender(dir.path(), "app").unwrap();
        let (mut writer, guard) = tracing_appender::non_blocking(appender);
        writer.write_all(b"queued line\n").unwrap();
        drop(guard);

        let names = log_files(dir.path());
        assert_eq!(names.len(), 1);
        let content = fs::read_to_string(dir.path().join(&names[0])).unwrap();
        assert_eq!(content, "queued line\n");
    }
}
