/// Tracing setup for the two run modes.
///
/// Console mode writes to stderr. Service mode has no terminal, so it writes a
/// daily-rotated file through a non-blocking appender; the returned guard must
/// live until exit or buffered lines are lost.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "midivol.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init_console() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

pub fn init_file(dir: &Path) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(dir)?;

    let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    Ok(guard)
}

/// `logs/` next to the executable, or the working directory as a fallback.
pub fn default_log_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.join("logs")))
        .unwrap_or_else(|| PathBuf::from("."))
}
