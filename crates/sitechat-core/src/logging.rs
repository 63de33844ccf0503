//! File logging.
//!
//! The TUI owns the terminal, so logs go to `${SITECHAT_HOME}/logs/sitechat.log`
//! (rotated daily). Filter with `SITECHAT_LOG` using `EnvFilter` syntax.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::paths;

pub const LOG_ENV: &str = "SITECHAT_LOG";
const LOG_FILE_PREFIX: &str = "sitechat.log";

/// Installs the global subscriber writing to the default logs directory.
///
/// Keep the returned guard alive until exit so buffered lines are flushed.
///
/// # Errors
/// Returns an error if the logs directory cannot be created or a
/// subscriber is already installed.
pub fn init() -> Result<WorkerGuard> {
    init_in(&paths::logs_dir())
}

/// Installs the global subscriber writing under `dir`.
///
/// # Errors
/// Returns an error if `dir` cannot be created or a subscriber is already installed.
pub fn init_in(dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create logs directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))?;

    Ok(guard)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_init_in_creates_logs_dir_and_rejects_second_install() {
        let dir = tempdir().unwrap();
        let logs = dir.path().join("logs");

        let guard = init_in(&logs).unwrap();
        assert!(logs.is_dir());
        tracing::info!("hello from test");

        assert!(init_in(&logs).is_err());
        drop(guard);
    }
}
