//! Logging setup: stderr plus a daily rolling log file.

use crate::config::LoggingConfig;
use directories::ProjectDirs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE_PREFIX: &str = "zk-attendance-report.log";

/// Directory for log files: the configured one, else the platform data dir.
pub fn log_directory(config: &LoggingConfig) -> Option<PathBuf> {
    config.directory.clone().or_else(|| {
        ProjectDirs::from("", "", "zk-attendance-report").map(|dirs| dirs.data_local_dir().join("logs"))
    })
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. The returned guard flushes the
/// file writer and must live until the process exits. Without a usable log
/// directory only stderr logging is installed.
pub fn init(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let log_dir = log_directory(config).filter(|dir| std::fs::create_dir_all(dir).is_ok());
    let (file_layer, guard) = match &log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .is_ok();

    if installed {
        match &log_dir {
            Some(dir) => tracing::debug!("Logging to {}", dir.display()),
            None => tracing::warn!("No writable log directory, logging to stderr only"),
        }
    }

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_directory_wins() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            directory: Some(PathBuf::from("/var/log/zk")),
        };
        assert_eq!(log_directory(&config), Some(PathBuf::from("/var/log/zk")));
    }

    #[test]
    fn test_init_writes_into_configured_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            level: "info".to_string(),
            directory: Some(dir.path().join("logs")),
        };

        let guard = init(&config);
        assert!(guard.is_some());
        assert!(dir.path().join("logs").is_dir());
    }
}
