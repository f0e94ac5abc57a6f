//! Shared CLI functionality for the abalone components
//!
//! This module provides the option groups that every binary flattens into
//! its own clap parser, so logging and health-check flags look the same
//! everywhere.

use crate::error::{Result, ServiceError};
use crate::logging::RotatingFileWriter;
use clap::Args;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Default size at which the log file is rotated (10 MiB)
pub const DEFAULT_LOG_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Default number of rotated log files kept next to the active one
pub const DEFAULT_LOG_BACKUPS: usize = 5;

/// Common logging options shared across all components
#[derive(Args, Debug, Clone)]
pub struct LoggingOptions {
    /// Logging level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", env = "ABALONE_LOG_LEVEL")]
    pub log_level: String,

    /// Log file path; an empty value or "-" logs to stdout instead
    #[arg(long, default_value = "app.log", env = "ABALONE_LOG_FILE")]
    pub log_file: String,

    /// Size in bytes at which the log file is rotated
    #[arg(long, default_value_t = DEFAULT_LOG_MAX_BYTES, env = "ABALONE_LOG_MAX_BYTES")]
    pub log_max_bytes: u64,

    /// Number of rotated log files to keep
    #[arg(long, default_value_t = DEFAULT_LOG_BACKUPS, env = "ABALONE_LOG_BACKUPS")]
    pub log_backups: usize,
}

/// Common health check options shared across all components
#[derive(Args, Debug, Clone)]
pub struct HealthCheckOptions {
    /// Health check endpoint path
    #[arg(long, default_value = "/health", env = "ABALONE_HEALTH_CHECK_PATH")]
    pub health_check_path: String,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: "app.log".to_string(),
            log_max_bytes: DEFAULT_LOG_MAX_BYTES,
            log_backups: DEFAULT_LOG_BACKUPS,
        }
    }
}

impl LoggingOptions {
    /// Initialize logging with the configured level and sink
    ///
    /// With a log file configured, events go to a size-bounded rotating
    /// file without ANSI colors. Otherwise they go to stdout.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the log file cannot be opened or
    /// a global subscriber is already installed.
    pub fn init_logging(&self) -> Result<()> {
        let level = self.parse_log_level();

        let installed = match self.log_file_path() {
            Some(path) => {
                let writer =
                    RotatingFileWriter::open(&path, self.log_max_bytes, self.log_backups)
                        .map_err(|e| {
                            ServiceError::configuration(
                                format!("Failed to open log file {}: {}", path.display(), e),
                                Some(Box::new(e)),
                            )
                        })?;

                let subscriber = FmtSubscriber::builder()
                    .with_max_level(level)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_ansi(false)
                    .with_writer(Mutex::new(writer))
                    .finish();
                tracing::subscriber::set_global_default(subscriber)
            }
            None => {
                let subscriber = FmtSubscriber::builder()
                    .with_max_level(level)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .finish();
                tracing::subscriber::set_global_default(subscriber)
            }
        };

        installed.map_err(|e| {
            ServiceError::configuration(
                format!("Failed to set logging subscriber: {}", e),
                Some(Box::new(e)),
            )
        })
    }

    /// Parse the log level string into a tracing Level
    pub fn parse_log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            "trace" => Level::TRACE,
            _ => Level::INFO,
        }
    }

    /// Returns the log file path, or `None` when logging to stdout
    pub fn log_file_path(&self) -> Option<PathBuf> {
        let trimmed = self.log_file.trim();
        if trimmed.is_empty() || trimmed == "-" {
            None
        } else {
            Some(PathBuf::from(trimmed))
        }
    }
}

impl Default for HealthCheckOptions {
    fn default() -> Self {
        Self {
            health_check_path: "/health".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        let opts = LoggingOptions {
            log_level: "debug".to_string(),
            ..LoggingOptions::default()
        };
        assert_eq!(opts.parse_log_level(), Level::DEBUG);

        let opts = LoggingOptions {
            log_level: "ERROR".to_string(),
            ..LoggingOptions::default()
        };
        assert_eq!(opts.parse_log_level(), Level::ERROR);

        let opts = LoggingOptions {
            log_level: "invalid".to_string(),
            ..LoggingOptions::default()
        };
        assert_eq!(opts.parse_log_level(), Level::INFO);
    }

    #[test]
    fn test_log_file_path() {
        let opts = LoggingOptions::default();
        assert_eq!(opts.log_file_path(), Some(PathBuf::from("app.log")));

        let opts = LoggingOptions {
            log_file: "-".to_string(),
            ..LoggingOptions::default()
        };
        assert_eq!(opts.log_file_path(), None);

        let opts = LoggingOptions {
            log_file: "  ".to_string(),
            ..LoggingOptions::default()
        };
        assert_eq!(opts.log_file_path(), None);
    }
}
