//! CLI Tests
//!
//! Tests for shared CLI option groups.

use abalone_shared::cli::{HealthCheckOptions, LoggingOptions, DEFAULT_LOG_BACKUPS};
use clap::Parser;
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser, Debug)]
struct TestCli {
    #[command(flatten)]
    logging: LoggingOptions,

    #[command(flatten)]
    health_check: HealthCheckOptions,
}

#[test]
fn test_defaults_from_parser() {
    let cli = TestCli::parse_from(["test"]);
    assert_eq!(cli.logging.log_level, "info");
    assert_eq!(cli.logging.log_file_path(), Some(PathBuf::from("app.log")));
    assert_eq!(cli.logging.log_max_bytes, 10 * 1024 * 1024);
    assert_eq!(cli.logging.log_backups, DEFAULT_LOG_BACKUPS);
    assert_eq!(cli.health_check.health_check_path, "/health");
}

#[test]
fn test_flags_override_defaults() {
    let cli = TestCli::parse_from([
        "test",
        "--log-level",
        "debug",
        "--log-file",
        "-",
        "--log-backups",
        "2",
        "--health-check-path",
        "/live",
    ]);
    assert_eq!(cli.logging.parse_log_level(), Level::DEBUG);
    assert_eq!(cli.logging.log_file_path(), None);
    assert_eq!(cli.logging.log_backups, 2);
    assert_eq!(cli.health_check.health_check_path, "/live");
}
