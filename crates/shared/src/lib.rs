//! # Abalone Shared Library
//!
//! Shared utilities for the abalone age prediction services. This crate
//! provides the pieces every component needs at startup: the service error
//! taxonomy, common CLI option groups, and logging initialization.
//!
//! ## Features
//!
//! - **Error Handling**: Service error types with HTTP status mapping
//! - **CLI Options**: Logging and health-check flags shared by all binaries
//! - **Logging**: `tracing` subscriber setup with a size-bounded rotating log file

pub mod cli;
pub mod error;
pub mod logging;

// Re-export commonly used types for convenience
pub use cli::{HealthCheckOptions, LoggingOptions};
pub use error::{Result, ServiceError};
pub use logging::RotatingFileWriter;
