//! # Shared Error Handling Module
//!
//! Service-level error taxonomy for the abalone components. These errors
//! cover startup and infrastructure faults (configuration, model loading,
//! storage, networking). Per-request failures of the prediction pipeline
//! have their own typed errors in the backend crate and are converted to
//! HTTP responses at the request boundary.
//!
//! ## Error Categories
//!
//! - **Configuration Errors**: Invalid component configuration
//! - **Model Load Errors**: Missing or malformed model artifact (fatal at startup)
//! - **Storage Errors**: Backing store unavailable during startup or listing
//! - **Network Errors**: Listener bind failures and server I/O errors

use std::net::AddrParseError;
use thiserror::Error;
use tracing::warn;

/// Result type alias for service operations
///
/// This is the standard Result type used by startup code, configuration
/// loading and the HTTP server.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Boxed source error carried by the variants that wrap a lower-level cause
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Error types for service-level operations
///
/// Each variant carries enough context to produce an actionable log line.
/// Errors map to HTTP status codes where they can reach the HTTP layer.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Configuration validation errors
    ///
    /// These errors occur during startup when validating the provided
    /// configuration. They indicate user mistakes that must be corrected
    /// before the service can start.
    ///
    /// **HTTP Status Mapping**: Not applicable (startup error)
    ///
    /// **Recovery Strategy**: Fix configuration and restart
    #[error("Configuration error: {message}")]
    Configuration {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// Optional source error for additional context
        #[source]
        source: Option<BoxedSource>,
    },

    /// Model artifact could not be loaded
    ///
    /// The service must not accept traffic without a loaded model, so this
    /// error terminates the process during startup.
    ///
    /// **HTTP Status Mapping**: Not applicable (startup error)
    ///
    /// **Recovery Strategy**: Provide a valid model file and restart
    #[error("Failed to load model from {path}: {message}")]
    ModelLoad {
        /// Path of the model artifact
        path: String,
        /// Description of what went wrong
        message: String,
        /// Underlying parse or I/O error
        #[source]
        source: Option<BoxedSource>,
    },

    /// Backing store errors
    ///
    /// Raised when the prediction store cannot be opened, initialized or
    /// queried outside of the prediction pipeline.
    ///
    /// **HTTP Status Mapping**: 500 Internal Server Error
    ///
    /// **Recovery Strategy**: Check database path and permissions
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the failed storage operation
        message: String,
        /// Underlying database error
        #[source]
        source: Option<BoxedSource>,
    },

    /// Network-level errors
    ///
    /// Listener bind failures (port in use, permission denied) and fatal
    /// server I/O errors.
    ///
    /// **HTTP Status Mapping**: 502 Bad Gateway
    ///
    /// **Recovery Strategy**: Free the port or pick another listen address
    #[error("Network error on {target}: {message}")]
    Network {
        /// Address involved in the failure
        target: String,
        /// Descriptive error message
        message: String,
        /// Underlying network error for debugging
        #[source]
        source: Option<BoxedSource>,
    },
}

impl ServiceError {
    /// Creates a configuration error with context
    ///
    /// # Examples
    ///
    /// ```rust
    /// use abalone_shared::error::ServiceError;
    ///
    /// let error = ServiceError::configuration("Invalid listen address", None);
    /// ```
    pub fn configuration(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::Configuration {
            message: message.into(),
            source,
        }
    }

    /// Creates a model load error for the given artifact path
    ///
    /// # Examples
    ///
    /// ```rust
    /// use abalone_shared::error::ServiceError;
    ///
    /// let error = ServiceError::model_load("model.lgb", "file not found", None);
    /// ```
    pub fn model_load(
        path: impl Into<String>,
        message: impl Into<String>,
        source: Option<BoxedSource>,
    ) -> Self {
        Self::ModelLoad {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    /// Creates a storage error
    pub fn storage(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::Storage {
            message: message.into(),
            source,
        }
    }

    /// Creates a network error with target and context
    ///
    /// # Examples
    ///
    /// ```rust
    /// use abalone_shared::error::ServiceError;
    ///
    /// let error = ServiceError::network("127.0.0.1:8000", "Address already in use", None);
    /// ```
    pub fn network(
        target: impl Into<String>,
        message: impl Into<String>,
        source: Option<BoxedSource>,
    ) -> Self {
        Self::Network {
            target: target.into(),
            message: message.into(),
            source,
        }
    }

    /// Maps this error to an appropriate HTTP status code
    ///
    /// # Status Code Mapping
    ///
    /// - Configuration and model load errors: 500 (startup only, logged if seen)
    /// - Storage errors: 500 Internal Server Error
    /// - Network errors: 502 Bad Gateway
    pub fn to_http_status(&self) -> u16 {
        match self {
            ServiceError::Configuration { .. } | ServiceError::ModelLoad { .. } => {
                warn!("Startup error reached HTTP status mapping");
                500
            }
            ServiceError::Storage { .. } => 500,
            ServiceError::Network { .. } => 502,
        }
    }
}

/// Conversion from address parsing errors
///
/// Lets configuration code use `?` when parsing listen addresses.
impl From<AddrParseError> for ServiceError {
    fn from(err: AddrParseError) -> Self {
        ServiceError::configuration(
            format!("Invalid network address: {}", err),
            Some(Box::new(err)),
        )
    }
}
