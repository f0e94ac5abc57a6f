//! Backend configuration management

use crate::pipeline::{PersistenceFailurePolicy, PipelineOptions};
use abalone_shared::error::{Result, ServiceError};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Configuration for the prediction backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    /// Address to bind the HTTP server to
    pub listen_addr: SocketAddr,
    /// Path to the LightGBM text model
    pub model_path: PathBuf,
    /// Store every prediction and serve the history page
    pub enable_persistence: bool,
    /// SQLite database file used when persistence is enabled
    pub database_path: PathBuf,
    /// What to do with a prediction that cannot be stored
    pub persistence_failure_policy: PersistenceFailurePolicy,
    /// Reject negative measurements during validation
    pub reject_negative_measurements: bool,
    /// Health check endpoint path
    pub health_check_path: String,
    /// Service name used in logs
    pub service_name: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            model_path: PathBuf::from("model.lgb"),
            enable_persistence: false,
            database_path: PathBuf::from("predictions.db"),
            persistence_failure_policy: PersistenceFailurePolicy::FailRequest,
            reject_negative_measurements: false,
            health_check_path: "/health".to_string(),
            service_name: "abalone-backend".to_string(),
        }
    }
}

impl BackendConfig {
    /// Creates configuration from environment variables, falling back to defaults
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `ABALONE_LISTEN_ADDR` | `listen_addr` |
    /// | `ABALONE_MODEL_PATH` | `model_path` |
    /// | `ABALONE_ENABLE_PERSISTENCE` | `enable_persistence` |
    /// | `ABALONE_DATABASE_PATH` | `database_path` |
    /// | `ABALONE_PERSISTENCE_FAILURE_POLICY` | `persistence_failure_policy` |
    /// | `ABALONE_REJECT_NEGATIVE_MEASUREMENTS` | `reject_negative_measurements` |
    /// | `ABALONE_HEALTH_CHECK_PATH` | `health_check_path` |
    /// | `ABALONE_SERVICE_NAME` | `service_name` |
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a variable is set to a value that
    /// does not parse, or when the resulting configuration is invalid.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(addr) = env_var("ABALONE_LISTEN_ADDR") {
            config.listen_addr = addr.parse()?;
        }
        if let Some(path) = env_var("ABALONE_MODEL_PATH") {
            config.model_path = PathBuf::from(path);
        }
        if let Some(value) = env_var("ABALONE_ENABLE_PERSISTENCE") {
            config.enable_persistence = parse_bool("ABALONE_ENABLE_PERSISTENCE", &value)?;
        }
        if let Some(path) = env_var("ABALONE_DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(value) = env_var("ABALONE_PERSISTENCE_FAILURE_POLICY") {
            config.persistence_failure_policy = PersistenceFailurePolicy::from_str(&value)
                .map_err(|e| ServiceError::configuration(e, None))?;
        }
        if let Some(value) = env_var("ABALONE_REJECT_NEGATIVE_MEASUREMENTS") {
            config.reject_negative_measurements =
                parse_bool("ABALONE_REJECT_NEGATIVE_MEASUREMENTS", &value)?;
        }
        if let Some(path) = env_var("ABALONE_HEALTH_CHECK_PATH") {
            config.health_check_path = path;
        }
        if let Some(name) = env_var("ABALONE_SERVICE_NAME") {
            config.service_name = name;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks values that parse but cannot work
    pub fn validate(&self) -> Result<()> {
        if self.model_path.as_os_str().is_empty() {
            return Err(ServiceError::configuration("model path must not be empty", None));
        }
        if self.enable_persistence && self.database_path.as_os_str().is_empty() {
            return Err(ServiceError::configuration(
                "database path must not be empty when persistence is enabled",
                None,
            ));
        }
        if !self.health_check_path.starts_with('/') {
            return Err(ServiceError::configuration(
                format!(
                    "health check path '{}' must start with '/'",
                    self.health_check_path
                ),
                None,
            ));
        }
        if matches!(
            self.health_check_path.as_str(),
            "/" | "/predict" | "/view-predictions"
        ) {
            return Err(ServiceError::configuration(
                format!(
                    "health check path '{}' collides with an application route",
                    self.health_check_path
                ),
                None,
            ));
        }
        if self.service_name.trim().is_empty() {
            return Err(ServiceError::configuration("service name must not be empty", None));
        }
        Ok(())
    }

    /// Pipeline switches derived from this configuration
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            persistence_failure_policy: self.persistence_failure_policy,
            reject_negative_measurements: self.reject_negative_measurements,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ServiceError::configuration(
            format!("{} must be a boolean, got '{}'", name, other),
            None,
        )),
    }
}
