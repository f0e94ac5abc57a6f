//! CLI options for the abalone backend
//!
//! Every flag can also be set through its `ABALONE_*` environment variable.

use crate::app::build_state;
use crate::config::BackendConfig;
use crate::pipeline::PersistenceFailurePolicy;
use crate::server::PredictionServer;
use abalone_shared::error::{Result, ServiceError};
use abalone_shared::{HealthCheckOptions, LoggingOptions};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Abalone backend - predicts abalone age from physical measurements
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct BackendCliOptions {
    /// Address to listen on
    #[arg(
        short,
        long,
        default_value = "127.0.0.1:8000",
        env = "ABALONE_LISTEN_ADDR"
    )]
    pub listen_addr: SocketAddr,

    /// Path to the LightGBM text model
    #[arg(short, long, default_value = "model.lgb", env = "ABALONE_MODEL_PATH")]
    pub model_path: PathBuf,

    /// Store every prediction and serve /view-predictions
    #[arg(long, env = "ABALONE_ENABLE_PERSISTENCE")]
    pub enable_persistence: bool,

    /// SQLite database file for stored predictions
    #[arg(long, default_value = "predictions.db", env = "ABALONE_DATABASE_PATH")]
    pub database_path: PathBuf,

    /// What to do when a prediction cannot be stored (fail_request, keep_prediction)
    #[arg(
        long,
        default_value = "fail_request",
        env = "ABALONE_PERSISTENCE_FAILURE_POLICY"
    )]
    pub persistence_failure_policy: PersistenceFailurePolicy,

    /// Reject negative measurements instead of scoring them
    #[arg(long, env = "ABALONE_REJECT_NEGATIVE_MEASUREMENTS")]
    pub reject_negative_measurements: bool,

    /// Service name used in logs
    #[arg(long, default_value = "abalone-backend", env = "ABALONE_SERVICE_NAME")]
    pub service_name: String,

    #[command(flatten)]
    pub logging: LoggingOptions,

    #[command(flatten)]
    pub health_check: HealthCheckOptions,
}

impl BackendCliOptions {
    /// Run the backend server with the configured options
    ///
    /// Loads the model and prepares storage before binding; returns once
    /// the server has shut down.
    pub async fn run(self) -> Result<()> {
        let config = self.to_config()?;

        info!(
            service_name = %config.service_name,
            listen_addr = %config.listen_addr,
            model_path = %config.model_path.display(),
            persistence = config.enable_persistence,
            policy = %config.persistence_failure_policy,
            "Backend server starting"
        );

        let state = build_state(&config).await?;
        PredictionServer::new(Arc::new(state), config.listen_addr)
            .run()
            .await?;

        info!("Backend server stopped");
        Ok(())
    }

    /// Convert CLI options to BackendConfig
    pub fn to_config(&self) -> Result<BackendConfig> {
        let config = BackendConfig {
            listen_addr: self.listen_addr,
            model_path: self.model_path.clone(),
            enable_persistence: self.enable_persistence,
            database_path: self.database_path.clone(),
            persistence_failure_policy: self.persistence_failure_policy,
            reject_negative_measurements: self.reject_negative_measurements,
            health_check_path: self.health_check.health_check_path.clone(),
            service_name: self.service_name.clone(),
        };
        config
            .validate()
            .map_err(|e| ServiceError::configuration(format!("invalid options: {}", e), None))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_backend_config() {
        let options = BackendCliOptions::try_parse_from(["abalone-backend"]).unwrap();
        assert_eq!(options.to_config().unwrap(), BackendConfig::default());
    }

    #[test]
    fn test_flags_override_defaults() {
        let options = BackendCliOptions::try_parse_from([
            "abalone-backend",
            "--listen-addr",
            "0.0.0.0:9000",
            "--model-path",
            "/models/abalone.lgb",
            "--enable-persistence",
            "--database-path",
            "/data/history.db",
            "--persistence-failure-policy",
            "keep_prediction",
            "--reject-negative-measurements",
        ])
        .unwrap();
        let config = options.to_config().unwrap();

        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.model_path, PathBuf::from("/models/abalone.lgb"));
        assert!(config.enable_persistence);
        assert_eq!(config.database_path, PathBuf::from("/data/history.db"));
        assert_eq!(
            config.persistence_failure_policy,
            PersistenceFailurePolicy::KeepPrediction
        );
        assert!(config.reject_negative_measurements);
    }

    #[test]
    fn test_rejects_unknown_policy() {
        let result = BackendCliOptions::try_parse_from([
            "abalone-backend",
            "--persistence-failure-policy",
            "retry",
        ]);
        assert!(result.is_err());
    }
}
