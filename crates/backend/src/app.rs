//! Startup wiring
//!
//! Loads the model and prepares the prediction store before the listener is
//! bound. Any failure here is fatal: the process exits without serving.

use crate::config::BackendConfig;
use crate::model::{GradientBoostedModel, Regressor};
use crate::server::AppState;
use crate::store::{PredictionRepository, SqlitePredictionStore};
use abalone_shared::error::{Result, ServiceError};
use std::sync::Arc;
use tracing::{error, info};

/// Builds the shared request state from a validated configuration
///
/// # Errors
///
/// - model load failure (`ServiceError::ModelLoad`)
/// - schema creation failure when persistence is enabled
///   (`ServiceError::Storage`)
pub async fn build_state(config: &BackendConfig) -> Result<AppState> {
    let model = GradientBoostedModel::load(&config.model_path).map_err(|e| {
        error!(path = %config.model_path.display(), error = %e, "Failed to load model");
        ServiceError::model_load(
            config.model_path.display().to_string(),
            e.to_string(),
            Some(Box::new(e)),
        )
    })?;
    let model: Arc<dyn Regressor> = Arc::new(model);

    let store = if config.enable_persistence {
        let store = SqlitePredictionStore::new(&config.database_path);
        store.ensure_schema().await.map_err(|e| {
            error!(
                path = %config.database_path.display(),
                error = %e,
                "Error creating table"
            );
            ServiceError::storage(
                format!("cannot prepare prediction store: {}", e),
                Some(Box::new(e)),
            )
        })?;
        info!(path = %config.database_path.display(), "Prediction persistence enabled");
        Some(Arc::new(store) as Arc<dyn PredictionRepository>)
    } else {
        None
    };

    Ok(AppState::new(
        model,
        store,
        config.pipeline_options(),
        config.health_check_path.clone(),
    ))
}
