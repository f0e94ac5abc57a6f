//! # Abalone Backend
//!
//! Web service that predicts the age of an abalone from eight physical
//! measurements using a pre-trained gradient-boosted tree model.
//!
//! ## Features
//!
//! - LightGBM text model loading and tree-ensemble inference
//! - Form validation into a typed feature record
//! - Optional SQLite history of every prediction
//! - HTML pages rendered with askama
//!
//! ## Request flow
//!
//! ```text
//! form -> validation -> FeatureRecord -> Regressor -> (store) -> HTML / JSON
//! ```

pub mod app;
pub mod cli_options;
pub mod config;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod views;

pub use app::build_state;
pub use cli_options::BackendCliOptions;
pub use config::BackendConfig;
pub use features::{FeatureRecord, FEATURE_COUNT, FEATURE_NAMES};
pub use model::{GradientBoostedModel, InferenceError, ModelLoadError, Regressor};
pub use pipeline::{
    FailureKind, PersistenceFailurePolicy, PipelineError, PipelineOptions, PipelineOutcome,
    PredictionPipeline, PredictionSuccess, ValidationError,
};
pub use server::{AppState, BoundServer, PredictionServer};
pub use store::{PredictionRepository, SqlitePredictionStore, StoreError, StoredPrediction};
