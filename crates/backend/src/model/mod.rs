//! Model adapter
//!
//! The service treats the regression model as an opaque, read-only artifact
//! loaded once at startup. Callers only see the [`Regressor`] trait; the
//! concrete implementation is a gradient-boosted tree ensemble read from a
//! LightGBM text model file.
//!
//! # Module Structure
//!
//! - [`tree`]: a single decision tree and its traversal rules
//! - [`lightgbm`]: the text model parser and [`GradientBoostedModel`]

pub mod lightgbm;
pub mod tree;

use crate::features::FeatureRecord;
use std::path::PathBuf;
use thiserror::Error;

pub use lightgbm::{GradientBoostedModel, Objective};
pub use tree::Tree;

/// Pure prediction function over a feature record
///
/// Implementations must not mutate state during `predict`; the same
/// instance is shared by every in-flight request.
pub trait Regressor: Send + Sync {
    /// Predicts the target for a single record
    fn predict(&self, record: &FeatureRecord) -> Result<f64, InferenceError>;

    /// Predicts the target for several records
    fn predict_batch(&self, records: &[FeatureRecord]) -> Result<Vec<f64>, InferenceError> {
        records.iter().map(|record| self.predict(record)).collect()
    }
}

/// Failure while evaluating the model for one request
#[derive(Debug, Clone, PartialEq, Error)]
#[error("inference failed: {cause}")]
pub struct InferenceError {
    /// Human-readable cause, surfaced in the error response
    pub cause: String,
}

impl InferenceError {
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
        }
    }
}

/// Failure while loading the model artifact
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("cannot read model file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed model at line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("invalid tree {tree}: {message}")]
    InvalidTree { tree: usize, message: String },

    #[error("model feature '{0}' does not match any input column")]
    UnknownFeature(String),

    #[error("unsupported model: {0}")]
    Unsupported(String),
}
