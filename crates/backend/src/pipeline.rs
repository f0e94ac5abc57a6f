//! Prediction pipeline
//!
//! One request flows through a fixed sequence:
//!
//! 1. **Validation**: every form field parses to its column type
//! 2. **Assembly**: the values become an immutable [`FeatureRecord`]
//! 3. **Inference**: the shared [`Regressor`] scores the record
//! 4. **Persistence**: when a store is configured, the pair is appended
//! 5. **Result shaping**: a [`PipelineOutcome`] is returned to the caller
//!
//! Failures at any step are returned as a typed [`PipelineError`] inside the
//! outcome; nothing is retried.

use crate::features::{FeatureRecord, FEATURE_COUNT, FEATURE_NAMES};
use crate::model::{InferenceError, Regressor};
use crate::store::PredictionRepository;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

/// What to do with a computed prediction when it cannot be stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceFailurePolicy {
    /// Discard the prediction and report the storage failure
    #[default]
    FailRequest,
    /// Return the prediction together with a storage warning
    KeepPrediction,
}

impl PersistenceFailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersistenceFailurePolicy::FailRequest => "fail_request",
            PersistenceFailurePolicy::KeepPrediction => "keep_prediction",
        }
    }
}

impl fmt::Display for PersistenceFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersistenceFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "fail_request" => Ok(PersistenceFailurePolicy::FailRequest),
            "keep_prediction" => Ok(PersistenceFailurePolicy::KeepPrediction),
            other => Err(format!(
                "unknown persistence failure policy '{}' (expected fail_request or keep_prediction)",
                other
            )),
        }
    }
}

/// Behavior switches for the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineOptions {
    pub persistence_failure_policy: PersistenceFailurePolicy,
    /// Reject negative physical measurements instead of scoring them
    pub reject_negative_measurements: bool,
}

/// A form field that is missing or does not coerce to its column type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid field '{field}': {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Category of a pipeline failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    Inference,
    Persistence,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Validation => "validation",
            FailureKind::Inference => "inference",
            FailureKind::Persistence => "persistence",
        }
    }
}

/// Typed failure of one prediction request
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("persistence failed: {cause}")]
    Persistence { cause: String },
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Validation(_) => FailureKind::Validation,
            PipelineError::Inference(_) => FailureKind::Inference,
            PipelineError::Persistence { .. } => FailureKind::Persistence,
        }
    }

    /// Offending field for validation failures
    pub fn field(&self) -> Option<&str> {
        match self {
            PipelineError::Validation(e) => Some(&e.field),
            _ => None,
        }
    }

    /// Validation is a client fault; everything else is a server fault
    pub fn to_http_status(&self) -> u16 {
        match self {
            PipelineError::Validation(_) => 400,
            PipelineError::Inference(_) | PipelineError::Persistence { .. } => 500,
        }
    }
}

/// Successful prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionSuccess {
    pub prediction: f64,
    /// Identity of the stored row, when the prediction was persisted
    pub stored_id: Option<i64>,
    /// Set when storage failed under `KeepPrediction`
    pub warning: Option<String>,
}

/// Tagged result of one prediction request
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Success(PredictionSuccess),
    Failure(PipelineError),
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success(_))
    }

    pub fn prediction(&self) -> Option<f64> {
        match self {
            PipelineOutcome::Success(success) => Some(success.prediction),
            PipelineOutcome::Failure(_) => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            PipelineOutcome::Success(_) => None,
            PipelineOutcome::Failure(e) => Some(e.kind()),
        }
    }
}

/// Orchestrates validation, inference and optional persistence
#[derive(Clone)]
pub struct PredictionPipeline {
    model: Arc<dyn Regressor>,
    store: Option<Arc<dyn PredictionRepository>>,
    options: PipelineOptions,
}

impl PredictionPipeline {
    /// Creates a pipeline around a loaded model
    ///
    /// Pass a store to enable the persistence variant.
    pub fn new(
        model: Arc<dyn Regressor>,
        store: Option<Arc<dyn PredictionRepository>>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            model,
            store,
            options,
        }
    }

    pub fn options(&self) -> PipelineOptions {
        self.options
    }

    pub fn persistence_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Runs one prediction request from raw form fields
    ///
    /// Never panics on bad input; every failure is reported in the outcome.
    #[instrument(skip_all)]
    pub async fn handle_prediction_request(
        &self,
        raw_fields: &HashMap<String, String>,
    ) -> PipelineOutcome {
        info!(input = ?raw_fields, "Received prediction request");

        match self.run(raw_fields).await {
            Ok(success) => {
                info!(
                    prediction = success.prediction,
                    stored_id = ?success.stored_id,
                    "Prediction completed"
                );
                PipelineOutcome::Success(success)
            }
            Err(e) => {
                match &e {
                    PipelineError::Validation(_) => {
                        warn!(error = %e, input = ?raw_fields, "Prediction request rejected")
                    }
                    _ => error!(error = %e, input = ?raw_fields, "Prediction request failed"),
                }
                PipelineOutcome::Failure(e)
            }
        }
    }

    async fn run(
        &self,
        raw_fields: &HashMap<String, String>,
    ) -> Result<PredictionSuccess, PipelineError> {
        let record = validate_fields(raw_fields, &self.options)?;
        let prediction = self.model.predict(&record)?;

        let Some(store) = &self.store else {
            return Ok(PredictionSuccess {
                prediction,
                stored_id: None,
                warning: None,
            });
        };

        match store.append(&record, prediction).await {
            Ok(stored) => Ok(PredictionSuccess {
                prediction,
                stored_id: Some(stored.id),
                warning: None,
            }),
            Err(e) => match self.options.persistence_failure_policy {
                PersistenceFailurePolicy::FailRequest => Err(PipelineError::Persistence {
                    cause: e.to_string(),
                }),
                PersistenceFailurePolicy::KeepPrediction => {
                    warn!(error = %e, prediction, "Prediction not stored, returning it anyway");
                    Ok(PredictionSuccess {
                        prediction,
                        stored_id: None,
                        warning: Some(format!("prediction was not saved: {}", e)),
                    })
                }
            },
        }
    }
}

impl fmt::Debug for PredictionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredictionPipeline")
            .field("persistence_enabled", &self.store.is_some())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Parses the raw form fields into a feature record
///
/// Fields are checked in column order and the first offending field is
/// reported. Extra fields are ignored.
pub fn validate_fields(
    raw_fields: &HashMap<String, String>,
    options: &PipelineOptions,
) -> Result<FeatureRecord, ValidationError> {
    let sex = parse_integer(raw_fields, FEATURE_NAMES[0])?;

    let mut measurements = [0.0_f64; FEATURE_COUNT - 1];
    for (slot, name) in measurements.iter_mut().zip(&FEATURE_NAMES[1..]) {
        let value = parse_float(raw_fields, name)?;
        if options.reject_negative_measurements && value < 0.0 {
            return Err(ValidationError::new(name, "must not be negative"));
        }
        *slot = value;
    }

    let [length, diameter, height, weight, shucked_weight, viscera_weight, shell_weight] =
        measurements;
    Ok(FeatureRecord::new(
        sex,
        length,
        diameter,
        height,
        weight,
        shucked_weight,
        viscera_weight,
        shell_weight,
    ))
}

fn raw_value<'a>(
    raw_fields: &'a HashMap<String, String>,
    name: &str,
) -> Result<&'a str, ValidationError> {
    let value = raw_fields
        .get(name)
        .map(|value| value.trim())
        .ok_or_else(|| ValidationError::new(name, "field required"))?;
    if value.is_empty() {
        return Err(ValidationError::new(name, "field required"));
    }
    Ok(value)
}

fn parse_integer(raw_fields: &HashMap<String, String>, name: &str) -> Result<i64, ValidationError> {
    let value = raw_value(raw_fields, name)?;
    value.parse::<i64>().map_err(|_| {
        ValidationError::new(name, format!("'{}' is not a valid integer", value))
    })
}

fn parse_float(raw_fields: &HashMap<String, String>, name: &str) -> Result<f64, ValidationError> {
    let value = raw_value(raw_fields, name)?;
    match value.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Ok(parsed),
        _ => Err(ValidationError::new(
            name,
            format!("'{}' is not a valid number", value),
        )),
    }
}
