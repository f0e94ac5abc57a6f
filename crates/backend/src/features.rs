//! Feature record for one abalone specimen
//!
//! The model was trained on these eight columns in this exact order, so
//! `FEATURE_NAMES` is both the form contract and the model column contract.

use serde::{Deserialize, Serialize};

/// Number of model input columns
pub const FEATURE_COUNT: usize = 8;

/// Column names in model input order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "sex",
    "length",
    "diameter",
    "height",
    "weight",
    "shucked_weight",
    "viscera_weight",
    "shell_weight",
];

/// Immutable set of measurements for one specimen
///
/// Fields are private and only readable through accessors. Serializes to a
/// JSON object with the eight columns as keys, in column order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureRecord {
    sex: i64,
    length: f64,
    diameter: f64,
    height: f64,
    weight: f64,
    shucked_weight: f64,
    viscera_weight: f64,
    shell_weight: f64,
}

impl FeatureRecord {
    /// Creates a record from the eight measurements in column order
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sex: i64,
        length: f64,
        diameter: f64,
        height: f64,
        weight: f64,
        shucked_weight: f64,
        viscera_weight: f64,
        shell_weight: f64,
    ) -> Self {
        Self {
            sex,
            length,
            diameter,
            height,
            weight,
            shucked_weight,
            viscera_weight,
            shell_weight,
        }
    }

    pub fn sex(&self) -> i64 {
        self.sex
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn diameter(&self) -> f64 {
        self.diameter
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn shucked_weight(&self) -> f64 {
        self.shucked_weight
    }

    pub fn viscera_weight(&self) -> f64 {
        self.viscera_weight
    }

    pub fn shell_weight(&self) -> f64 {
        self.shell_weight
    }

    /// Returns the values in model column order
    pub fn feature_vector(&self) -> [f64; FEATURE_COUNT] {
        [
            self.sex as f64,
            self.length,
            self.diameter,
            self.height,
            self.weight,
            self.shucked_weight,
            self.viscera_weight,
            self.shell_weight,
        ]
    }

    /// Position of a named column in `FEATURE_NAMES`
    pub fn column_index(name: &str) -> Option<usize> {
        FEATURE_NAMES.iter().position(|column| *column == name)
    }

    /// Looks up a column value by name
    pub fn value_of(&self, name: &str) -> Option<f64> {
        Self::column_index(name).map(|index| self.feature_vector()[index])
    }

    /// Serializes the record to the JSON payload stored with each prediction
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
