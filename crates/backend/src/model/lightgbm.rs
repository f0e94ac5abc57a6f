//! LightGBM text model loader
//!
//! Reads the plain-text format written by `Booster.save_model()`: a `tree`
//! magic line, `key=value` header lines, one `Tree=N` block per tree and an
//! `end of trees` marker. Everything after the marker (feature importances,
//! training parameters) is ignored.
//!
//! Model feature names are bound to [`FeatureRecord`] columns by name when
//! the model is loaded, so a model trained with a different column order
//! still receives the right values.

use super::tree::{Tree, TreeArrays};
use super::{InferenceError, ModelLoadError, Regressor};
use crate::features::FeatureRecord;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Link applied to the summed tree output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// Raw score is the prediction
    Identity,
    /// Log-link objectives (poisson, gamma, tweedie)
    Exp,
}

impl Objective {
    /// Resolves a LightGBM objective name; `None` for unsupported objectives
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "regression" | "regression_l2" | "l2" | "mean_squared_error" | "mse"
            | "regression_l1" | "l1" | "mean_absolute_error" | "mae" | "huber" | "fair"
            | "quantile" | "mape" => Some(Objective::Identity),
            "poisson" | "gamma" | "tweedie" => Some(Objective::Exp),
            _ => None,
        }
    }

    fn transform(self, raw: f64) -> f64 {
        match self {
            Objective::Identity => raw,
            Objective::Exp => raw.exp(),
        }
    }
}

/// Gradient-boosted regression tree ensemble
#[derive(Debug, Clone)]
pub struct GradientBoostedModel {
    trees: Vec<Tree>,
    objective: Objective,
    objective_name: String,
    average_output: bool,
    feature_names: Vec<String>,
    /// Record column index for each model feature index
    columns: Vec<usize>,
}

/// Lines of one `Tree=N` block, keyed by field name
struct TreeBlock<'a> {
    index: usize,
    line: usize,
    fields: HashMap<&'a str, (usize, &'a str)>,
}

impl GradientBoostedModel {
    /// Loads a model from a LightGBM text model file
    ///
    /// # Errors
    ///
    /// Returns [`ModelLoadError`] when the file is missing, unreadable or
    /// malformed, or when the model does not fit the abalone feature record.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelLoadError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Reading model file");

        let text = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let model = Self::parse(&text)?;

        info!(
            path = %path.display(),
            trees = model.trees.len(),
            objective = %model.objective_name,
            features = model.feature_names.len(),
            "Model loaded"
        );
        Ok(model)
    }

    /// Parses the contents of a LightGBM text model
    pub fn parse(text: &str) -> Result<Self, ModelLoadError> {
        let mut header: HashMap<&str, (usize, &str)> = HashMap::new();
        let mut blocks: Vec<TreeBlock<'_>> = Vec::new();
        let mut saw_magic = false;
        let mut end_line = None;

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "end of trees" {
                end_line = Some(line_no);
                break;
            }
            if !saw_magic {
                if line != "tree" {
                    return Err(ModelLoadError::Malformed {
                        line: line_no,
                        message: format!("expected 'tree' header, found '{}'", line),
                    });
                }
                saw_magic = true;
                continue;
            }

            // flags such as `average_output` are written without a value
            let (key, value) = line.split_once('=').unwrap_or((line, ""));
            if key == "Tree" {
                let index = value.parse::<usize>().map_err(|e| ModelLoadError::Malformed {
                    line: line_no,
                    message: format!("invalid tree index '{}': {}", value, e),
                })?;
                blocks.push(TreeBlock {
                    index,
                    line: line_no,
                    fields: HashMap::new(),
                });
                continue;
            }

            match blocks.last_mut() {
                Some(block) => {
                    block.fields.insert(key, (line_no, value));
                }
                None => {
                    header.insert(key, (line_no, value));
                }
            }
        }

        if !saw_magic {
            return Err(ModelLoadError::Malformed {
                line: 1,
                message: "empty model file".to_string(),
            });
        }
        let end_line = end_line.ok_or_else(|| ModelLoadError::Malformed {
            line: text.lines().count(),
            message: "missing 'end of trees' marker".to_string(),
        })?;

        if let Some(&(line, value)) = header.get("num_class") {
            let num_class: usize = parse_scalar(line, "num_class", value)?;
            if num_class != 1 {
                return Err(ModelLoadError::Unsupported(format!(
                    "{} classes; only single-output regression models are served",
                    num_class
                )));
            }
        }

        let (line, objective_value) = required_header(&header, "objective")?;
        let objective_name = objective_value
            .split_whitespace()
            .next()
            .ok_or_else(|| ModelLoadError::Malformed {
                line,
                message: "empty objective".to_string(),
            })?
            .to_string();
        let objective = Objective::from_name(&objective_name).ok_or_else(|| {
            ModelLoadError::Unsupported(format!("objective '{}'", objective_name))
        })?;

        let (line, names) = required_header(&header, "feature_names")?;
        let feature_names: Vec<String> = names.split_whitespace().map(str::to_string).collect();
        if feature_names.is_empty() {
            return Err(ModelLoadError::Malformed {
                line,
                message: "feature_names is empty".to_string(),
            });
        }
        if let Some(&(line, value)) = header.get("max_feature_idx") {
            let max_feature_idx: usize = parse_scalar(line, "max_feature_idx", value)?;
            if max_feature_idx.checked_add(1) != Some(feature_names.len()) {
                return Err(ModelLoadError::Malformed {
                    line,
                    message: format!(
                        "max_feature_idx={} but {} feature names are listed",
                        max_feature_idx,
                        feature_names.len()
                    ),
                });
            }
        }

        let columns = feature_names
            .iter()
            .map(|name| {
                FeatureRecord::column_index(name)
                    .ok_or_else(|| ModelLoadError::UnknownFeature(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if blocks.is_empty() {
            return Err(ModelLoadError::Malformed {
                line: end_line,
                message: "model contains no trees".to_string(),
            });
        }

        let trees = blocks
            .iter()
            .map(|block| build_tree(block, feature_names.len()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            trees,
            objective,
            objective_name,
            average_output: header.contains_key("average_output"),
            feature_names,
            columns,
        })
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn objective_name(&self) -> &str {
        &self.objective_name
    }

    /// Scores a row already laid out in model feature order
    pub fn predict_row(&self, row: &[f64]) -> Result<f64, InferenceError> {
        if row.len() != self.columns.len() {
            return Err(InferenceError::new(format!(
                "expected {} features, got {}",
                self.columns.len(),
                row.len()
            )));
        }

        let mut raw: f64 = self.trees.iter().map(|tree| tree.predict(row)).sum();
        if self.average_output {
            raw /= self.trees.len() as f64;
        }

        let score = self.objective.transform(raw);
        if !score.is_finite() {
            return Err(InferenceError::new(format!(
                "model produced a non-finite score ({})",
                score
            )));
        }
        Ok(score)
    }
}

impl Regressor for GradientBoostedModel {
    fn predict(&self, record: &FeatureRecord) -> Result<f64, InferenceError> {
        let values = record.feature_vector();
        let row: Vec<f64> = self.columns.iter().map(|&column| values[column]).collect();
        self.predict_row(&row)
    }
}

fn required_header<'a>(
    header: &HashMap<&'a str, (usize, &'a str)>,
    key: &str,
) -> Result<(usize, &'a str), ModelLoadError> {
    header
        .get(key)
        .copied()
        .ok_or_else(|| ModelLoadError::Malformed {
            line: 1,
            message: format!("missing '{}' header", key),
        })
}

fn parse_scalar<T>(line: usize, key: &str, value: &str) -> Result<T, ModelLoadError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ModelLoadError::Malformed {
        line,
        message: format!("invalid {} '{}': {}", key, value, e),
    })
}

fn parse_list<T>(line: usize, key: &str, value: &str) -> Result<Vec<T>, ModelLoadError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .split_whitespace()
        .map(|item| parse_scalar(line, key, item))
        .collect()
}

fn build_tree(block: &TreeBlock<'_>, num_features: usize) -> Result<Tree, ModelLoadError> {
    let invalid = |message: String| ModelLoadError::InvalidTree {
        tree: block.index,
        message,
    };
    let field = |key: &str| {
        block
            .fields
            .get(key)
            .copied()
            .ok_or_else(|| invalid(format!("missing '{}' (block starts at line {})", key, block.line)))
    };
    let list_or_empty = |key: &str| block.fields.get(key).copied();

    if let Some((line, value)) = list_or_empty("is_linear") {
        let is_linear: u8 = parse_scalar(line, "is_linear", value)?;
        if is_linear != 0 {
            return Err(ModelLoadError::Unsupported(format!(
                "tree {} has linear leaves",
                block.index
            )));
        }
    }

    let (line, value) = field("num_leaves")?;
    let num_leaves: usize = parse_scalar(line, "num_leaves", value)?;

    let (line, value) = field("leaf_value")?;
    let leaf_value: Vec<f64> = parse_list(line, "leaf_value", value)?;
    if leaf_value.len() != num_leaves {
        return Err(invalid(format!(
            "num_leaves={} but {} leaf values",
            num_leaves,
            leaf_value.len()
        )));
    }
    if num_leaves == 1 {
        return Ok(Tree::constant(leaf_value[0]));
    }

    let (line, value) = field("split_feature")?;
    let split_feature = parse_list(line, "split_feature", value)?;
    let (line, value) = field("threshold")?;
    let threshold = parse_list(line, "threshold", value)?;
    let (line, value) = field("decision_type")?;
    let decision_type = parse_list(line, "decision_type", value)?;
    let (line, value) = field("left_child")?;
    let left_child = parse_list(line, "left_child", value)?;
    let (line, value) = field("right_child")?;
    let right_child = parse_list(line, "right_child", value)?;

    let cat_boundaries = match list_or_empty("cat_boundaries") {
        Some((line, value)) => parse_list(line, "cat_boundaries", value)?,
        None => Vec::new(),
    };
    let cat_threshold = match list_or_empty("cat_threshold") {
        Some((line, value)) => parse_list(line, "cat_threshold", value)?,
        None => Vec::new(),
    };

    Tree::new(
        TreeArrays {
            split_feature,
            threshold,
            decision_type,
            left_child,
            right_child,
            leaf_value,
            cat_boundaries,
            cat_threshold,
        },
        num_features,
    )
    .map_err(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = include_str!("../../tests/fixtures/abalone_model.lgb");

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_parse_fixture() {
        let model = GradientBoostedModel::parse(FIXTURE).unwrap();
        assert_eq!(model.num_trees(), 3);
        assert_eq!(model.objective(), Objective::Identity);
        assert_eq!(model.objective_name(), "regression");
        assert_eq!(model.feature_names().len(), 8);
    }

    #[test]
    fn test_predict_sums_trees() {
        let model = GradientBoostedModel::parse(FIXTURE).unwrap();

        // 11.75 - 0.35 - 0.4
        let adult = FeatureRecord::new(1, 0.5, 0.4, 0.1, 0.8, 0.3, 0.2, 0.2);
        assert_close(model.predict(&adult).unwrap(), 11.0);

        // 8.5 + 0.25 + 0.1
        let infant = FeatureRecord::new(0, 0.3, 0.2, 0.07, 0.15, 0.07, 0.03, 0.05);
        assert_close(model.predict(&infant).unwrap(), 8.85);
    }

    #[test]
    fn test_predict_batch_matches_single() {
        let model = GradientBoostedModel::parse(FIXTURE).unwrap();
        let records = [
            FeatureRecord::new(1, 0.5, 0.4, 0.1, 0.8, 0.3, 0.2, 0.2),
            FeatureRecord::new(2, 0.6, 0.45, 0.2, 1.1, 0.4, 0.25, 0.3),
        ];
        let batch = model.predict_batch(&records).unwrap();
        assert_eq!(batch.len(), 2);
        for (record, score) in records.iter().zip(batch) {
            assert_eq!(model.predict(record).unwrap(), score);
        }
    }

    #[test]
    fn test_columns_bound_by_name() {
        // single split on shell_weight, listed first in the model
        let text = "tree\nmax_feature_idx=1\nobjective=regression\n\
                    feature_names=shell_weight sex\n\n\
                    Tree=0\nnum_leaves=2\nsplit_feature=0\nthreshold=0.5\n\
                    decision_type=0\nleft_child=-1\nright_child=-2\nleaf_value=1 2\n\n\
                    end of trees\n";
        let model = GradientBoostedModel::parse(text).unwrap();

        let light = FeatureRecord::new(3, 0.5, 0.4, 0.1, 0.8, 0.3, 0.2, 0.2);
        let heavy = FeatureRecord::new(0, 0.5, 0.4, 0.1, 0.8, 0.3, 0.2, 0.9);
        assert_eq!(model.predict(&light).unwrap(), 1.0);
        assert_eq!(model.predict(&heavy).unwrap(), 2.0);
    }

    #[test]
    fn test_log_link_and_average_output() {
        let text = "tree\nobjective=poisson\nfeature_names=sex\naverage_output\n\n\
                    Tree=0\nnum_leaves=1\nleaf_value=1\n\n\
                    Tree=1\nnum_leaves=1\nleaf_value=3\n\n\
                    end of trees\n";
        let model = GradientBoostedModel::parse(text).unwrap();
        let record = FeatureRecord::new(1, 0.5, 0.4, 0.1, 0.8, 0.3, 0.2, 0.2);
        assert_close(model.predict(&record).unwrap(), 2.0_f64.exp());
    }

    #[test]
    fn test_non_finite_score_is_inference_error() {
        let text = "tree\nobjective=regression\nfeature_names=sex\n\n\
                    Tree=0\nnum_leaves=1\nleaf_value=inf\n\n\
                    end of trees\n";
        let model = GradientBoostedModel::parse(text).unwrap();
        let record = FeatureRecord::new(1, 0.5, 0.4, 0.1, 0.8, 0.3, 0.2, 0.2);
        let err = model.predict(&record).unwrap_err();
        assert!(err.cause.contains("non-finite"));
    }

    #[test]
    fn test_predict_row_checks_width() {
        let model = GradientBoostedModel::parse(FIXTURE).unwrap();
        assert!(model.predict_row(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_rejects_malformed_models() {
        assert!(matches!(
            GradientBoostedModel::parse(""),
            Err(ModelLoadError::Malformed { .. })
        ));
        assert!(matches!(
            GradientBoostedModel::parse("not a model\n"),
            Err(ModelLoadError::Malformed { line: 1, .. })
        ));

        let truncated = FIXTURE.split("end of trees").next().unwrap();
        assert!(matches!(
            GradientBoostedModel::parse(truncated),
            Err(ModelLoadError::Malformed { .. })
        ));

        let no_trees = "tree\nobjective=regression\nfeature_names=sex\nend of trees\n";
        assert!(matches!(
            GradientBoostedModel::parse(no_trees),
            Err(ModelLoadError::Malformed { .. })
        ));

        let bad_number = FIXTURE.replace("threshold=0.25", "threshold=abc");
        assert!(matches!(
            GradientBoostedModel::parse(&bad_number),
            Err(ModelLoadError::Malformed { .. })
        ));

        let missing_leaves = FIXTURE.replace("leaf_value=0.25 -0.35", "leaf_value=0.25");
        assert!(matches!(
            GradientBoostedModel::parse(&missing_leaves),
            Err(ModelLoadError::InvalidTree { tree: 1, .. })
        ));

        let huge_feature_idx =
            FIXTURE.replace("max_feature_idx=7", "max_feature_idx=18446744073709551615");
        assert!(matches!(
            GradientBoostedModel::parse(&huge_feature_idx),
            Err(ModelLoadError::Malformed { line: 6, .. })
        ));

        let huge_category_set =
            FIXTURE.replace("threshold=0 0.125", "threshold=1e30 0.125");
        assert!(matches!(
            GradientBoostedModel::parse(&huge_category_set),
            Err(ModelLoadError::InvalidTree { tree: 2, .. })
        ));
    }

    #[test]
    fn test_rejects_incompatible_models() {
        let unknown = FIXTURE.replace("shell_weight\n", "rings\n");
        assert!(matches!(
            GradientBoostedModel::parse(&unknown),
            Err(ModelLoadError::UnknownFeature(name)) if name == "rings"
        ));

        let binary = FIXTURE.replace("objective=regression", "objective=binary sigmoid:1");
        assert!(matches!(
            GradientBoostedModel::parse(&binary),
            Err(ModelLoadError::Unsupported(_))
        ));

        let multiclass = FIXTURE.replace("num_class=1", "num_class=3");
        assert!(matches!(
            GradientBoostedModel::parse(&multiclass),
            Err(ModelLoadError::Unsupported(_))
        ));

        // tree 1 rewritten as a linear tree; leaf_value alone would score it wrongly
        let linear = FIXTURE.replace(
            "internal_count=4177\nis_linear=0",
            "internal_count=4177\nis_linear=1\nleaf_const=0.25 -0.35\n\
             num_features=1 1\nleaf_features=5 5\nleaf_coeff=100 100",
        );
        assert_ne!(linear, FIXTURE);
        assert!(matches!(
            GradientBoostedModel::parse(&linear),
            Err(ModelLoadError::Unsupported(reason)) if reason.contains("tree 1")
        ));

        let constant_linear = "tree\nobjective=regression\nfeature_names=sex\n\n\
                               Tree=0\nnum_leaves=1\nleaf_value=1\nis_linear=1\n\n\
                               end of trees\n";
        assert!(matches!(
            GradientBoostedModel::parse(constant_linear),
            Err(ModelLoadError::Unsupported(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = GradientBoostedModel::load("/nonexistent/abalone/model.lgb");
        assert!(matches!(result, Err(ModelLoadError::Io { .. })));
    }
}
