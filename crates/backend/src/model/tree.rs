//! Decision tree in LightGBM's flat array layout
//!
//! Internal nodes are indexed `0..num_leaves - 1`. A child reference `c >= 0`
//! is another internal node; `c < 0` is leaf `!c`. Every internal child has a
//! larger index than its parent, which `Tree::new` checks so traversal always
//! terminates.

/// Bit marking a categorical split in `decision_type`
const CATEGORICAL_MASK: u8 = 1;
/// Bit sending missing values to the left child
const DEFAULT_LEFT_MASK: u8 = 2;
/// Values this close to zero count as zero for `MissingType::Zero`
const ZERO_THRESHOLD: f64 = 1e-35;

/// How a split treats missing values (bits 2..4 of `decision_type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MissingType {
    None,
    Zero,
    NaN,
}

impl MissingType {
    fn from_decision_type(decision_type: u8) -> Self {
        match (decision_type >> 2) & 3 {
            1 => MissingType::Zero,
            2 => MissingType::NaN,
            _ => MissingType::None,
        }
    }
}

/// One regression tree of the ensemble
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    split_feature: Vec<usize>,
    threshold: Vec<f64>,
    decision_type: Vec<u8>,
    left_child: Vec<i32>,
    right_child: Vec<i32>,
    leaf_value: Vec<f64>,
    cat_boundaries: Vec<usize>,
    cat_threshold: Vec<u32>,
}

/// Raw arrays of one tree as read from the model file
#[derive(Debug, Clone, Default)]
pub struct TreeArrays {
    pub split_feature: Vec<usize>,
    pub threshold: Vec<f64>,
    pub decision_type: Vec<u8>,
    pub left_child: Vec<i32>,
    pub right_child: Vec<i32>,
    pub leaf_value: Vec<f64>,
    pub cat_boundaries: Vec<usize>,
    pub cat_threshold: Vec<u32>,
}

impl Tree {
    /// Builds a tree, checking array shapes and child references
    ///
    /// `num_features` bounds `split_feature`. Returns a description of the
    /// first inconsistency found.
    pub fn new(arrays: TreeArrays, num_features: usize) -> Result<Self, String> {
        let num_leaves = arrays.leaf_value.len();
        if num_leaves == 0 {
            return Err("tree has no leaves".to_string());
        }

        let num_internal = num_leaves - 1;
        let lengths = [
            ("split_feature", arrays.split_feature.len()),
            ("threshold", arrays.threshold.len()),
            ("decision_type", arrays.decision_type.len()),
            ("left_child", arrays.left_child.len()),
            ("right_child", arrays.right_child.len()),
        ];
        for (name, len) in lengths {
            if len != num_internal {
                return Err(format!(
                    "{} has {} entries, expected {}",
                    name, len, num_internal
                ));
            }
        }

        for node in 0..num_internal {
            if arrays.split_feature[node] >= num_features {
                return Err(format!(
                    "node {} splits on feature {} but the model has {} features",
                    node, arrays.split_feature[node], num_features
                ));
            }

            for child in [arrays.left_child[node], arrays.right_child[node]] {
                if child >= 0 {
                    let child = child as usize;
                    if child <= node || child >= num_internal {
                        return Err(format!("node {} has invalid child {}", node, child));
                    }
                } else if (!child) as usize >= num_leaves {
                    return Err(format!("node {} references missing leaf {}", node, !child));
                }
            }

            if arrays.decision_type[node] & CATEGORICAL_MASK != 0 {
                let cat_idx = arrays.threshold[node];
                if cat_idx < 0.0
                    || cat_idx.fract() != 0.0
                    || cat_idx as usize >= arrays.cat_boundaries.len().saturating_sub(1)
                {
                    return Err(format!(
                        "node {} references missing category set {}",
                        node, cat_idx
                    ));
                }
            }
        }

        for pair in arrays.cat_boundaries.windows(2) {
            if pair[0] > pair[1] || pair[1] > arrays.cat_threshold.len() {
                return Err("cat_boundaries out of range".to_string());
            }
        }

        Ok(Self {
            split_feature: arrays.split_feature,
            threshold: arrays.threshold,
            decision_type: arrays.decision_type,
            left_child: arrays.left_child,
            right_child: arrays.right_child,
            leaf_value: arrays.leaf_value,
            cat_boundaries: arrays.cat_boundaries,
            cat_threshold: arrays.cat_threshold,
        })
    }

    /// Tree made of a single leaf
    pub fn constant(value: f64) -> Self {
        Self {
            split_feature: Vec::new(),
            threshold: Vec::new(),
            decision_type: Vec::new(),
            left_child: Vec::new(),
            right_child: Vec::new(),
            leaf_value: vec![value],
            cat_boundaries: Vec::new(),
            cat_threshold: Vec::new(),
        }
    }

    pub fn num_leaves(&self) -> usize {
        self.leaf_value.len()
    }

    /// Output of this tree for a row of model features
    ///
    /// `features` is indexed by model feature index and must cover every
    /// index used by `split_feature`.
    pub fn predict(&self, features: &[f64]) -> f64 {
        if self.split_feature.is_empty() {
            return self.leaf_value[0];
        }

        let mut node: i32 = 0;
        while node >= 0 {
            let index = node as usize;
            let value = features[self.split_feature[index]];
            node = if self.decision_type[index] & CATEGORICAL_MASK != 0 {
                self.categorical_decision(index, value)
            } else {
                self.numerical_decision(index, value)
            };
        }
        self.leaf_value[(!node) as usize]
    }

    fn numerical_decision(&self, node: usize, value: f64) -> i32 {
        let decision_type = self.decision_type[node];
        let missing = MissingType::from_decision_type(decision_type);

        let mut value = value;
        if value.is_nan() && missing != MissingType::NaN {
            value = 0.0;
        }

        let is_missing = match missing {
            MissingType::Zero => value.abs() <= ZERO_THRESHOLD,
            MissingType::NaN => value.is_nan(),
            MissingType::None => false,
        };
        if is_missing {
            return if decision_type & DEFAULT_LEFT_MASK != 0 {
                self.left_child[node]
            } else {
                self.right_child[node]
            };
        }

        if value <= self.threshold[node] {
            self.left_child[node]
        } else {
            self.right_child[node]
        }
    }

    fn categorical_decision(&self, node: usize, value: f64) -> i32 {
        if value.is_nan() || value < 0.0 {
            return self.right_child[node];
        }

        let category = value as usize;
        let cat_idx = self.threshold[node] as usize;
        let start = self.cat_boundaries[cat_idx];
        let end = self.cat_boundaries[cat_idx + 1];
        let bits = &self.cat_threshold[start..end];

        let word = category / 32;
        let in_set = word < bits.len() && (bits[word] >> (category % 32)) & 1 == 1;
        if in_set {
            self.left_child[node]
        } else {
            self.right_child[node]
        }
    }
}
