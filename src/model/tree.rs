//! Single regression tree in LightGBM's flat array layout
//!
//! Internal nodes are indexed `0..num_leaves-1`. A child reference `c >= 0`
//! points at an internal node; `c < 0` points at leaf `!c`.

use crate::error::{Result, VoltcastError};

/// Magnitude below which a value counts as zero for `MissingType::Zero`
const ZERO_THRESHOLD: f64 = 1e-35;

/// Bit in `decision_type` marking a categorical split
const CATEGORICAL_MASK: u8 = 1;

/// Bit in `decision_type` sending missing values left
const DEFAULT_LEFT_MASK: u8 = 2;

/// How a split treats missing values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingType {
    /// No special handling; `NaN` is compared as `0.0`
    None,
    /// Zero (and `NaN`) follow the default direction
    Zero,
    /// `NaN` follows the default direction
    NaN,
}

impl MissingType {
    fn from_decision_type(decision_type: u8) -> Self {
        match (decision_type >> 2) & 3 {
            1 => Self::Zero,
            2 => Self::NaN,
            _ => Self::None,
        }
    }
}

/// One numerical split
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    /// Feature column index
    pub feature: usize,
    /// Go left when `value <= threshold`
    pub threshold: f64,
    /// Direction for missing values
    pub default_left: bool,
    /// Missing-value rule
    pub missing: MissingType,
    /// Left child reference
    pub left: i32,
    /// Right child reference
    pub right: i32,
}

/// Regression tree
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    splits: Vec<Split>,
    leaf_values: Vec<f64>,
}

impl Tree {
    /// Single-leaf tree returning a constant
    #[must_use]
    pub fn constant(value: f64) -> Self {
        Self {
            splits: Vec::new(),
            leaf_values: vec![value],
        }
    }

    /// Build a tree from the parallel arrays of a LightGBM model file
    ///
    /// # Errors
    ///
    /// Returns [`VoltcastError::FormatError`] when array lengths disagree,
    /// a split is categorical, a feature index exceeds `num_features`, or a
    /// child reference is out of range or points backwards.
    #[allow(clippy::too_many_arguments)]
    pub fn from_arrays(
        split_feature: &[usize],
        threshold: &[f64],
        decision_type: &[u8],
        left_child: &[i32],
        right_child: &[i32],
        leaf_value: &[f64],
        num_features: usize,
    ) -> Result<Self> {
        let num_leaves = leaf_value.len();
        if num_leaves == 0 {
            return Err(format_error("tree has no leaves"));
        }
        let num_internal = num_leaves - 1;
        for (name, len) in [
            ("split_feature", split_feature.len()),
            ("threshold", threshold.len()),
            ("decision_type", decision_type.len()),
            ("left_child", left_child.len()),
            ("right_child", right_child.len()),
        ] {
            if len != num_internal {
                return Err(format_error(&format!(
                    "{name} has {len} entries, expected {num_internal} for {num_leaves} leaves"
                )));
            }
        }

        let mut splits = Vec::with_capacity(num_internal);
        for node in 0..num_internal {
            let dt = decision_type[node];
            if dt & CATEGORICAL_MASK != 0 {
                return Err(format_error("categorical splits are not supported"));
            }
            if split_feature[node] >= num_features {
                return Err(format_error(&format!(
                    "node {node} splits on feature {} but the model has {num_features} features",
                    split_feature[node]
                )));
            }
            for child in [left_child[node], right_child[node]] {
                check_child(node, child, num_internal, num_leaves)?;
            }
            splits.push(Split {
                feature: split_feature[node],
                threshold: threshold[node],
                default_left: dt & DEFAULT_LEFT_MASK != 0,
                missing: MissingType::from_decision_type(dt),
                left: left_child[node],
                right: right_child[node],
            });
        }

        Ok(Self {
            splits,
            leaf_values: leaf_value.to_vec(),
        })
    }

    /// Number of leaves
    #[must_use]
    pub fn num_leaves(&self) -> usize {
        self.leaf_values.len()
    }

    /// Raw leaf value reached by one row
    ///
    /// `row` must be at least as wide as the largest split feature; the
    /// owning model checks this once per matrix.
    #[must_use]
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        if self.splits.is_empty() {
            return self.leaf_values[0];
        }
        let mut node = 0i32;
        while node >= 0 {
            node = self.splits[node as usize].next(row);
        }
        self.leaf_values[(!node) as usize]
    }
}

impl Split {
    fn next(&self, row: &[f64]) -> i32 {
        let mut value = row[self.feature];
        if self.missing != MissingType::NaN && value.is_nan() {
            value = 0.0;
        }
        let is_missing = match self.missing {
            MissingType::Zero => value.abs() <= ZERO_THRESHOLD,
            MissingType::NaN => value.is_nan(),
            MissingType::None => false,
        };
        if is_missing {
            if self.default_left {
                self.left
            } else {
                self.right
            }
        } else if value <= self.threshold {
            self.left
        } else {
            self.right
        }
    }
}

/// Internal children must point forward so traversal always terminates
fn check_child(node: usize, child: i32, num_internal: usize, num_leaves: usize) -> Result<()> {
    let ok = if child >= 0 {
        let child = child as usize;
        child > node && child < num_internal
    } else {
        ((!child) as usize) < num_leaves
    };
    if ok {
        Ok(())
    } else {
        Err(format_error(&format!(
            "node {node} has invalid child reference {child}"
        )))
    }
}

fn format_error(reason: &str) -> VoltcastError {
    VoltcastError::FormatError {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// x0 <= 0.5 ? (x1 <= 10 ? 1.0 : 2.0) : 3.0
    fn two_level(decision_type: u8) -> Tree {
        Tree::from_arrays(
            &[0, 1],
            &[0.5, 10.0],
            &[decision_type, decision_type],
            &[1, -1],
            &[-3, -2],
            &[1.0, 2.0, 3.0],
            2,
        )
        .expect("valid tree")
    }

    #[test]
    fn test_numerical_routing() {
        let tree = two_level(0);
        assert_eq!(tree.predict_row(&[0.0, 5.0]), 1.0);
        assert_eq!(tree.predict_row(&[0.0, 20.0]), 2.0);
        assert_eq!(tree.predict_row(&[1.0, 5.0]), 3.0);
        // threshold is inclusive on the left
        assert_eq!(tree.predict_row(&[0.5, 10.0]), 1.0);
    }

    #[test]
    fn test_constant_tree() {
        let tree = Tree::constant(4.2);
        assert_eq!(tree.predict_row(&[]), 4.2);
        assert_eq!(tree.num_leaves(), 1);
    }

    #[test]
    fn test_nan_with_missing_none_compares_as_zero() {
        let tree = two_level(0);
        // NaN -> 0.0 <= 0.5 goes left
        assert_eq!(tree.predict_row(&[f64::NAN, 5.0]), 1.0);
    }

    #[test]
    fn test_nan_missing_default_right() {
        // missing type NaN (8), default right
        let tree = two_level(8);
        assert_eq!(tree.predict_row(&[f64::NAN, 5.0]), 3.0);
    }

    #[test]
    fn test_nan_missing_default_left() {
        // missing type NaN (8) | default left (2)
        let tree = two_level(10);
        assert_eq!(tree.predict_row(&[f64::NAN, 50.0]), 2.0);
    }

    #[test]
    fn test_zero_missing_type() {
        // missing type Zero (4), default right: zero counts as missing
        let tree = two_level(4);
        assert_eq!(tree.predict_row(&[0.0, 5.0]), 3.0);
        assert_eq!(tree.predict_row(&[-1.0, 5.0]), 1.0);
    }

    #[test]
    fn test_rejects_categorical() {
        let err = Tree::from_arrays(&[0], &[1.0], &[1], &[-1], &[-2], &[0.0, 1.0], 1)
            .expect_err("categorical");
        assert!(err.to_string().contains("categorical"));
    }

    #[test]
    fn test_rejects_backward_child() {
        let err = Tree::from_arrays(
            &[0, 0],
            &[1.0, 2.0],
            &[0, 0],
            &[1, 0],
            &[-1, -2],
            &[0.0, 1.0, 2.0],
            1,
        )
        .expect_err("cycle");
        assert!(err.to_string().contains("invalid child reference"));
    }

    #[test]
    fn test_rejects_feature_out_of_range() {
        let err = Tree::from_arrays(&[3], &[1.0], &[0], &[-1], &[-2], &[0.0, 1.0], 2)
            .expect_err("feature");
        assert!(err.to_string().contains("feature 3"));
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let err = Tree::from_arrays(&[0], &[1.0, 2.0], &[0], &[-1], &[-2], &[0.0, 1.0], 1)
            .expect_err("threshold length");
        assert!(err.to_string().contains("threshold"));
    }
}
