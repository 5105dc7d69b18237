//! LightGBM text model format
//!
//! Parses the output of `Booster.save_model()`:
//!
//! ```text
//! tree
//! version=v3
//! num_class=1
//! max_feature_idx=4
//! objective=regression
//! feature_names=Global_reactive_power Voltage ...
//!
//! Tree=0
//! num_leaves=3
//! split_feature=1 0
//! threshold=240.5 0.1
//! decision_type=2 2
//! left_child=1 -1
//! right_child=-2 -3
//! leaf_value=0.1 0.2 0.3
//! ...
//!
//! end of trees
//! ```
//!
//! Only single-output regression models with numerical splits are accepted.

use std::collections::HashMap;
use std::str::FromStr;

use super::tree::Tree;
use super::Regressor;
use crate::error::{Result, VoltcastError};
use crate::features::FeatureMatrix;

/// Display name reported for LightGBM models
pub const MODEL_NAME: &str = "LightGBM";

/// How raw tree sums become predictions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTransform {
    /// Raw score is the prediction
    Identity,
    /// `exp(raw)`, for log-link objectives
    Exp,
}

impl OutputTransform {
    fn for_objective(objective: &str) -> Result<Self> {
        match objective {
            "regression" | "regression_l2" | "l2" | "mean_squared_error" | "mse"
            | "regression_l1" | "l1" | "mean_absolute_error" | "mae" | "huber" | "fair"
            | "quantile" | "mape" => Ok(Self::Identity),
            "poisson" | "gamma" | "tweedie" => Ok(Self::Exp),
            other => Err(VoltcastError::FormatError {
                reason: format!("unsupported objective '{other}', expected a regression objective"),
            }),
        }
    }

    fn apply(self, raw: f64) -> f64 {
        match self {
            Self::Identity => raw,
            Self::Exp => raw.exp(),
        }
    }
}

/// Gradient-boosted tree ensemble loaded from LightGBM text format
#[derive(Debug, Clone)]
pub struct LightGbmModel {
    trees: Vec<Tree>,
    num_features: usize,
    feature_names: Vec<String>,
    objective: String,
    transform: OutputTransform,
    average_output: bool,
    version: Option<String>,
}

impl LightGbmModel {
    /// Parse a model from its text representation
    ///
    /// # Errors
    ///
    /// Returns [`VoltcastError::FormatError`] for anything that is not a
    /// single-output regression model with numerical splits.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().map(str::trim);

        match lines.next() {
            Some("tree") => {},
            _ => return Err(format_error("missing 'tree' header line")),
        }

        let mut header: HashMap<&str, &str> = HashMap::new();
        let mut average_output = false;
        let mut tree_blocks: Vec<HashMap<&str, &str>> = Vec::new();
        let mut current: Option<HashMap<&str, &str>> = None;
        let mut saw_end = false;

        for line in lines {
            if line == "end of trees" {
                saw_end = true;
                break;
            }
            if line.is_empty() {
                if let Some(block) = current.take() {
                    tree_blocks.push(block);
                }
                continue;
            }
            if let Some(index) = line.strip_prefix("Tree=") {
                if let Some(block) = current.take() {
                    tree_blocks.push(block);
                }
                let mut block = HashMap::new();
                block.insert("Tree", index);
                current = Some(block);
                continue;
            }
            match (current.as_mut(), line.split_once('=')) {
                (Some(block), Some((key, value))) => {
                    block.insert(key, value);
                },
                (None, Some((key, value))) => {
                    header.insert(key, value);
                },
                (None, None) if line == "average_output" => average_output = true,
                _ => {},
            }
        }
        if let Some(block) = current.take() {
            tree_blocks.push(block);
        }
        if !saw_end {
            return Err(format_error("missing 'end of trees' marker"));
        }

        let num_class: usize = header_value(&header, "num_class")?.unwrap_or(1);
        let per_iteration: usize = header_value(&header, "num_tree_per_iteration")?.unwrap_or(1);
        if num_class != 1 || per_iteration != 1 {
            return Err(format_error(&format!(
                "multi-output models are not supported (num_class={num_class}, num_tree_per_iteration={per_iteration})"
            )));
        }

        let max_feature_idx: usize = header_value(&header, "max_feature_idx")?
            .ok_or_else(|| format_error("missing max_feature_idx"))?;
        let num_features = max_feature_idx + 1;

        let feature_names: Vec<String> = header
            .get("feature_names")
            .map(|names| names.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        if !feature_names.is_empty() && feature_names.len() != num_features {
            return Err(format_error(&format!(
                "feature_names lists {} names but max_feature_idx implies {num_features}",
                feature_names.len()
            )));
        }

        // objective lines may carry parameters, e.g. "quantile alpha:0.9"
        let objective = header
            .get("objective")
            .and_then(|o| o.split_whitespace().next())
            .unwrap_or("regression")
            .to_string();
        let transform = OutputTransform::for_objective(&objective)?;

        if tree_blocks.is_empty() {
            return Err(format_error("model contains no trees"));
        }
        let trees = tree_blocks
            .iter()
            .map(|block| parse_tree(block, num_features))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            trees,
            num_features,
            feature_names,
            objective,
            transform,
            average_output,
            version: header.get("version").map(|v| (*v).to_string()),
        })
    }

    /// Number of trees in the ensemble
    #[must_use]
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Objective the model was trained with
    #[must_use]
    pub fn objective(&self) -> &str {
        &self.objective
    }

    /// Format version string from the model header
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Whether tree outputs are averaged instead of summed
    #[must_use]
    pub fn average_output(&self) -> bool {
        self.average_output
    }

    /// Prediction for one row
    ///
    /// `row` must hold at least [`Regressor::num_features`] values.
    #[must_use]
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        let raw = if self.average_output {
            sum / self.trees.len() as f64
        } else {
            sum
        };
        self.transform.apply(raw)
    }
}

impl Regressor for LightGbmModel {
    fn name(&self) -> &str {
        MODEL_NAME
    }

    fn num_features(&self) -> usize {
        self.num_features
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        if features.num_cols() < self.num_features {
            return Err(VoltcastError::InferenceError {
                reason: format!(
                    "model expects {} features, input has {}",
                    self.num_features,
                    features.num_cols()
                ),
            });
        }
        Ok(features.rows().map(|row| self.predict_row(row)).collect())
    }
}

impl FromStr for LightGbmModel {
    type Err = VoltcastError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_tree(block: &HashMap<&str, &str>, num_features: usize) -> Result<Tree> {
    let index = block.get("Tree").copied().unwrap_or("?");

    if block.get("is_linear").is_some_and(|v| *v != "0") {
        return Err(format_error(&format!("tree {index}: linear trees are not supported")));
    }
    if block.get("num_cat").is_some_and(|v| *v != "0") {
        return Err(format_error(&format!(
            "tree {index}: categorical splits are not supported"
        )));
    }

    let num_leaves: usize = parse_scalar(block, "num_leaves", index)?;
    let leaf_value: Vec<f64> = parse_array(block, "leaf_value", index)?;
    if leaf_value.len() != num_leaves {
        return Err(format_error(&format!(
            "tree {index}: num_leaves={num_leaves} but leaf_value has {} entries",
            leaf_value.len()
        )));
    }
    if num_leaves == 1 {
        return Ok(Tree::constant(leaf_value[0]));
    }

    Tree::from_arrays(
        &parse_array::<usize>(block, "split_feature", index)?,
        &parse_array::<f64>(block, "threshold", index)?,
        &parse_array::<u8>(block, "decision_type", index)?,
        &parse_array::<i32>(block, "left_child", index)?,
        &parse_array::<i32>(block, "right_child", index)?,
        &leaf_value,
        num_features,
    )
    .map_err(|e| match e {
        VoltcastError::FormatError { reason } => format_error(&format!("tree {index}: {reason}")),
        other => other,
    })
}

fn header_value<T: FromStr>(header: &HashMap<&str, &str>, key: &str) -> Result<Option<T>> {
    header
        .get(key)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|_| format_error(&format!("invalid {key} value '{v}'")))
        })
        .transpose()
}

fn parse_scalar<T: FromStr>(block: &HashMap<&str, &str>, key: &str, tree: &str) -> Result<T> {
    let raw = block
        .get(key)
        .ok_or_else(|| format_error(&format!("tree {tree}: missing {key}")))?;
    raw.trim()
        .parse()
        .map_err(|_| format_error(&format!("tree {tree}: invalid {key} value '{raw}'")))
}

fn parse_array<T: FromStr>(block: &HashMap<&str, &str>, key: &str, tree: &str) -> Result<Vec<T>> {
    let raw = block
        .get(key)
        .ok_or_else(|| format_error(&format!("tree {tree}: missing {key}")))?;
    raw.split_whitespace()
        .map(|tok| {
            tok.parse()
                .map_err(|_| format_error(&format!("tree {tree}: invalid {key} entry '{tok}'")))
        })
        .collect()
}

fn format_error(reason: &str) -> VoltcastError {
    VoltcastError::FormatError {
        reason: reason.to_string(),
    }
}
