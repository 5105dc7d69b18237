//! Request/response bodies

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::evaluation::RegressionMetrics;
use crate::pipeline::{Evaluation, FeatureColumns};

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

/// Service banner for `GET /`
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Human-readable description
    pub message: String,
    /// Always `"ok"`
    pub status: String,
}

/// Evaluation service `GET /predict` body
#[derive(Debug, Serialize, Deserialize)]
pub struct EvaluateResponse {
    /// One prediction per row of the test file
    pub predictions_lightgbm: Vec<f64>,
    /// Label column of the test file
    pub real_values: Vec<f64>,
    /// Metrics keyed by model name
    pub metrics: BTreeMap<String, RegressionMetrics>,
    /// Inputs after imputation, plus the label
    pub features: FeatureColumns,
}

impl EvaluateResponse {
    /// Wrap an evaluation, keying its metrics under `model_name`
    #[must_use]
    pub fn new(model_name: &str, evaluation: Evaluation) -> Self {
        Self {
            predictions_lightgbm: evaluation.predictions,
            real_values: evaluation.real_values,
            metrics: BTreeMap::from([(model_name.to_string(), evaluation.metrics)]),
            features: evaluation.features,
        }
    }
}

/// Upload service `POST /predict` body
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    /// One prediction per uploaded row
    pub predictions: Vec<f64>,
    /// Summary line
    pub message: String,
}
