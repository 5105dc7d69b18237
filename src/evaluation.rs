//! Regression accuracy metrics

use serde::{Deserialize, Serialize};

use crate::error::{Result, VoltcastError};

/// MSE, RMSE and MAE of one prediction run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Mean squared error
    #[serde(rename = "MSE")]
    pub mse: f64,
    /// Root mean squared error
    #[serde(rename = "RMSE")]
    pub rmse: f64,
    /// Mean absolute error
    #[serde(rename = "MAE")]
    pub mae: f64,
}

impl RegressionMetrics {
    /// Compare predictions against known labels
    ///
    /// # Errors
    ///
    /// Returns [`VoltcastError::EmptyInput`] for empty sequences and
    /// [`VoltcastError::DataShapeMismatch`] when the lengths differ.
    pub fn compute(predictions: &[f64], real_values: &[f64]) -> Result<Self> {
        if predictions.len() != real_values.len() {
            return Err(VoltcastError::DataShapeMismatch {
                expected: format!("{} real values", predictions.len()),
                actual: real_values.len().to_string(),
            });
        }
        if predictions.is_empty() {
            return Err(VoltcastError::EmptyInput);
        }

        let n = predictions.len() as f64;
        let (sq, abs) = predictions
            .iter()
            .zip(real_values)
            .fold((0.0, 0.0), |(sq, abs), (p, r)| {
                let d = r - p;
                (sq + d * d, abs + d.abs())
            });
        let mse = sq / n;

        Ok(Self {
            mse,
            rmse: mse.sqrt(),
            mae: abs / n,
        })
    }
}
