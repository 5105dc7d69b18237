//! Test support shared by unit tests, integration tests and benches
//!
//! - [`fixtures`]: LightGBM text models and metering CSV files
//! - [`StubRegressor`]: deterministic model double with call counting

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Result, VoltcastError};
use crate::features::FeatureMatrix;
use crate::model::Regressor;

pub mod fixtures;

/// Model double: predicts `offset + scale * row[column]`
#[derive(Debug)]
pub struct StubRegressor {
    column: usize,
    scale: f64,
    offset: f64,
    fail_with: Option<String>,
    calls: AtomicUsize,
}

impl StubRegressor {
    /// Echo one input column
    #[must_use]
    pub fn echo(column: usize) -> Self {
        Self {
            column,
            scale: 1.0,
            offset: 0.0,
            fail_with: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Constant output for every row
    #[must_use]
    pub fn constant(value: f64) -> Self {
        Self {
            column: 0,
            scale: 0.0,
            offset: value,
            fail_with: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call fails with an inference error
    #[must_use]
    pub fn failing(reason: &str) -> Self {
        Self {
            fail_with: Some(reason.to_string()),
            ..Self::constant(0.0)
        }
    }

    /// Number of `predict` calls so far
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Regressor for StubRegressor {
    fn name(&self) -> &str {
        "stub"
    }

    fn num_features(&self) -> usize {
        self.column + 1
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(reason) = &self.fail_with {
            return Err(VoltcastError::InferenceError {
                reason: reason.clone(),
            });
        }
        Ok(features
            .rows()
            .map(|row| {
                let x = if self.scale == 0.0 { 0.0 } else { row[self.column] };
                self.offset + self.scale * x
            })
            .collect())
    }
}
