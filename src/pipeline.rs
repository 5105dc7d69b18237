//! Request pipelines
//!
//! Both services run the same leaf-first chain: ingest, validate, build
//! the feature matrix, infer. The evaluation pipeline adds mean imputation
//! and accuracy metrics against the label column. Everything here is
//! blocking and is driven from `spawn_blocking` by the HTTP layer.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, VoltcastError};
use crate::evaluation::RegressionMetrics;
use crate::features::FeatureMatrix;
use crate::impute::{ImputationReport, MeanImputer};
use crate::model::Regressor;
use crate::schema::{Schema, FEATURE_KEYS};
use crate::table::{Table, COMMA, SEMICOLON};

/// Feature columns (after imputation) and the label, keyed for JSON output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureColumns {
    /// Global reactive power (kW)
    pub global_reactive_power: Vec<f64>,
    /// Voltage (V)
    pub voltage: Vec<f64>,
    /// Sub-metering 1 (Wh)
    pub sub_metering_1: Vec<f64>,
    /// Sub-metering 2 (Wh)
    pub sub_metering_2: Vec<f64>,
    /// Sub-metering 3 (Wh)
    pub sub_metering_3: Vec<f64>,
    /// Global active power (kW), the label
    pub global_active_power: Vec<f64>,
}

impl FeatureColumns {
    /// Split a five-column matrix back into named columns
    ///
    /// # Errors
    ///
    /// Returns [`VoltcastError::DataShapeMismatch`] unless the matrix has
    /// exactly the five metering columns.
    pub fn from_matrix(matrix: &FeatureMatrix, labels: Vec<f64>) -> Result<Self> {
        if matrix.num_cols() != FEATURE_KEYS.len() {
            return Err(VoltcastError::DataShapeMismatch {
                expected: format!("{} feature columns", FEATURE_KEYS.len()),
                actual: matrix.num_cols().to_string(),
            });
        }
        Ok(Self {
            global_reactive_power: matrix.column(0),
            voltage: matrix.column(1),
            sub_metering_1: matrix.column(2),
            sub_metering_2: matrix.column(3),
            sub_metering_3: matrix.column(4),
            global_active_power: labels,
        })
    }
}

/// Result of scoring a labelled file
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// One prediction per input row
    pub predictions: Vec<f64>,
    /// Label values, aligned with `predictions`
    pub real_values: Vec<f64>,
    /// Accuracy of `predictions` against `real_values`
    pub metrics: RegressionMetrics,
    /// Inputs as fed to the model
    pub features: FeatureColumns,
    /// What the imputer filled in
    pub imputation: ImputationReport,
}

/// Score the labelled, comma-delimited file at `path`
///
/// # Errors
///
/// - [`VoltcastError::DataFileNotFound`] if `path` does not exist
/// - read, schema, malformed-value, empty-input and missing-label errors
///   from ingestion
/// - inference and shape errors from the model
pub fn evaluate_file(path: &Path, model: &dyn Regressor) -> Result<Evaluation> {
    if !path.exists() {
        return Err(VoltcastError::DataFileNotFound {
            path: path.display().to_string(),
        });
    }
    let table = Table::read(path, COMMA)?;
    info!(path = %path.display(), rows = table.num_rows(), "test data loaded");
    evaluate_table(&table, model)
}

/// Score an in-memory labelled table
///
/// # Errors
///
/// Same as [`evaluate_file`], minus the file lookup.
pub fn evaluate_table(table: &Table, model: &dyn Regressor) -> Result<Evaluation> {
    let schema = Schema::EVALUATE;
    schema.validate(table)?;
    if table.is_empty() {
        return Err(VoltcastError::EmptyInput);
    }

    let mut matrix = FeatureMatrix::from_table(table, &schema)?;
    let real_values = labels(table, &schema)?;

    let imputation = MeanImputer::new().impute(&mut matrix);
    if !imputation.is_noop() {
        info!(cells = imputation.filled_cells(), "missing feature values imputed with column means");
        for column in imputation.unfilled_columns() {
            debug!(column, "column has no values; left as NaN");
        }
    }

    let predictions = predict_matrix(model, &matrix)?;
    let metrics = RegressionMetrics::compute(&predictions, &real_values)?;
    let features = FeatureColumns::from_matrix(&matrix, real_values.clone())?;

    Ok(Evaluation {
        predictions,
        real_values,
        metrics,
        features,
        imputation,
    })
}

/// Predict every row of the semicolon-delimited upload at `path`
///
/// # Errors
///
/// Read, schema, malformed-value and empty-input errors from ingestion;
/// inference errors from the model.
pub fn predict_file(path: &Path, model: &dyn Regressor) -> Result<Vec<f64>> {
    let table = Table::read(path, SEMICOLON)?;
    debug!(path = %path.display(), rows = table.num_rows(), "upload parsed");
    predict_table(&table, model)
}

/// Predict every row of an in-memory unlabelled table
///
/// # Errors
///
/// Same as [`predict_file`], minus the file read.
pub fn predict_table(table: &Table, model: &dyn Regressor) -> Result<Vec<f64>> {
    let schema = Schema::UPLOAD;
    schema.validate(table)?;
    if table.is_empty() {
        return Err(VoltcastError::EmptyInput);
    }
    let matrix = FeatureMatrix::from_table(table, &schema)?;
    predict_matrix(model, &matrix)
}

/// Label column, rejecting any missing cell
fn labels(table: &Table, schema: &Schema) -> Result<Vec<f64>> {
    let Some(label) = schema.label() else {
        return Ok(Vec::new());
    };
    let column = table.numeric_column(label)?;
    let missing = column.iter().filter(|v| v.is_none()).count();
    if missing > 0 {
        return Err(VoltcastError::MissingLabels {
            column: label.to_string(),
            count: missing,
        });
    }
    Ok(column.into_iter().flatten().collect())
}

/// One model call, checked to yield exactly one value per row
fn predict_matrix(model: &dyn Regressor, matrix: &FeatureMatrix) -> Result<Vec<f64>> {
    let predictions = model.predict(matrix)?;
    if predictions.len() != matrix.num_rows() {
        return Err(VoltcastError::DataShapeMismatch {
            expected: format!("{} predictions", matrix.num_rows()),
            actual: predictions.len().to_string(),
        });
    }
    Ok(predictions)
}
