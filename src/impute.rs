//! Column-mean imputation
//!
//! Only the feature matrix is ever imputed; labels are kept apart and never
//! pass through here.

use crate::features::FeatureMatrix;

/// Per-column outcome of one imputation pass
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnImputation {
    /// Column name
    pub column: String,
    /// Cells that were missing
    pub missing: usize,
    /// Replacement value; `None` when every cell was missing
    pub fill_value: Option<f64>,
}

/// Summary of an imputation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImputationReport {
    /// Columns that had at least one missing cell
    pub columns: Vec<ColumnImputation>,
}

impl ImputationReport {
    /// Total cells replaced with a mean
    #[must_use]
    pub fn filled_cells(&self) -> usize {
        self.columns
            .iter()
            .filter(|c| c.fill_value.is_some())
            .map(|c| c.missing)
            .sum()
    }

    /// Columns whose mean is undefined and were left as `NaN`
    pub fn unfilled_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| c.fill_value.is_none())
            .map(|c| c.column.as_str())
    }

    /// Whether nothing was missing
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Replaces missing cells with the mean of the present cells in the same column
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanImputer;

impl MeanImputer {
    /// Create an imputer
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Impute in place
    pub fn impute(&self, matrix: &mut FeatureMatrix) -> ImputationReport {
        if !matrix.has_missing() {
            return ImputationReport::default();
        }

        let mut report = ImputationReport::default();
        for col in 0..matrix.num_cols() {
            let values = matrix.column(col);
            let missing = values.iter().filter(|v| v.is_nan()).count();
            if missing == 0 {
                continue;
            }

            let fill_value = column_mean(&values);
            if let Some(mean) = fill_value {
                for (row, value) in values.iter().enumerate() {
                    if value.is_nan() {
                        *matrix.get_mut(row, col) = mean;
                    }
                }
            }

            report.columns.push(ColumnImputation {
                column: matrix.names()[col].clone(),
                missing,
                fill_value,
            });
        }
        report
    }
}

/// Arithmetic mean of the non-`NaN` values
fn column_mean(values: &[f64]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}
