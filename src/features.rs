//! Feature matrix extraction
//!
//! Row-major `f64` storage with missing cells held as `NaN`.

use crate::error::{Result, VoltcastError};
use crate::schema::Schema;
use crate::table::Table;

/// Dense row-major matrix of model inputs
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    num_rows: usize,
    data: Vec<f64>,
}

impl FeatureMatrix {
    /// Build from row-major values
    ///
    /// # Errors
    ///
    /// Returns [`VoltcastError::DataShapeMismatch`] if `data.len()` is not
    /// `num_rows * names.len()`.
    pub fn from_rows(names: Vec<String>, num_rows: usize, data: Vec<f64>) -> Result<Self> {
        let expected = num_rows * names.len();
        if data.len() != expected {
            return Err(VoltcastError::DataShapeMismatch {
                expected: format!("{num_rows}x{} = {expected} values", names.len()),
                actual: format!("{} values", data.len()),
            });
        }
        Ok(Self {
            names,
            num_rows,
            data,
        })
    }

    /// Pull the schema's feature columns out of a table, in schema order
    ///
    /// # Errors
    ///
    /// Propagates missing-column and malformed-cell errors from
    /// [`Table::numeric_column`].
    pub fn from_table(table: &Table, schema: &Schema) -> Result<Self> {
        let columns = schema
            .features()
            .iter()
            .map(|name| table.numeric_column(name))
            .collect::<Result<Vec<_>>>()?;

        let num_rows = table.num_rows();
        let num_cols = columns.len();
        let mut data = Vec::with_capacity(num_rows * num_cols);
        for row in 0..num_rows {
            data.extend(columns.iter().map(|col| col[row].unwrap_or(f64::NAN)));
        }

        Ok(Self {
            names: schema.features().iter().map(|s| (*s).to_string()).collect(),
            num_rows,
            data,
        })
    }

    /// Column names, in input order
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of rows
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of columns
    #[must_use]
    pub fn num_cols(&self) -> usize {
        self.names.len()
    }

    /// One row as a slice
    #[must_use]
    pub fn row(&self, index: usize) -> &[f64] {
        let n = self.num_cols();
        &self.data[index * n..(index + 1) * n]
    }

    /// Iterate over rows
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact panics on a zero chunk size
        self.data.chunks_exact(self.num_cols().max(1))
    }

    /// Copy one column out
    #[must_use]
    pub fn column(&self, col: usize) -> Vec<f64> {
        self.rows().map(|row| row[col]).collect()
    }

    /// Mutable access to one cell
    pub fn get_mut(&mut self, row: usize, col: usize) -> &mut f64 {
        let n = self.num_cols();
        &mut self.data[row * n + col]
    }

    /// Whether any cell is missing
    #[must_use]
    pub fn has_missing(&self) -> bool {
        self.data.iter().any(|v| v.is_nan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::COMMA;

    const CSV: &str = "Sub_metering_3,Voltage,Global_reactive_power,Sub_metering_1,Sub_metering_2,Global_active_power\n\
                       17,234.8,0.418,0,1,4.216\n\
                       16,,0.436,0,1,5.360\n";

    #[test]
    fn test_from_table_uses_schema_order() {
        let table = Table::from_reader(CSV.as_bytes(), COMMA).expect("parse");
        let matrix = FeatureMatrix::from_table(&table, &Schema::EVALUATE).expect("matrix");
        assert_eq!(matrix.num_rows(), 2);
        assert_eq!(matrix.num_cols(), 5);
        assert_eq!(matrix.names()[0], "Global_reactive_power");
        assert_eq!(matrix.row(0), &[0.418, 234.8, 0.0, 1.0, 17.0]);
    }

    #[test]
    fn test_missing_cell_is_nan() {
        let table = Table::from_reader(CSV.as_bytes(), COMMA).expect("parse");
        let matrix = FeatureMatrix::from_table(&table, &Schema::EVALUATE).expect("matrix");
        assert!(matrix.row(1)[1].is_nan());
        assert!(matrix.has_missing());
    }

    #[test]
    fn test_label_not_in_matrix() {
        let table = Table::from_reader(CSV.as_bytes(), COMMA).expect("parse");
        let matrix = FeatureMatrix::from_table(&table, &Schema::EVALUATE).expect("matrix");
        assert!(!matrix.names().iter().any(|n| n == "Global_active_power"));
    }

    #[test]
    fn test_from_rows_shape_check() {
        let err = FeatureMatrix::from_rows(vec!["a".into(), "b".into()], 2, vec![1.0, 2.0, 3.0])
            .expect_err("bad shape");
        assert!(matches!(err, VoltcastError::DataShapeMismatch { .. }));
    }

    #[test]
    fn test_column_and_rows() {
        let m = FeatureMatrix::from_rows(
            vec!["a".into(), "b".into()],
            3,
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        )
        .expect("matrix");
        assert_eq!(m.column(1), vec![2.0, 4.0, 6.0]);
        assert_eq!(m.rows().count(), 3);
    }
}
