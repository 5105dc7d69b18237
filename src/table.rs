//! Delimited text ingestion
//!
//! Reads CSV-like files into a column-named table of raw text cells.
//! Numbers are parsed per column on demand, so non-numeric columns such as
//! `Date` or `Time` in metering exports never fail ingestion.

use std::io::Read;
use std::path::Path;

use crate::error::{Result, VoltcastError};

/// Cell spellings treated as a missing value
pub const MISSING_MARKERS: &[&str] = &[
    "", "NaN", "nan", "NA", "N/A", "n/a", "null", "NULL", "None", "?",
];

/// Delimiter used by the fixed-path evaluation service
pub const COMMA: u8 = b',';

/// Delimiter used by the upload service
pub const SEMICOLON: u8 = b';';

/// Parsed delimited file: named columns over text cells
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Read a delimited file from disk
    ///
    /// # Errors
    ///
    /// Returns [`VoltcastError::FileRead`] if the file cannot be opened or
    /// tokenized.
    pub fn read(path: impl AsRef<Path>, delimiter: u8) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| VoltcastError::FileRead(format!("{}: {e}", path.display())))?;
        Self::from_reader(file, delimiter)
    }

    /// Read a delimited stream
    ///
    /// The first record is the header. Every data row must have as many
    /// fields as the header.
    ///
    /// # Errors
    ///
    /// Returns [`VoltcastError::FileRead`] on ragged rows, invalid UTF-8 or
    /// I/O failure.
    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| VoltcastError::FileRead(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();

        if headers.iter().all(String::is_empty) {
            return Err(VoltcastError::FileRead("missing header row".to_string()));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| VoltcastError::FileRead(e.to_string()))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    /// Column names in file order
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of data rows (header excluded)
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no data rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, if present
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Whether a column with this exact name exists
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Parse a column as numbers, mapping missing markers to `None`
    ///
    /// # Errors
    ///
    /// Returns [`VoltcastError::MissingColumns`] if the column is absent and
    /// [`VoltcastError::MalformedValue`] for a cell that is neither a number
    /// nor a missing marker.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| VoltcastError::MissingColumns {
                columns: vec![name.to_string()],
            })?;

        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let cell = row[idx].as_str();
                parse_cell(cell).ok_or_else(|| VoltcastError::MalformedValue {
                    column: name.to_string(),
                    // +1 for the header, +1 for 1-based lines
                    line: i + 2,
                    value: cell.to_string(),
                })
            })
            .collect()
    }
}

/// `Some(None)` for a missing marker, `Some(Some(v))` for a number,
/// `None` when the cell is neither
fn parse_cell(cell: &str) -> Option<Option<f64>> {
    if MISSING_MARKERS.contains(&cell) {
        return Some(None);
    }
    match cell.parse::<f64>() {
        Ok(v) if v.is_nan() => Some(None),
        Ok(v) => Some(Some(v)),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_comma_table() {
        let csv = "a,b\n1,2\n3,4\n";
        let table = Table::from_reader(csv.as_bytes(), COMMA).expect("parse");
        assert_eq!(table.headers(), &["a".to_string(), "b".to_string()]);
        assert_eq!(table.num_rows(), 2);
        assert_eq!(
            table.numeric_column("b").expect("column"),
            vec![Some(2.0), Some(4.0)]
        );
    }

    #[test]
    fn test_read_semicolon_table_with_text_columns() {
        let csv = "Date;Time;voltage\n16/12/2006;17:24:00;234.84\n16/12/2006;17:25:00;233.63\n";
        let table = Table::from_reader(csv.as_bytes(), SEMICOLON).expect("parse");
        assert_eq!(table.num_rows(), 2);
        assert!(table.has_column("Date"));
        assert_eq!(
            table.numeric_column("voltage").expect("column"),
            vec![Some(234.84), Some(233.63)]
        );
    }

    #[test]
    fn test_wrong_delimiter_collapses_headers() {
        let csv = "a;b\n1;2\n";
        let table = Table::from_reader(csv.as_bytes(), COMMA).expect("parse");
        assert_eq!(table.headers(), &["a;b".to_string()]);
        assert!(!table.has_column("a"));
    }

    #[test]
    fn test_missing_markers_become_none() {
        let csv = "x\n1\n\n?\nNaN\nNA\n5\n";
        // blank lines are skipped by the csv reader, so only five records
        let table = Table::from_reader(csv.as_bytes(), COMMA).expect("parse");
        let col = table.numeric_column("x").expect("column");
        assert_eq!(col, vec![Some(1.0), None, None, None, Some(5.0)]);
    }

    #[test]
    fn test_empty_cell_is_missing() {
        let csv = "x,y\n1,\n,2\n";
        let table = Table::from_reader(csv.as_bytes(), COMMA).expect("parse");
        assert_eq!(
            table.numeric_column("x").expect("x"),
            vec![Some(1.0), None]
        );
        assert_eq!(
            table.numeric_column("y").expect("y"),
            vec![None, Some(2.0)]
        );
    }

    #[test]
    fn test_non_numeric_cell_is_malformed() {
        let csv = "x\n1\nabc\n";
        let table = Table::from_reader(csv.as_bytes(), COMMA).expect("parse");
        let err = table.numeric_column("x").expect_err("should fail");
        match err {
            VoltcastError::MalformedValue { column, line, value } => {
                assert_eq!(column, "x");
                assert_eq!(line, 3);
                assert_eq!(value, "abc");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ragged_row_is_file_read_error() {
        let csv = "a,b\n1,2\n3\n";
        let err = Table::from_reader(csv.as_bytes(), COMMA).expect_err("ragged");
        assert!(err.to_string().starts_with("file read error: "));
    }

    #[test]
    fn test_headers_are_trimmed() {
        let csv = " a , b \n1,2\n";
        let table = Table::from_reader(csv.as_bytes(), COMMA).expect("parse");
        assert!(table.has_column("a"));
        assert!(table.has_column("b"));
    }

    #[test]
    fn test_header_only_is_empty() {
        let table = Table::from_reader("a,b\n".as_bytes(), COMMA).expect("parse");
        assert!(table.is_empty());
        assert_eq!(table.numeric_column("a").expect("a"), Vec::<Option<f64>>::new());
    }

    #[test]
    fn test_empty_input_has_no_header() {
        let err = Table::from_reader("".as_bytes(), COMMA).expect_err("no header");
        assert!(err.to_string().contains("missing header row"));
    }

    #[test]
    fn test_read_missing_path() {
        let err = Table::read("/definitely/not/here.csv", COMMA).expect_err("missing");
        assert!(matches!(err, VoltcastError::FileRead(_)));
    }

    #[test]
    fn test_invalid_utf8_is_file_read_error() {
        let bytes: &[u8] = b"a\n\xff\xfe\n";
        let err = Table::from_reader(bytes, COMMA).expect_err("invalid utf8");
        assert!(matches!(err, VoltcastError::FileRead(_)));
    }
}
