//! Error types for voltcast
//!
//! One error enum covers the whole request pipeline. Each variant knows the
//! HTTP status it maps to, so handlers only translate at the boundary.

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias for voltcast operations
pub type Result<T> = std::result::Result<T, VoltcastError>;

/// Errors raised while loading models, reading input and serving predictions
#[derive(Error, Debug)]
pub enum VoltcastError {
    /// Input file missing on disk (fixed-path variant)
    #[error("data file not found: {path}")]
    DataFileNotFound {
        /// Path that was looked up
        path: String,
    },

    /// Model artifact missing on disk
    #[error("model artifact not found: {path}")]
    ModelNotFound {
        /// Path that was looked up
        path: String,
    },

    /// Delimited file could not be read or tokenized
    #[error("file read error: {0}")]
    FileRead(String),

    /// A cell could not be interpreted as a number
    #[error("malformed input in column '{column}' at line {line}: cannot parse '{value}' as a number")]
    MalformedValue {
        /// Column name
        column: String,
        /// 1-based line number in the source file (header is line 1)
        line: usize,
        /// Offending raw cell
        value: String,
    },

    /// One or more required columns are absent
    #[error("missing columns: {}", columns.join(", "))]
    MissingColumns {
        /// Missing names, in schema order
        columns: Vec<String>,
    },

    /// The input has a header but no data rows
    #[error("input contains no rows")]
    EmptyInput,

    /// Label values absent where metrics need them
    #[error("label column {column} has {count} missing values")]
    MissingLabels {
        /// Label column name
        column: String,
        /// Number of missing cells
        count: usize,
    },

    /// Upload request without a usable file part
    #[error("{reason}")]
    InvalidUpload {
        /// What was wrong with the upload
        reason: String,
    },

    /// Upload extension not in the allow-list
    #[error("file extension not allowed: '{extension}' (allowed: {allowed})")]
    ExtensionNotAllowed {
        /// Extension found on the uploaded file name
        extension: String,
        /// Comma-separated allow-list
        allowed: String,
    },

    /// Model failed to load at startup; every prediction request reports it
    #[error("model unavailable: {reason}")]
    ModelUnavailable {
        /// Load failure description
        reason: String,
    },

    /// Model file is present but cannot be parsed
    #[error("model format error: {reason}")]
    FormatError {
        /// Parse failure description
        reason: String,
    },

    /// Prediction failed at runtime
    #[error("inference failed: {reason}")]
    InferenceError {
        /// Failure description
        reason: String,
    },

    /// Sequences that must align do not
    #[error("data shape mismatch: expected {expected}, got {actual}")]
    DataShapeMismatch {
        /// Expected length or shape
        expected: String,
        /// Actual length or shape
        actual: String,
    },

    /// Document store request failed
    #[error("archive error: {0}")]
    ArchiveError(String),

    /// Configuration value rejected at startup
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Filesystem or socket failure
    #[error("I/O error: {message}")]
    IoError {
        /// Failure description
        message: String,
    },
}

impl VoltcastError {
    /// HTTP status code this error is reported with
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DataFileNotFound { .. } => StatusCode::NOT_FOUND,
            Self::FileRead(_)
            | Self::MalformedValue { .. }
            | Self::MissingColumns { .. }
            | Self::EmptyInput
            | Self::MissingLabels { .. }
            | Self::InvalidUpload { .. }
            | Self::ExtensionNotAllowed { .. } => StatusCode::BAD_REQUEST,
            Self::ModelNotFound { .. }
            | Self::ModelUnavailable { .. }
            | Self::FormatError { .. }
            | Self::InferenceError { .. }
            | Self::DataShapeMismatch { .. }
            | Self::ArchiveError(_)
            | Self::InvalidConfiguration(_)
            | Self::IoError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for VoltcastError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError {
            message: e.to_string(),
        }
    }
}
