//! # voltcast
//!
//! HTTP prediction services for household electric power readings, backed
//! by a LightGBM regression model.
//!
//! Two services share one pipeline:
//!
//! - **evaluate**: scores a fixed labelled file and reports MSE, RMSE and
//!   MAE against the label column, optionally archiving each run to an
//!   Elasticsearch-compatible index
//! - **upload**: scores an uploaded file and returns the raw predictions
//!
//! ## Example
//!
//! ```rust
//! use voltcast::model::{LightGbmModel, Regressor};
//! use voltcast::schema::Schema;
//! use voltcast::table::{Table, COMMA};
//! use voltcast::testing::fixtures::voltage_model_text;
//!
//! let model = LightGbmModel::parse(&voltage_model_text(&Schema::EVALUATE)).unwrap();
//! let csv = "Global_reactive_power,Voltage,Sub_metering_1,Sub_metering_2,Sub_metering_3,Global_active_power\n\
//!            0.418,234.84,0,1,17,4.216\n";
//! let table = Table::from_reader(csv.as_bytes(), COMMA).unwrap();
//! let evaluation = voltcast::pipeline::evaluate_table(&table, &model).unwrap();
//!
//! assert_eq!(evaluation.predictions, vec![1.0]);
//! assert_eq!(model.name(), "LightGBM");
//! ```
//!
//! ## Pipeline
//!
//! `table` (ingest) → `schema` (validate) → `features` (matrix) →
//! `impute` (evaluate only) → `model` (infer) → `evaluation` (metrics,
//! evaluate only) → `archive` (evaluate only, best-effort)

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
// Clippy allows (MUST come after deny/warn to override them)
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)] // usize -> f64 for averages is acceptable
#![allow(clippy::cast_possible_truncation)] // u128 -> u64 for metrics is safe
#![allow(clippy::cast_sign_loss)] // Tree child indices are checked at load
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::must_use_candidate)] // Not all methods need #[must_use]
#![allow(clippy::doc_markdown)] // Allow technical terms without backticks
#![allow(clippy::float_cmp)] // Allow float comparisons in tests
#![allow(clippy::missing_panics_doc)]

pub mod api;
/// Best-effort archiving of evaluation runs to a document store
pub mod archive;
pub mod config;
pub mod error;
/// Regression accuracy metrics (MSE, RMSE, MAE)
pub mod evaluation;
pub mod features;
pub mod impute;
/// Tracing subscriber setup
pub mod logging;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod schema;
pub mod table;
/// Shared fixtures for tests and benches
pub mod testing;
/// Upload validation and scoped storage
pub mod upload;

// Re-exports for convenience
pub use error::{Result, VoltcastError};
pub use features::FeatureMatrix;
pub use model::{LightGbmModel, Regressor, SharedModel};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.starts_with("0."));
        assert!(VERSION.contains('.'));
    }
}
