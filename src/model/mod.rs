//! Model artifacts and inference
//!
//! A model is an opaque, externally trained object with one capability:
//! map a feature matrix to one prediction per row. It is loaded once and
//! shared read-only across requests behind an `Arc`.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{Result, VoltcastError};
use crate::features::FeatureMatrix;

pub mod lightgbm;
pub mod tree;

pub use lightgbm::LightGbmModel;

/// Anything that turns feature rows into numeric predictions
pub trait Regressor: Send + Sync {
    /// Display name, used as the metrics key in responses
    fn name(&self) -> &str;

    /// Number of input columns the model reads
    fn num_features(&self) -> usize;

    /// Column names stored with the model, empty when unknown
    fn feature_names(&self) -> &[String] {
        &[]
    }

    /// Predict every row of `features` in one call
    ///
    /// # Errors
    ///
    /// Returns [`VoltcastError::InferenceError`] when the input cannot be
    /// scored.
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>>;
}

/// Shared read-only model handle
pub type SharedModel = Arc<dyn Regressor>;

/// Load a LightGBM text model from disk
///
/// # Errors
///
/// Returns [`VoltcastError::ModelNotFound`] when the file does not exist,
/// [`VoltcastError::IoError`] when it cannot be read and
/// [`VoltcastError::FormatError`] when it does not parse.
pub fn load_model(path: impl AsRef<Path>) -> Result<LightGbmModel> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(VoltcastError::ModelNotFound {
            path: path.display().to_string(),
        });
    }

    let text = std::fs::read_to_string(path).map_err(|e| VoltcastError::IoError {
        message: format!("failed to read model {}: {e}", path.display()),
    })?;
    let model = LightGbmModel::parse(&text)?;

    info!(
        path = %path.display(),
        trees = model.num_trees(),
        features = model.num_features(),
        objective = model.objective(),
        "model loaded"
    );
    Ok(model)
}

/// Compare the model's stored feature names with the order the service
/// feeds columns in
///
/// Returns the stored names when they differ. Columns are never reordered
/// to match: the caller only logs the mismatch.
#[must_use]
pub fn feature_order_mismatch<'m>(
    model: &'m dyn Regressor,
    expected: &[&str],
) -> Option<&'m [String]> {
    let stored = model.feature_names();
    if stored.is_empty() || stored.iter().map(String::as_str).eq(expected.iter().copied()) {
        None
    } else {
        Some(stored)
    }
}

/// Log a warning when the stored feature names disagree with `expected`
pub fn warn_on_feature_order(model: &dyn Regressor, expected: &[&str]) {
    if let Some(stored) = feature_order_mismatch(model, expected) {
        warn!(
            model_features = ?stored,
            input_columns = ?expected,
            "model feature names differ from input column order; columns are passed positionally"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use crate::testing::fixtures::{ModelTextBuilder, TreeSpec};

    #[test]
    fn test_load_missing_model() {
        let err = load_model("/no/such/lgbm_model.txt").expect_err("missing");
        assert!(matches!(err, VoltcastError::ModelNotFound { .. }));
    }

    #[test]
    fn test_load_corrupt_model() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("lgbm_model.txt");
        std::fs::write(&path, "garbage").expect("write");
        let err = load_model(&path).expect_err("corrupt");
        assert!(matches!(err, VoltcastError::FormatError { .. }));
    }

    #[test]
    fn test_load_valid_model() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("lgbm_model.txt");
        let text = ModelTextBuilder::new(5).tree(TreeSpec::constant(1.5)).build();
        std::fs::write(&path, text).expect("write");
        let model = load_model(&path).expect("load");
        assert_eq!(model.num_features(), 5);
    }

    #[test]
    fn test_feature_order_match() {
        let text = ModelTextBuilder::new(5)
            .feature_names(Schema::EVALUATE.features())
            .tree(TreeSpec::constant(1.0))
            .build();
        let model = LightGbmModel::parse(&text).expect("parse");
        assert!(feature_order_mismatch(&model, Schema::EVALUATE.features()).is_none());
    }

    #[test]
    fn test_feature_order_mismatch_is_reported_not_fixed() {
        // Model trained with Voltage first; the service feeds reactive power first.
        let trained_order = [
            "Voltage",
            "Global_reactive_power",
            "Sub_metering_1",
            "Sub_metering_2",
            "Sub_metering_3",
        ];
        let text = ModelTextBuilder::new(5)
            .feature_names(&trained_order)
            .tree(TreeSpec::split(0, 100.0, 1.0, 2.0))
            .build();
        let model = LightGbmModel::parse(&text).expect("parse");
        assert!(feature_order_mismatch(&model, Schema::EVALUATE.features()).is_some());

        // A row with reactive power 0.4 and voltage 240 is scored on column 0
        // as-is, i.e. the reactive power value reaches the voltage split.
        let matrix = FeatureMatrix::from_rows(
            Schema::EVALUATE.features().iter().map(|s| (*s).to_string()).collect(),
            1,
            vec![0.4, 240.0, 0.0, 1.0, 17.0],
        )
        .expect("matrix");
        let predictions = model.predict(&matrix).expect("predict");
        assert_eq!(predictions, vec![1.0]);
    }

    #[test]
    fn test_unnamed_model_never_mismatches() {
        let text = ModelTextBuilder::new(5).tree(TreeSpec::constant(1.0)).build();
        let model = LightGbmModel::parse(&text).expect("parse");
        assert!(feature_order_mismatch(&model, &["anything"]).is_none());
    }
}
