//! Required column sets and their validation
//!
//! The evaluation service reads the UCI household power export with its
//! original column names; the upload service takes a lower-case variant.
//! Column order here is the order features are handed to the model.

use crate::error::{Result, VoltcastError};
use crate::table::Table;

/// Output keys used for feature columns in JSON bodies, in feature order
pub const FEATURE_KEYS: [&str; 5] = [
    "global_reactive_power",
    "voltage",
    "sub_metering_1",
    "sub_metering_2",
    "sub_metering_3",
];

/// Output key for the label column
pub const LABEL_KEY: &str = "global_active_power";

/// Named set of required columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    features: &'static [&'static str],
    label: Option<&'static str>,
}

impl Schema {
    /// Columns required by the fixed-path evaluation service
    pub const EVALUATE: Self = Self {
        features: &[
            "Global_reactive_power",
            "Voltage",
            "Sub_metering_1",
            "Sub_metering_2",
            "Sub_metering_3",
        ],
        label: Some("Global_active_power"),
    };

    /// Columns required by the upload service
    pub const UPLOAD: Self = Self {
        features: &FEATURE_KEYS,
        label: None,
    };

    /// Feature column names, in model input order
    #[must_use]
    pub fn features(&self) -> &'static [&'static str] {
        self.features
    }

    /// Label column name, if this schema carries one
    #[must_use]
    pub fn label(&self) -> Option<&'static str> {
        self.label
    }

    /// Every required column: features first, then the label
    pub fn required(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.features.iter().copied().chain(self.label)
    }

    /// Check that every required column is present
    ///
    /// # Errors
    ///
    /// Returns [`VoltcastError::MissingColumns`] listing every absent
    /// column in schema order.
    pub fn validate(&self, table: &Table) -> Result<()> {
        let missing: Vec<String> = self
            .required()
            .filter(|name| !table.has_column(name))
            .map(str::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(VoltcastError::MissingColumns { columns: missing })
        }
    }
}
