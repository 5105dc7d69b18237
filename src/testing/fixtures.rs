//! Model and data fixtures
//!
//! Builds small LightGBM text models and metering CSV files so tests never
//! depend on artifacts checked into the repository.

use std::fmt::Write as _;

use crate::schema::Schema;

/// Shape of one fixture tree
#[derive(Debug, Clone, PartialEq)]
pub enum TreeSpec {
    /// Single leaf
    Constant(f64),
    /// `x[feature] <= threshold ? left : right`
    Split {
        /// Feature index
        feature: usize,
        /// Split threshold
        threshold: f64,
        /// Leaf value when the comparison holds
        left: f64,
        /// Leaf value otherwise
        right: f64,
    },
}

impl TreeSpec {
    /// Single-leaf tree
    #[must_use]
    pub fn constant(value: f64) -> Self {
        Self::Constant(value)
    }

    /// One numerical split over two leaves
    #[must_use]
    pub fn split(feature: usize, threshold: f64, left: f64, right: f64) -> Self {
        Self::Split {
            feature,
            threshold,
            left,
            right,
        }
    }

    fn write(&self, out: &mut String, index: usize) {
        let _ = writeln!(out, "Tree={index}");
        match self {
            Self::Constant(value) => {
                let _ = writeln!(out, "num_leaves=1");
                let _ = writeln!(out, "num_cat=0");
                let _ = writeln!(out, "split_feature=");
                let _ = writeln!(out, "split_gain=");
                let _ = writeln!(out, "threshold=");
                let _ = writeln!(out, "decision_type=");
                let _ = writeln!(out, "left_child=");
                let _ = writeln!(out, "right_child=");
                let _ = writeln!(out, "leaf_value={value}");
                let _ = writeln!(out, "leaf_weight=1");
                let _ = writeln!(out, "leaf_count=1");
            },
            Self::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                let _ = writeln!(out, "num_leaves=2");
                let _ = writeln!(out, "num_cat=0");
                let _ = writeln!(out, "split_feature={feature}");
                let _ = writeln!(out, "split_gain=1");
                let _ = writeln!(out, "threshold={threshold}");
                // default-left, missing type None
                let _ = writeln!(out, "decision_type=2");
                let _ = writeln!(out, "left_child=-1");
                let _ = writeln!(out, "right_child=-2");
                let _ = writeln!(out, "leaf_value={left} {right}");
                let _ = writeln!(out, "leaf_weight=1 1");
                let _ = writeln!(out, "leaf_count=1 1");
                let _ = writeln!(out, "internal_value=0");
                let _ = writeln!(out, "internal_weight=2");
                let _ = writeln!(out, "internal_count=2");
            },
        }
        let _ = writeln!(out, "is_linear=0");
        let _ = writeln!(out, "shrinkage=1");
        out.push('\n');
    }
}

/// Writes LightGBM text models
#[derive(Debug, Clone)]
pub struct ModelTextBuilder {
    num_features: usize,
    objective: String,
    feature_names: Option<Vec<String>>,
    average_output: bool,
    trees: Vec<TreeSpec>,
}

impl ModelTextBuilder {
    /// Regression model over `num_features` inputs
    #[must_use]
    pub fn new(num_features: usize) -> Self {
        Self {
            num_features,
            objective: "regression".to_string(),
            feature_names: None,
            average_output: false,
            trees: Vec::new(),
        }
    }

    /// Override the objective line
    #[must_use]
    pub fn objective(mut self, objective: &str) -> Self {
        self.objective = objective.to_string();
        self
    }

    /// Store feature names in the header
    #[must_use]
    pub fn feature_names(mut self, names: &[&str]) -> Self {
        self.feature_names = Some(names.iter().map(|s| (*s).to_string()).collect());
        self
    }

    /// Mark the model as random-forest style (averaged)
    #[must_use]
    pub fn average_output(mut self) -> Self {
        self.average_output = true;
        self
    }

    /// Append a tree
    #[must_use]
    pub fn tree(mut self, tree: TreeSpec) -> Self {
        self.trees.push(tree);
        self
    }

    /// Render the model file
    #[must_use]
    pub fn build(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "tree");
        let _ = writeln!(out, "version=v4");
        let _ = writeln!(out, "num_class=1");
        let _ = writeln!(out, "num_tree_per_iteration=1");
        let _ = writeln!(out, "label_index=0");
        let _ = writeln!(out, "max_feature_idx={}", self.num_features.saturating_sub(1));
        let _ = writeln!(out, "objective={}", self.objective);
        if self.average_output {
            let _ = writeln!(out, "average_output");
        }
        if let Some(names) = &self.feature_names {
            let _ = writeln!(out, "feature_names={}", names.join(" "));
        }
        let infos = vec!["[0:1]"; self.num_features].join(" ");
        let _ = writeln!(out, "feature_infos={infos}");
        out.push('\n');

        for (i, tree) in self.trees.iter().enumerate() {
            tree.write(&mut out, i);
        }

        out.push_str("end of trees\n\n");
        out.push_str("feature_importances:\n\n");
        out.push_str("parameters:\n[boosting: gbdt]\nend of parameters\n\n");
        out.push_str("pandas_categorical:null\n");
        out
    }
}

/// Fixture model for the metering services: `1.0` at or below 240 V,
/// `2.0` above
#[must_use]
pub fn voltage_model_text(schema: &Schema) -> String {
    ModelTextBuilder::new(5)
        .feature_names(schema.features())
        .tree(TreeSpec::split(1, 240.0, 0.5, 1.5))
        .tree(TreeSpec::constant(0.5))
        .build()
}

/// One metering reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Global reactive power (kW)
    pub reactive_power: Option<f64>,
    /// Voltage (V)
    pub voltage: Option<f64>,
    /// Sub-metering 1 (Wh)
    pub sub_metering_1: Option<f64>,
    /// Sub-metering 2 (Wh)
    pub sub_metering_2: Option<f64>,
    /// Sub-metering 3 (Wh)
    pub sub_metering_3: Option<f64>,
    /// Global active power (kW), the label
    pub active_power: Option<f64>,
}

impl Reading {
    /// Reading with every field present
    #[must_use]
    pub fn new(voltage: f64, active_power: f64) -> Self {
        Self {
            reactive_power: Some(0.4),
            voltage: Some(voltage),
            sub_metering_1: Some(0.0),
            sub_metering_2: Some(1.0),
            sub_metering_3: Some(17.0),
            active_power: Some(active_power),
        }
    }

    /// Same reading with voltage missing
    #[must_use]
    pub fn without_voltage(mut self) -> Self {
        self.voltage = None;
        self
    }

    /// Same reading with the label missing
    #[must_use]
    pub fn without_label(mut self) -> Self {
        self.active_power = None;
        self
    }

    fn features(&self) -> [Option<f64>; 5] {
        [
            self.reactive_power,
            self.voltage,
            self.sub_metering_1,
            self.sub_metering_2,
            self.sub_metering_3,
        ]
    }
}

/// Render readings as a delimited file for `schema`
///
/// The label column is written only when the schema has one.
#[must_use]
pub fn readings_csv(schema: &Schema, readings: &[Reading], delimiter: char) -> String {
    let sep = delimiter.to_string();
    let mut out = schema.required().collect::<Vec<_>>().join(&sep);
    out.push('\n');
    for reading in readings {
        let mut cells: Vec<String> = reading.features().iter().map(|v| cell(*v)).collect();
        if schema.label().is_some() {
            cells.push(cell(reading.active_power));
        }
        out.push_str(&cells.join(&sep));
        out.push('\n');
    }
    out
}

fn cell(value: Option<f64>) -> String {
    value.map_or_else(String::new, |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LightGbmModel, Regressor};

    #[test]
    fn test_voltage_model_parses() {
        let model = LightGbmModel::parse(&voltage_model_text(&Schema::EVALUATE)).expect("parse");
        assert_eq!(model.num_trees(), 2);
        assert_eq!(model.num_features(), 5);
        assert_eq!(model.predict_row(&[0.4, 230.0, 0.0, 1.0, 17.0]), 1.0);
        assert_eq!(model.predict_row(&[0.4, 250.0, 0.0, 1.0, 17.0]), 2.0);
    }

    #[test]
    fn test_readings_csv_header_and_blank_cells() {
        let csv = readings_csv(
            &Schema::EVALUATE,
            &[Reading::new(230.0, 1.0).without_voltage()],
            ',',
        );
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("Global_reactive_power,Voltage,Sub_metering_1,Sub_metering_2,Sub_metering_3,Global_active_power")
        );
        assert_eq!(lines.next(), Some("0.4,,0,1,17,1"));
    }

    #[test]
    fn test_readings_csv_upload_has_no_label() {
        let csv = readings_csv(&Schema::UPLOAD, &[Reading::new(230.0, 1.0)], ';');
        assert_eq!(csv.lines().nth(1), Some("0.4;230;0;1;17"));
    }
}
