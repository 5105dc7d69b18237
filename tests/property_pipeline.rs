//! Property-based tests for the prediction pipeline
//!
//! Row accounting, imputation and metric invariants over generated
//! metering files.

use proptest::prelude::*;
use voltcast::evaluation::RegressionMetrics;
use voltcast::features::FeatureMatrix;
use voltcast::impute::MeanImputer;
use voltcast::model::LightGbmModel;
use voltcast::pipeline::{evaluate_table, predict_table};
use voltcast::schema::Schema;
use voltcast::table::{Table, COMMA, SEMICOLON};
use voltcast::testing::fixtures::{readings_csv, voltage_model_text, Reading};
use voltcast::upload::sanitize_filename;

fn reading_strategy() -> impl Strategy<Value = Reading> {
    (
        200.0f64..260.0,
        0.1f64..8.0,
        proptest::bool::weighted(0.2),
    )
        .prop_map(|(voltage, active, missing)| {
            let reading = Reading::new(voltage, active);
            if missing {
                reading.without_voltage()
            } else {
                reading
            }
        })
}

fn column_strategy() -> impl Strategy<Value = Vec<Option<f64>>> {
    prop::collection::vec(prop::option::weighted(0.7, -1000.0f64..1000.0), 1..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_upload_yields_one_prediction_per_row(
        readings in prop::collection::vec(reading_strategy(), 1..60)
    ) {
        // keep every voltage present: uploads are not imputed
        let readings: Vec<Reading> = readings
            .into_iter()
            .map(|r| Reading { voltage: r.voltage.or(Some(230.0)), ..r })
            .collect();
        let model = LightGbmModel::parse(&voltage_model_text(&Schema::UPLOAD)).unwrap();
        let csv = readings_csv(&Schema::UPLOAD, &readings, ';');
        let table = Table::from_reader(csv.as_bytes(), SEMICOLON).unwrap();

        let predictions = predict_table(&table, &model).unwrap();
        prop_assert_eq!(predictions.len(), readings.len());
        prop_assert!(predictions.iter().all(|p| *p == 1.0 || *p == 2.0));
    }

    #[test]
    fn prop_evaluation_aligns_predictions_and_labels(
        readings in prop::collection::vec(reading_strategy(), 2..60)
    ) {
        // at least one present voltage so the column mean is defined
        let mut readings = readings;
        readings[0].voltage = Some(235.0);
        let model = LightGbmModel::parse(&voltage_model_text(&Schema::EVALUATE)).unwrap();
        let csv = readings_csv(&Schema::EVALUATE, &readings, ',');
        let table = Table::from_reader(csv.as_bytes(), COMMA).unwrap();

        let evaluation = evaluate_table(&table, &model).unwrap();
        prop_assert_eq!(evaluation.predictions.len(), readings.len());
        prop_assert_eq!(evaluation.real_values.len(), readings.len());
        prop_assert!(evaluation.features.voltage.iter().all(|v| v.is_finite()));
        for (label, reading) in evaluation.real_values.iter().zip(&readings) {
            prop_assert_eq!(Some(*label), reading.active_power);
        }
    }

    #[test]
    fn prop_imputation_keeps_present_values(column in column_strategy()) {
        let names = vec!["x".to_string()];
        let data: Vec<f64> = column.iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        let mut matrix = FeatureMatrix::from_rows(names, column.len(), data).unwrap();

        let report = MeanImputer::new().impute(&mut matrix);
        let present: Vec<f64> = column.iter().flatten().copied().collect();
        let imputed = matrix.column(0);

        for (before, after) in column.iter().zip(&imputed) {
            match before {
                Some(v) => prop_assert_eq!(*v, *after),
                None if present.is_empty() => prop_assert!(after.is_nan()),
                None => {
                    let mean = present.iter().sum::<f64>() / present.len() as f64;
                    prop_assert!((after - mean).abs() < 1e-9);
                }
            }
        }
        prop_assert_eq!(report.is_noop(), present.len() == column.len());
    }

    #[test]
    fn prop_metrics_relations(
        pairs in prop::collection::vec((-100.0f64..100.0, -100.0f64..100.0), 1..50)
    ) {
        let (predictions, real): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        let m = RegressionMetrics::compute(&predictions, &real).unwrap();
        prop_assert!(m.mse >= 0.0);
        prop_assert!((m.rmse - m.mse.sqrt()).abs() < 1e-9);
        prop_assert!(m.mae <= m.rmse + 1e-9);
    }

    #[test]
    fn prop_sanitized_names_are_single_components(name in ".{0,40}") {
        let clean = sanitize_filename(&name);
        prop_assert!(!clean.is_empty());
        prop_assert!(!clean.contains('/'));
        prop_assert!(!clean.contains('\\'));
        prop_assert!(!clean.starts_with('.'));
    }
}
