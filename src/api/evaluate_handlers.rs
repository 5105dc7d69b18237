//! Evaluation service handlers

use std::time::Instant;

use axum::{extract::State, Json};
use tracing::{error, info};

use super::{api_error, ApiError, EvaluateResponse, EvaluateState, StatusResponse};
use crate::archive::archive_evaluation;
use crate::error::VoltcastError;
use crate::pipeline::evaluate_file;

pub(crate) async fn index_handler() -> Json<StatusResponse> {
    info!("route / accessed");
    Json(StatusResponse {
        message: "voltcast prediction API for household power readings (LightGBM)".to_string(),
        status: "ok".to_string(),
    })
}

/// Score the configured test file and archive the run
pub(crate) async fn predict_handler(
    State(state): State<EvaluateState>,
) -> Result<Json<EvaluateResponse>, ApiError> {
    let start = Instant::now();
    info!(path = %state.data_path.display(), "route /predict called");

    let model = state.model.clone();
    let path = state.data_path.clone();
    let result = tokio::task::spawn_blocking(move || evaluate_file(&path, model.as_ref()))
        .await
        .unwrap_or_else(|e| {
            Err(VoltcastError::InferenceError {
                reason: format!("prediction task failed: {e}"),
            })
        });

    let evaluation = match result {
        Ok(evaluation) => evaluation,
        Err(e) => {
            state.metrics.record_failure();
            error!(error = %e, status = e.status_code().as_u16(), "prediction failed");
            return Err(api_error(&e));
        },
    };

    state
        .metrics
        .record_success(evaluation.predictions.len(), start.elapsed());
    info!(
        rows = evaluation.predictions.len(),
        mse = evaluation.metrics.mse,
        rmse = evaluation.metrics.rmse,
        mae = evaluation.metrics.mae,
        "predictions generated"
    );

    let outcome = archive_evaluation(state.archiver.as_deref(), &evaluation).await;
    state.metrics.record_archive(&outcome);

    Ok(Json(EvaluateResponse::new(state.model.name(), evaluation)))
}
