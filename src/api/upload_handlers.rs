//! Upload service handlers

use std::time::Instant;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    response::Html,
    Json,
};
use tracing::{error, info, warn};

use super::{api_error, ApiError, UploadResponse, UploadState};
use crate::error::VoltcastError;
use crate::pipeline::predict_file;

/// Name of the multipart field carrying the file
pub(crate) const FILE_FIELD: &str = "file";

const INDEX_HTML: &str = include_str!("../../static/index.html");

pub(crate) async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Store, score and delete one uploaded file
pub(crate) async fn predict_handler(
    State(state): State<UploadState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let start = Instant::now();
    let outcome = match multipart {
        Ok(multipart) => predict_upload(&state, multipart).await,
        Err(rejection) => Err(VoltcastError::InvalidUpload {
            reason: format!("invalid multipart body: {}", rejection.body_text()),
        }),
    };
    match outcome {
        Ok(predictions) => {
            state.metrics.record_success(predictions.len(), start.elapsed());
            info!(rows = predictions.len(), "upload scored");
            Ok(Json(UploadResponse {
                message: format!("predictions generated for {} rows", predictions.len()),
                predictions,
            }))
        },
        Err(e) => {
            state.metrics.record_failure();
            if e.status_code().is_server_error() {
                error!(error = %e, "upload prediction failed");
            } else {
                warn!(error = %e, "upload rejected");
            }
            Err(api_error(&e))
        },
    }
}

async fn predict_upload(
    state: &UploadState,
    mut multipart: Multipart,
) -> crate::error::Result<Vec<f64>> {
    let (filename, contents) = read_file_field(&mut multipart).await?;
    state.policy.validate_extension(&filename)?;
    if contents.is_empty() {
        return Err(VoltcastError::InvalidUpload {
            reason: "uploaded file is empty".to_string(),
        });
    }

    let model = match &state.model {
        Ok(model) => model.clone(),
        Err(load_error) => {
            return Err(VoltcastError::ModelUnavailable {
                reason: load_error.to_string(),
            })
        },
    };

    let policy = state.policy.clone();
    tokio::task::spawn_blocking(move || {
        let upload = policy.store(&filename, &contents)?;
        info!(file = %filename, stored = %upload.path().display(), "upload received");
        predict_file(upload.path(), model.as_ref())
    })
    .await
    .unwrap_or_else(|e| {
        Err(VoltcastError::InferenceError {
            reason: format!("prediction task failed: {e}"),
        })
    })
}

/// First `file` part: client file name and contents
async fn read_file_field(multipart: &mut Multipart) -> crate::error::Result<(String, Vec<u8>)> {
    let bad_request = |e: axum::extract::multipart::MultipartError| VoltcastError::InvalidUpload {
        reason: format!("invalid multipart body: {e}"),
    };
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(VoltcastError::InvalidUpload {
                reason: "no file selected".to_string(),
            });
        }
        let contents = field.bytes().await.map_err(bad_request)?;
        return Ok((filename, contents.to_vec()));
    }
    Err(VoltcastError::InvalidUpload {
        reason: "no file part in the request".to_string(),
    })
}
