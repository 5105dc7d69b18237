//! HTTP API
//!
//! Two routers share one shape: a banner at `/`, the prediction endpoint at
//! `/predict` and Prometheus counters at `/metrics`.
//!
//! ## Evaluation service
//!
//! - `GET /` - Service banner
//! - `GET /predict` - Score the configured test file, with metrics
//! - `GET /metrics` - Prometheus-formatted metrics
//!
//! ## Upload service
//!
//! - `GET /` - HTML upload page
//! - `POST /predict` - Score an uploaded file (multipart field `file`)
//! - `GET /metrics` - Prometheus-formatted metrics
//!
//! ## Example
//!
//! ```rust,ignore
//! use voltcast::api::{create_evaluate_router, EvaluateState};
//!
//! let state = EvaluateState::new(model, "test1_data.csv");
//! let app = create_evaluate_router(state);
//! axum::serve(listener, app).await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, FromRef, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use crate::{
    archive::ElasticsearchArchiver,
    error::{Result, VoltcastError},
    metrics::MetricsCollector,
    model::SharedModel,
    upload::UploadPolicy,
};

mod evaluate_handlers;
pub mod types;
mod upload_handlers;

pub use types::{ErrorResponse, EvaluateResponse, StatusResponse, UploadResponse};

/// Largest accepted request body for uploads
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Handler error: status plus `{"error": ...}` body
pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(err: &VoltcastError) -> ApiError {
    (
        err.status_code(),
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// Evaluation service state
#[derive(Clone)]
pub struct EvaluateState {
    model: SharedModel,
    data_path: Arc<PathBuf>,
    archiver: Option<Arc<ElasticsearchArchiver>>,
    metrics: MetricsCollector,
}

impl EvaluateState {
    /// State scoring `data_path` with `model`, archiving disabled
    pub fn new(model: SharedModel, data_path: impl Into<PathBuf>) -> Self {
        Self {
            model,
            data_path: Arc::new(data_path.into()),
            archiver: None,
            metrics: MetricsCollector::new(),
        }
    }

    /// Archive every successful run through `archiver`
    #[must_use]
    pub fn with_archiver(mut self, archiver: ElasticsearchArchiver) -> Self {
        self.archiver = Some(Arc::new(archiver));
        self
    }

    /// Whether a document store is attached
    #[must_use]
    pub fn has_archiver(&self) -> bool {
        self.archiver.is_some()
    }

    /// Service counters
    #[must_use]
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }
}

/// Upload service state
///
/// The upload service starts even when its model fails to load; the load
/// error is kept and returned by every `POST /predict`.
#[derive(Clone)]
pub struct UploadState {
    model: std::result::Result<SharedModel, Arc<VoltcastError>>,
    policy: Arc<UploadPolicy>,
    metrics: MetricsCollector,
}

impl UploadState {
    /// State from a model load result and an upload policy
    pub fn new(model: Result<SharedModel>, policy: UploadPolicy) -> Self {
        Self {
            model: model.map_err(Arc::new),
            policy: Arc::new(policy),
            metrics: MetricsCollector::new(),
        }
    }

    /// Whether the model loaded
    #[must_use]
    pub fn model_ready(&self) -> bool {
        self.model.is_ok()
    }

    /// Service counters
    #[must_use]
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }
}

impl FromRef<EvaluateState> for MetricsCollector {
    fn from_ref(state: &EvaluateState) -> Self {
        state.metrics.clone()
    }
}

impl FromRef<UploadState> for MetricsCollector {
    fn from_ref(state: &UploadState) -> Self {
        state.metrics.clone()
    }
}

/// Router for the fixed-file evaluation service
pub fn create_evaluate_router(state: EvaluateState) -> Router {
    Router::new()
        .route("/", get(evaluate_handlers::index_handler))
        .route("/predict", get(evaluate_handlers::predict_handler))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(cors_preflight))
        .layer(middleware::map_response(response_headers))
        .with_state(state)
}

/// Router for the upload service
pub fn create_upload_router(state: UploadState) -> Router {
    Router::new()
        .route("/", get(upload_handlers::index_handler))
        .route(
            "/predict",
            axum::routing::post(upload_handlers::predict_handler),
        )
        .route("/metrics", get(metrics_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(middleware::from_fn(cors_preflight))
        .layer(middleware::map_response(response_headers))
        .with_state(state)
}

/// Metrics handler - returns Prometheus-formatted metrics
async fn metrics_handler(State(metrics): State<MetricsCollector>) -> String {
    metrics.to_prometheus()
}

/// Headers set on every response: `nosniff` and an open CORS origin
async fn response_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}

/// Answers CORS preflight `OPTIONS` requests with 204; other requests pass through
async fn cors_preflight(request: Request, next: Next) -> Response {
    if request.method() != Method::OPTIONS {
        return next.run(request).await;
    }
    let requested_headers = request
        .headers()
        .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
        .cloned();

    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        requested_headers.unwrap_or_else(|| HeaderValue::from_static("*")),
    );
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("600"));
    response
}

// Test helpers module (compiled only in tests)
#[cfg(test)]
pub(crate) mod test_helpers;

#[cfg(test)]
mod tests;
