//! Shared helpers for API tests

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

use crate::model::{LightGbmModel, SharedModel};
use crate::schema::Schema;
use crate::testing::fixtures::voltage_model_text;

pub(crate) const BOUNDARY: &str = "voltcast-test-boundary";

/// Fixture model wired for `schema`: 1.0 at or below 240 V, 2.0 above
pub(crate) fn voltage_model(schema: &Schema) -> SharedModel {
    Arc::new(LightGbmModel::parse(&voltage_model_text(schema)).expect("test"))
}

/// Write `contents` as the evaluation test file
pub(crate) fn write_data(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("test1_data.csv");
    std::fs::write(&path, contents).expect("test");
    path
}

pub(crate) fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("test")
}

/// `POST /predict` with one multipart part
pub(crate) fn multipart_request(field: &str, filename: &str, contents: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {contents}\r\n\
         --{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("test")
}

/// `POST /predict` with a file under the `file` field
pub(crate) fn upload_request(filename: &str, contents: &str) -> Request<Body> {
    multipart_request("file", filename, contents)
}

pub(crate) async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("test")
        .to_vec()
}

pub(crate) async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("test")
}

/// Files currently in `dir` (empty when the directory does not exist)
pub(crate) fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).map_or(0, Iterator::count)
}
