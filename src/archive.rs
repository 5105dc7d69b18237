//! Result archiving to an Elasticsearch-compatible document store
//!
//! Archiving is best-effort: the store is probed once at startup and, when
//! it is unreachable, the evaluation service runs without one. A failed
//! write is reported as [`ArchiveOutcome::Failed`] and never reaches the
//! HTTP response.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, VoltcastError};
use crate::evaluation::RegressionMetrics;
use crate::pipeline::{Evaluation, FeatureColumns};

/// Default index for prediction documents
pub const DEFAULT_INDEX: &str = "predictions";

/// Model identifier stored with every document
pub const ARCHIVE_MODEL_ID: &str = "LGBM";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One archived prediction run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveDocument {
    /// When the run was archived
    pub timestamp: DateTime<Utc>,
    /// Model identifier
    pub model: String,
    /// Predictions, aligned with `real_values`
    pub prediction: Vec<f64>,
    /// Accuracy metrics of the run
    pub accuracy: RegressionMetrics,
    /// Known labels
    pub real_values: Vec<f64>,
    /// Feature columns after imputation, plus the label
    pub features: FeatureColumns,
}

impl ArchiveDocument {
    /// Build a document for an evaluation, stamped now
    #[must_use]
    pub fn from_evaluation(evaluation: &Evaluation) -> Self {
        Self {
            timestamp: Utc::now(),
            model: ARCHIVE_MODEL_ID.to_string(),
            prediction: evaluation.predictions.clone(),
            accuracy: evaluation.metrics,
            real_values: evaluation.real_values.clone(),
            features: evaluation.features.clone(),
        }
    }
}

/// What happened to one archive attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// Document stored under `id`
    Archived {
        /// Identifier assigned by the store
        id: String,
    },
    /// No store configured
    Skipped,
    /// Store rejected the write or was unreachable
    Failed {
        /// Failure description
        reason: String,
    },
}

#[derive(Debug, Deserialize)]
struct IndexResponse {
    #[serde(rename = "_id")]
    id: String,
}

/// Client for one index of an Elasticsearch-compatible store
#[derive(Debug, Clone)]
pub struct ElasticsearchArchiver {
    client: Client,
    base_url: String,
    index: String,
}

impl ElasticsearchArchiver {
    /// Create a client without contacting the store
    ///
    /// # Errors
    ///
    /// Returns [`VoltcastError::ArchiveError`] if the HTTP client cannot
    /// be built.
    pub fn new(base_url: &str, index: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| VoltcastError::ArchiveError(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
        })
    }

    /// Create a client and ping the store
    ///
    /// # Errors
    ///
    /// Returns [`VoltcastError::ArchiveError`] when the store does not
    /// answer the ping with a success status.
    pub async fn connect(base_url: &str, index: &str) -> Result<Self> {
        let archiver = Self::new(base_url, index)?;
        archiver.ping().await?;
        info!(url = %archiver.base_url, index = %archiver.index, "connected to document store");
        Ok(archiver)
    }

    /// Probe the store root
    ///
    /// # Errors
    ///
    /// Returns [`VoltcastError::ArchiveError`] on transport failure or a
    /// non-success status.
    pub async fn ping(&self) -> Result<()> {
        let response = self
            .client
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| VoltcastError::ArchiveError(format!("ping {} failed: {e}", self.base_url)))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(VoltcastError::ArchiveError(format!(
                "ping {} returned {status}",
                self.base_url
            )))
        }
    }

    /// Index name documents are written to
    #[must_use]
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Write one document
    pub async fn archive(&self, document: &ArchiveDocument) -> ArchiveOutcome {
        match self.try_archive(document).await {
            Ok(id) => {
                debug!(index = %self.index, id = %id, "prediction run archived");
                ArchiveOutcome::Archived { id }
            },
            Err(e) => ArchiveOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }

    async fn try_archive(&self, document: &ArchiveDocument) -> Result<String> {
        let url = format!("{}/{}/_doc", self.base_url, self.index);
        let response = self
            .client
            .post(&url)
            .json(document)
            .send()
            .await
            .map_err(|e| VoltcastError::ArchiveError(format!("POST {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoltcastError::ArchiveError(format!(
                "POST {url} returned {status}: {body}"
            )));
        }

        let indexed: IndexResponse = response
            .json()
            .await
            .map_err(|e| VoltcastError::ArchiveError(format!("unexpected index response: {e}")))?;
        Ok(indexed.id)
    }
}

/// Archive when a store is configured, logging failures
pub async fn archive_evaluation(
    archiver: Option<&ElasticsearchArchiver>,
    evaluation: &Evaluation,
) -> ArchiveOutcome {
    let Some(archiver) = archiver else {
        return ArchiveOutcome::Skipped;
    };
    let outcome = archiver
        .archive(&ArchiveDocument::from_evaluation(evaluation))
        .await;
    match &outcome {
        ArchiveOutcome::Archived { id } => info!(id = %id, "results archived"),
        ArchiveOutcome::Failed { reason } => warn!(reason = %reason, "archiving failed"),
        ArchiveOutcome::Skipped => {},
    }
    outcome
}
