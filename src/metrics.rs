//! Service telemetry
//!
//! Counters for requests, predicted rows, inference time and archive
//! outcomes, exposed in Prometheus text format at `GET /metrics`.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::archive::ArchiveOutcome;

/// Shared counters; clones update the same values
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    total_requests: Arc<AtomicUsize>,
    successful_requests: Arc<AtomicUsize>,
    failed_requests: Arc<AtomicUsize>,
    rows_predicted: Arc<AtomicUsize>,
    /// Microseconds spent in the request pipeline
    total_inference_time_us: Arc<AtomicU64>,
    archived: Arc<AtomicUsize>,
    archive_skipped: Arc<AtomicUsize>,
    archive_failed: Arc<AtomicUsize>,
    start_time: Instant,
}

impl MetricsCollector {
    /// Create a collector with every counter at zero
    #[must_use]
    pub fn new() -> Self {
        Self {
            total_requests: Arc::new(AtomicUsize::new(0)),
            successful_requests: Arc::new(AtomicUsize::new(0)),
            failed_requests: Arc::new(AtomicUsize::new(0)),
            rows_predicted: Arc::new(AtomicUsize::new(0)),
            total_inference_time_us: Arc::new(AtomicU64::new(0)),
            archived: Arc::new(AtomicUsize::new(0)),
            archive_skipped: Arc::new(AtomicUsize::new(0)),
            archive_failed: Arc::new(AtomicUsize::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Record a successful prediction request
    pub fn record_success(&self, rows: usize, duration: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
        self.rows_predicted.fetch_add(rows, Ordering::Relaxed);
        self.total_inference_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a failed prediction request
    pub fn record_failure(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one archive attempt by outcome
    pub fn record_archive(&self, outcome: &ArchiveOutcome) {
        let counter = match outcome {
            ArchiveOutcome::Archived { .. } => &self.archived,
            ArchiveOutcome::Skipped => &self.archive_skipped,
            ArchiveOutcome::Failed { .. } => &self.archive_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let successful = self.successful_requests.load(Ordering::Relaxed);
        let failed = self.failed_requests.load(Ordering::Relaxed);
        let total_time_us = self.total_inference_time_us.load(Ordering::Relaxed);

        MetricsSnapshot {
            total_requests,
            successful_requests: successful,
            failed_requests: failed,
            rows_predicted: self.rows_predicted.load(Ordering::Relaxed),
            total_inference_time_us: total_time_us,
            archived: self.archived.load(Ordering::Relaxed),
            archive_skipped: self.archive_skipped.load(Ordering::Relaxed),
            archive_failed: self.archive_failed.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
            avg_latency_ms: if successful > 0 {
                (total_time_us as f64 / 1000.0) / successful as f64
            } else {
                0.0
            },
            error_rate: if total_requests > 0 {
                failed as f64 / total_requests as f64
            } else {
                0.0
            },
        }
    }

    /// Export in Prometheus text exposition format
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut out = String::new();
        for (name, kind, help, value) in [
            ("requests_total", "counter", "Prediction requests", s.total_requests.to_string()),
            ("requests_successful", "counter", "Successful prediction requests", s.successful_requests.to_string()),
            ("requests_failed", "counter", "Failed prediction requests", s.failed_requests.to_string()),
            ("rows_predicted_total", "counter", "Rows scored by the model", s.rows_predicted.to_string()),
            (
                "inference_time_seconds",
                "counter",
                "Time spent in the prediction pipeline",
                format!("{:.6}", s.total_inference_time_us as f64 / 1_000_000.0),
            ),
            ("archive_archived_total", "counter", "Documents written to the archive", s.archived.to_string()),
            ("archive_skipped_total", "counter", "Archive writes skipped (no store)", s.archive_skipped.to_string()),
            ("archive_failed_total", "counter", "Archive writes that failed", s.archive_failed.to_string()),
            ("avg_latency_ms", "gauge", "Average pipeline latency in milliseconds", format!("{:.2}", s.avg_latency_ms)),
            ("error_rate", "gauge", "Failed request ratio (0.0-1.0)", format!("{:.4}", s.error_rate)),
            ("uptime_seconds", "counter", "Uptime in seconds", s.uptime_secs.to_string()),
        ] {
            out.push_str(&format!(
                "# HELP voltcast_{name} {help}\n# TYPE voltcast_{name} {kind}\nvoltcast_{name} {value}\n"
            ));
        }
        out
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the collector
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Prediction requests handled
    pub total_requests: usize,
    /// Requests answered with 200
    pub successful_requests: usize,
    /// Requests answered with an error
    pub failed_requests: usize,
    /// Rows scored across all requests
    pub rows_predicted: usize,
    /// Pipeline time in microseconds
    pub total_inference_time_us: u64,
    /// Documents archived
    pub archived: usize,
    /// Archive writes skipped
    pub archive_skipped: usize,
    /// Archive writes failed
    pub archive_failed: usize,
    /// Seconds since the collector was created
    pub uptime_secs: u64,
    /// Average pipeline latency in milliseconds
    pub avg_latency_ms: f64,
    /// Failed / total requests
    pub error_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_collector_creation() {
        let snapshot = MetricsCollector::new().snapshot();
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.rows_predicted, 0);
        assert_eq!(snapshot.archived, 0);
    }

    #[test]
    fn test_record_success_and_failure() {
        let metrics = MetricsCollector::new();
        metrics.record_success(120, Duration::from_millis(100));
        metrics.record_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.successful_requests, 1);
        assert_eq!(snapshot.failed_requests, 1);
        assert_eq!(snapshot.rows_predicted, 120);
        assert!(snapshot.total_inference_time_us >= 100_000);
        assert_eq!(snapshot.error_rate, 0.5);
    }

    #[test]
    fn test_archive_outcomes() {
        let metrics = MetricsCollector::new();
        metrics.record_archive(&ArchiveOutcome::Archived { id: "a1".into() });
        metrics.record_archive(&ArchiveOutcome::Skipped);
        metrics.record_archive(&ArchiveOutcome::Skipped);
        metrics.record_archive(&ArchiveOutcome::Failed {
            reason: "refused".into(),
        });

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.archived, 1);
        assert_eq!(snapshot.archive_skipped, 2);
        assert_eq!(snapshot.archive_failed, 1);
    }

    #[test]
    fn test_avg_latency_calculation() {
        let metrics = MetricsCollector::new();
        metrics.record_success(1, Duration::from_millis(100));
        metrics.record_success(1, Duration::from_millis(200));
        assert!((metrics.snapshot().avg_latency_ms - 150.0).abs() < 1.0);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = MetricsCollector::new();
        metrics.record_success(10, Duration::from_millis(100));
        metrics.record_failure();
        metrics.record_archive(&ArchiveOutcome::Skipped);

        let prom = metrics.to_prometheus();
        assert!(prom.contains("# TYPE voltcast_requests_total counter"));
        assert!(prom.contains("voltcast_requests_total 2\n"));
        assert!(prom.contains("voltcast_requests_failed 1\n"));
        assert!(prom.contains("voltcast_rows_predicted_total 10\n"));
        assert!(prom.contains("voltcast_archive_skipped_total 1\n"));
        assert!(prom.contains("voltcast_error_rate 0.5000\n"));
    }

    #[test]
    fn test_concurrent_updates() {
        let metrics = MetricsCollector::new();
        let metrics_clone = metrics.clone();

        let handle = thread::spawn(move || {
            for _ in 0..100 {
                metrics_clone.record_success(2, Duration::from_micros(100));
            }
        });
        for _ in 0..100 {
            metrics.record_success(2, Duration::from_micros(100));
        }
        handle.join().expect("join");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.successful_requests, 200);
        assert_eq!(snapshot.rows_predicted, 400);
    }

    #[test]
    fn test_zero_division_safety() {
        let snapshot = MetricsCollector::new().snapshot();
        assert_eq!(snapshot.avg_latency_ms, 0.0);
        assert_eq!(snapshot.error_rate, 0.0);
    }
}
