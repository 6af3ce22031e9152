//! Observability infrastructure for the insights engine
//!
//! Provides:
//! - Prometheus metrics (ingestion, training and prediction latency, model gauges)
//! - Structured logging of domain events with tracing

use crate::models::UploadId;
use crate::training::{ModelKind, TrainingReport};
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Encoder, Histogram,
    IntCounter, IntGauge, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Latency buckets in seconds; training runs can take tens of seconds
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    ingestion_latency_seconds: Histogram,
    training_latency_seconds: Histogram,
    prediction_latency_seconds: Histogram,
    records_ingested: IntCounter,
    duplicate_uploads: IntCounter,
    predictions_unavailable: IntCounter,
    trained_models: IntGauge,
    bundle_version: IntGauge,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            ingestion_latency_seconds: register_histogram!(
                "hirewise_ingestion_latency_seconds",
                "Time spent reading, normalizing and storing an upload",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register ingestion_latency_seconds"),

            training_latency_seconds: register_histogram!(
                "hirewise_training_latency_seconds",
                "Time spent training the model set",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register training_latency_seconds"),

            prediction_latency_seconds: register_histogram!(
                "hirewise_prediction_latency_seconds",
                "Time spent serving one prediction request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            records_ingested: register_int_counter!(
                "hirewise_records_ingested_total",
                "Canonical records stored from uploads"
            )
            .expect("Failed to register records_ingested"),

            duplicate_uploads: register_int_counter!(
                "hirewise_duplicate_uploads_total",
                "Uploads skipped because their fingerprint was already stored"
            )
            .expect("Failed to register duplicate_uploads"),

            predictions_unavailable: register_int_counter!(
                "hirewise_predictions_unavailable_total",
                "Prediction requests answered as unavailable"
            )
            .expect("Failed to register predictions_unavailable"),

            trained_models: register_int_gauge!(
                "hirewise_trained_models",
                "Number of models present in the active model set"
            )
            .expect("Failed to register trained_models"),

            bundle_version: register_int_gauge!(
                "hirewise_bundle_version",
                "Version of the active model set"
            )
            .expect("Failed to register bundle_version"),
        }
    }
}

/// Lightweight handle to the process-global engine metrics
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new)
    }

    pub fn observe_ingestion_latency(&self, duration_secs: f64) {
        self.inner().ingestion_latency_seconds.observe(duration_secs);
    }

    pub fn observe_training_latency(&self, duration_secs: f64) {
        self.inner().training_latency_seconds.observe(duration_secs);
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn add_records_ingested(&self, count: usize) {
        self.inner().records_ingested.inc_by(count as u64);
    }

    pub fn inc_duplicate_uploads(&self) {
        self.inner().duplicate_uploads.inc();
    }

    pub fn inc_predictions_unavailable(&self) {
        self.inner().predictions_unavailable.inc();
    }

    /// Update the gauges describing the active model set
    pub fn set_model_set(&self, version: u64, trained_models: usize) {
        self.inner().bundle_version.set(version as i64);
        self.inner().trained_models.set(trained_models as i64);
    }
}

/// Render the default registry in the Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Structured logger for engine events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn upload_ingested(
        &self,
        upload_id: UploadId,
        source_name: &str,
        hired_records: usize,
        pipeline_records: usize,
        diagnostics: usize,
    ) {
        info!(
            event = "upload_ingested",
            instance = %self.instance,
            upload_id = upload_id,
            source_name = %source_name,
            hired_records = hired_records,
            pipeline_records = pipeline_records,
            diagnostics = diagnostics,
            "Upload ingested"
        );
    }

    pub fn upload_duplicate(&self, upload_id: UploadId, fingerprint: &str) {
        info!(
            event = "upload_duplicate",
            instance = %self.instance,
            upload_id = upload_id,
            fingerprint = %fingerprint,
            "Upload already ingested, skipping"
        );
    }

    pub fn training_completed(&self, version: u64, report: &TrainingReport) {
        info!(
            event = "training_completed",
            instance = %self.instance,
            version = version,
            corpus_size = report.corpus_size,
            trained_models = report.trained_count(),
            duration_ms = report.duration_ms,
            "Training run completed"
        );
    }

    pub fn model_skipped(&self, kind: ModelKind, reason: &str, failed: bool) {
        if failed {
            warn!(
                event = "model_skipped",
                instance = %self.instance,
                model = %kind,
                failed = true,
                reason = %reason,
                "Model training failed"
            );
        } else {
            info!(
                event = "model_skipped",
                instance = %self.instance,
                model = %kind,
                failed = false,
                reason = %reason,
                "Model skipped"
            );
        }
    }

    pub fn prediction_unavailable(&self, kind: ModelKind, reason: &str) {
        info!(
            event = "prediction_unavailable",
            instance = %self.instance,
            model = %kind,
            reason = %reason,
            "Prediction unavailable"
        );
    }

    pub fn bundle_load_failed(&self, error: &str) {
        warn!(
            event = "bundle_load_failed",
            instance = %self.instance,
            error = %error,
            "Failed to load model bundle, starting untrained"
        );
    }
}
