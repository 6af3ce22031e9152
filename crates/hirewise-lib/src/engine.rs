//! Query-facing engine facade
//!
//! `InsightsEngine` ties ingestion, storage, training and the read paths
//! together. All methods are synchronous; callers on an async runtime should
//! run `ingest` and `retrain` on a blocking thread.

use crate::analytics::{filter_options, AggregateResult, AggregationEngine, FilterOptions, FilterSpec};
use crate::config::EngineConfig;
use crate::error::IngestError;
use crate::ingest::{fingerprint, prepare_batch, read_upload};
use crate::models::{CanonicalRecord, SheetKind, Upload, UploadId, UploadSummary};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::predictor::{
    detect_anomalies, AnomalyReport, Forecast, PositionFields, Prediction, PredictionService,
};
use crate::store::{JsonRecordStore, RecordStore};
use crate::training::{
    BundleStore, FileBundleStore, ModelKind, ModelOutcome, TrainedModelSet, Trainer,
    TrainingReport,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use tracing::{debug, warn};

/// Shared slot for the active model set
///
/// Readers clone the `Arc` and keep a consistent snapshot for as long as
/// they hold it; a retrain swaps in a whole new set.
pub struct ModelHandle {
    current: RwLock<Arc<TrainedModelSet>>,
}

impl ModelHandle {
    pub fn new(models: TrainedModelSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(models)),
        }
    }

    pub fn current(&self) -> Arc<TrainedModelSet> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn replace(&self, models: TrainedModelSet) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(models);
    }
}

/// Result of one ingestion call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub upload_id: UploadId,
    /// True when identical bytes were already ingested; nothing was stored
    pub duplicate: bool,
    pub hired_records: usize,
    pub pipeline_records: usize,
    #[serde(default)]
    pub diagnostics: Vec<String>,
    /// Absent for duplicates, which do not retrain
    pub training: Option<TrainingReport>,
}

/// What the active model set can do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlStatus {
    pub is_trained: bool,
    pub version: u64,
    pub trained_at: Option<DateTime<Utc>>,
    pub models: BTreeMap<ModelKind, bool>,
    pub capabilities: Vec<String>,
    pub last_training: Option<TrainingReport>,
}

pub struct InsightsEngine {
    config: EngineConfig,
    records: Arc<dyn RecordStore>,
    bundles: Arc<dyn BundleStore>,
    models: ModelHandle,
    aggregation: AggregationEngine,
    /// Serializes fingerprint check and insert
    ingest_lock: Mutex<()>,
    retrain_lock: Mutex<()>,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl InsightsEngine {
    /// Open file-backed stores under the configured data directory
    pub fn open(config: EngineConfig) -> anyhow::Result<Self> {
        let records = JsonRecordStore::open(config.records_path())?;
        let bundles = FileBundleStore::new(config.bundle_path());
        Ok(Self::with_stores(config, Arc::new(records), Arc::new(bundles)))
    }

    /// Build an engine over explicit stores, restoring any saved model set
    pub fn with_stores(
        config: EngineConfig,
        records: Arc<dyn RecordStore>,
        bundles: Arc<dyn BundleStore>,
    ) -> Self {
        let logger = StructuredLogger::new("hirewise-engine");
        let metrics = EngineMetrics::new();

        let models = match bundles.load() {
            Ok(Some(models)) => {
                debug!(version = models.version, "Restored model bundle");
                models
            }
            Ok(None) => TrainedModelSet::empty(),
            Err(e) => {
                logger.bundle_load_failed(&e.to_string());
                TrainedModelSet::empty()
            }
        };
        metrics.set_model_set(models.version, models.trained_models().len());

        Self {
            aggregation: AggregationEngine::new(config.leaderboard_size, config.commentary.clone()),
            config,
            records,
            bundles,
            models: ModelHandle::new(models),
            ingest_lock: Mutex::new(()),
            retrain_lock: Mutex::new(()),
            metrics,
            logger,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Snapshot of the active model set
    pub fn models(&self) -> Arc<TrainedModelSet> {
        self.models.current()
    }

    /// Store an upload and retrain on the full hired corpus
    ///
    /// Re-ingesting identical bytes returns the existing upload id and
    /// changes nothing.
    pub fn ingest(
        &self,
        filename: &str,
        bytes: &[u8],
        kind: Option<SheetKind>,
    ) -> Result<IngestOutcome, IngestError> {
        let start = Instant::now();
        let fingerprint = fingerprint(bytes);

        let outcome = {
            let _guard = self.ingest_lock.lock().unwrap_or_else(|e| e.into_inner());

            if let Some(existing) = self
                .records
                .find_by_fingerprint(&fingerprint)
                .map_err(IngestError::Store)?
            {
                self.metrics.inc_duplicate_uploads();
                self.logger.upload_duplicate(existing, &fingerprint);
                return Ok(IngestOutcome {
                    upload_id: existing,
                    duplicate: true,
                    hired_records: 0,
                    pipeline_records: 0,
                    diagnostics: Vec::new(),
                    training: None,
                });
            }

            let tables = read_upload(filename, bytes, kind)?;
            let today = Utc::now().date_naive();
            let batches: Vec<_> = tables
                .iter()
                .map(|(kind, table)| prepare_batch(table, *kind, today))
                .collect();

            let upload = Upload {
                id: self.records.next_id().map_err(IngestError::Store)?,
                source_name: filename.to_string(),
                fingerprint,
                uploaded_at: Utc::now(),
                batches,
            };
            let summary = UploadSummary::from(&upload);
            let diagnostics: Vec<String> = upload
                .batches
                .iter()
                .flat_map(|b| {
                    b.diagnostics
                        .iter()
                        .map(move |d| format!("{}: {}", b.kind, d))
                })
                .collect();

            self.records
                .insert_upload(upload)
                .map_err(IngestError::Store)?;

            self.metrics
                .add_records_ingested(summary.hired_records + summary.pipeline_records);
            self.logger.upload_ingested(
                summary.id,
                filename,
                summary.hired_records,
                summary.pipeline_records,
                diagnostics.len(),
            );

            IngestOutcome {
                upload_id: summary.id,
                duplicate: false,
                hired_records: summary.hired_records,
                pipeline_records: summary.pipeline_records,
                diagnostics,
                training: None,
            }
        };
        self.metrics
            .observe_ingestion_latency(start.elapsed().as_secs_f64());

        Ok(IngestOutcome {
            training: Some(self.retrain()),
            ..outcome
        })
    }

    /// Retrain every model on all stored hired records
    ///
    /// When no model trains, the active set is kept. A set that fails to
    /// persist is still activated.
    pub fn retrain(&self) -> TrainingReport {
        let _guard = self.retrain_lock.lock().unwrap_or_else(|e| e.into_inner());
        let start = Instant::now();

        let corpus = self.records.all_records(SheetKind::Hired).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read training corpus, training on nothing");
            Vec::new()
        });
        let version = self.models.current().version + 1;
        let run = Trainer::new(self.config.training.clone()).train(&corpus, version);

        for (kind, outcome) in &run.report.outcomes {
            match outcome {
                ModelOutcome::Skipped { reason } => self.logger.model_skipped(*kind, reason, false),
                ModelOutcome::Failed { reason } => self.logger.model_skipped(*kind, reason, true),
                ModelOutcome::Trained { .. } => {}
            }
        }

        if let Some(models) = run.bundle {
            if let Err(e) = self.bundles.save(&models) {
                warn!(version = models.version, error = %e, "Failed to persist model bundle");
            }
            self.logger.training_completed(models.version, &run.report);
            self.metrics
                .set_model_set(models.version, models.trained_models().len());
            self.models.replace(models);
        } else {
            debug!(corpus_size = corpus.len(), "No model trained, keeping active set");
        }

        self.metrics
            .observe_training_latency(start.elapsed().as_secs_f64());
        run.report
    }

    fn load_records(&self, kind: SheetKind, upload_id: Option<UploadId>) -> Vec<CanonicalRecord> {
        self.records.records(kind, upload_id).unwrap_or_else(|e| {
            warn!(kind = %kind, error = %e, "Failed to read records, treating as empty");
            Vec::new()
        })
    }

    pub fn get_filter_options(&self, kind: SheetKind, upload_id: Option<UploadId>) -> FilterOptions {
        filter_options(&self.load_records(kind, upload_id))
    }

    pub fn get_dashboard_data(
        &self,
        kind: SheetKind,
        upload_id: Option<UploadId>,
        filter: &FilterSpec,
    ) -> AggregateResult {
        let records = self.load_records(kind, upload_id);
        self.aggregation.aggregate(&records, kind, filter)
    }

    pub fn get_ml_status(&self) -> MlStatus {
        let models = self.models.current();
        MlStatus {
            is_trained: models.is_trained,
            version: models.version,
            trained_at: models.trained_at,
            models: ModelKind::ALL
                .iter()
                .map(|kind| (*kind, models.has(*kind)))
                .collect(),
            capabilities: models
                .trained_models()
                .iter()
                .map(|kind| kind.capability().to_string())
                .collect(),
            last_training: models.report.clone(),
        }
    }

    pub fn predict_time_to_fill(&self, fields: &PositionFields) -> Prediction<i64> {
        let start = Instant::now();
        let models = self.models.current();
        let prediction = PredictionService::new(&models).predict_time_to_fill(fields);
        if let Some(reason) = prediction.unavailable_reason() {
            self.note_unavailable(ModelKind::TimeToFill, reason);
        }
        self.metrics
            .observe_prediction_latency(start.elapsed().as_secs_f64());
        prediction
    }

    pub fn forecast(&self, fields: &PositionFields) -> Forecast {
        let start = Instant::now();
        let models = self.models.current();
        let forecast = PredictionService::new(&models).forecast(fields);
        for (kind, reason) in forecast.unavailable() {
            self.note_unavailable(kind, reason);
        }
        self.metrics
            .observe_prediction_latency(start.elapsed().as_secs_f64());
        forecast
    }

    /// Score the hired records of one upload, or of the latest one
    pub fn detect_anomalies(&self, upload_id: Option<UploadId>) -> Prediction<AnomalyReport> {
        let models = self.models.current();
        let records = self.load_records(SheetKind::Hired, upload_id);
        let report = detect_anomalies(&models, &records);
        if let Some(reason) = report.unavailable_reason() {
            self.note_unavailable(ModelKind::Anomaly, reason);
        }
        report
    }

    pub fn list_uploads(&self) -> Vec<UploadSummary> {
        self.records.list_uploads().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to list uploads");
            Vec::new()
        })
    }

    fn note_unavailable(&self, kind: ModelKind, reason: &str) {
        self.metrics.inc_predictions_unavailable();
        self.logger.prediction_unavailable(kind, reason);
    }
}
