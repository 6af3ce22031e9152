//! Multi-model training orchestrator
//!
//! Fits a fresh encoder state on the hired corpus, then trains each of the
//! four models independently. One model's skip or failure never blocks the
//! others; the run yields a new model set only if at least one model fit.

use super::forest::{ForestParams, RandomForest, TreeTask};
use super::isolation::{IsolationForest, IsolationParams};
use crate::config::TrainingConfig;
use crate::error::TrainingError;
use crate::features::{
    EncoderState, FeatureVector, NumericColumn, NumericScaling, BUDGET_VARIANCE_FEATURES,
    SUCCESS_FEATURES, TIME_TO_FILL_FEATURES,
};
use crate::models::CanonicalRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    TimeToFill,
    BudgetVariance,
    Success,
    Anomaly,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::TimeToFill,
        ModelKind::BudgetVariance,
        ModelKind::Success,
        ModelKind::Anomaly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::TimeToFill => "time_to_fill",
            ModelKind::BudgetVariance => "budget_variance",
            ModelKind::Success => "success",
            ModelKind::Anomaly => "anomaly",
        }
    }

    /// Human-readable capability this model provides
    pub fn capability(&self) -> &'static str {
        match self {
            ModelKind::TimeToFill => "Time-to-fill prediction",
            ModelKind::BudgetVariance => "Budget variance forecasting",
            ModelKind::Success => "Hiring success probability",
            ModelKind::Anomaly => "Anomaly detection",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one model in a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModelOutcome {
    Trained { samples: usize },
    /// Not enough data yet; not an error
    Skipped { reason: String },
    Failed { reason: String },
}

impl ModelOutcome {
    pub fn is_trained(&self) -> bool {
        matches!(self, ModelOutcome::Trained { .. })
    }

    fn from_error(err: TrainingError) -> Self {
        if err.is_insufficient_data() {
            ModelOutcome::Skipped {
                reason: err.to_string(),
            }
        } else {
            ModelOutcome::Failed {
                reason: err.to_string(),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Hired records the run saw
    pub corpus_size: usize,
    pub outcomes: BTreeMap<ModelKind, ModelOutcome>,
    pub duration_ms: u64,
}

impl TrainingReport {
    pub fn any_trained(&self) -> bool {
        self.outcomes.values().any(ModelOutcome::is_trained)
    }

    pub fn trained_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_trained()).count()
    }
}

/// Fitted models plus the encoder state that produced their inputs
///
/// Built whole by a training run and never mutated afterwards; the next
/// successful run replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModelSet {
    pub version: u64,
    pub trained_at: Option<DateTime<Utc>>,
    pub encoders: EncoderState,
    pub time_to_fill: Option<RandomForest>,
    pub budget_variance: Option<RandomForest>,
    pub success: Option<RandomForest>,
    pub anomaly: Option<IsolationForest>,
    pub is_trained: bool,
    pub report: Option<TrainingReport>,
}

impl Default for TrainedModelSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl TrainedModelSet {
    /// Untrained set used before the first successful run
    pub fn empty() -> Self {
        Self {
            version: 0,
            trained_at: None,
            encoders: EncoderState::default(),
            time_to_fill: None,
            budget_variance: None,
            success: None,
            anomaly: None,
            is_trained: false,
            report: None,
        }
    }

    pub fn has(&self, kind: ModelKind) -> bool {
        match kind {
            ModelKind::TimeToFill => self.time_to_fill.is_some(),
            ModelKind::BudgetVariance => self.budget_variance.is_some(),
            ModelKind::Success => self.success.is_some(),
            ModelKind::Anomaly => self.anomaly.is_some() && self.encoders.numeric.is_some(),
        }
    }

    pub fn trained_models(&self) -> Vec<ModelKind> {
        ModelKind::ALL.into_iter().filter(|k| self.has(*k)).collect()
    }
}

/// Result of one training attempt
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub report: TrainingReport,
    /// The new set, present iff at least one model trained
    pub bundle: Option<TrainedModelSet>,
}

pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Train all four models on the hired corpus
    ///
    /// `version` is stamped on the resulting set.
    pub fn train(&self, hired: &[CanonicalRecord], version: u64) -> TrainingRun {
        let start = Instant::now();
        let mut encoders = EncoderState::fit(hired);
        let features = encoders.transform_all(hired);
        let mut outcomes = BTreeMap::new();

        let time_to_fill = self.record(
            &mut outcomes,
            ModelKind::TimeToFill,
            self.fit_regressor(hired, &features, &TIME_TO_FILL_FEATURES, |r| {
                r.time_to_fill.map(|d| d as f64)
            }),
        );

        let budget_variance = self.record(
            &mut outcomes,
            ModelKind::BudgetVariance,
            self.fit_regressor(hired, &features, &BUDGET_VARIANCE_FEATURES, |r| {
                r.budget_variance_pct
            }),
        );

        let success = self.record(
            &mut outcomes,
            ModelKind::Success,
            self.fit_success(hired, &features),
        );

        let anomaly = self
            .record(&mut outcomes, ModelKind::Anomaly, self.fit_anomaly(hired))
            .map(|(forest, scaling)| {
                encoders.numeric = Some(scaling);
                forest
            });

        let report = TrainingReport {
            corpus_size: hired.len(),
            outcomes,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            corpus_size = report.corpus_size,
            trained = report.trained_count(),
            duration_ms = report.duration_ms,
            "Training run finished"
        );

        if !report.any_trained() {
            return TrainingRun {
                report,
                bundle: None,
            };
        }

        let bundle = TrainedModelSet {
            version,
            trained_at: Some(Utc::now()),
            encoders,
            time_to_fill,
            budget_variance,
            success,
            anomaly,
            is_trained: true,
            report: Some(report.clone()),
        };
        TrainingRun {
            report,
            bundle: Some(bundle),
        }
    }

    fn record<T>(
        &self,
        outcomes: &mut BTreeMap<ModelKind, ModelOutcome>,
        kind: ModelKind,
        result: Result<(T, usize), TrainingError>,
    ) -> Option<T> {
        match result {
            Ok((model, samples)) => {
                debug!(model = %kind, samples, "Model trained");
                outcomes.insert(kind, ModelOutcome::Trained { samples });
                Some(model)
            }
            Err(err) => {
                let outcome = ModelOutcome::from_error(err);
                if let ModelOutcome::Failed { reason } = &outcome {
                    warn!(model = %kind, reason = %reason, "Model training failed");
                }
                outcomes.insert(kind, outcome);
                None
            }
        }
    }

    fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_estimators: self.config.n_estimators,
            max_depth: self.config.max_depth,
            min_samples_split: self.config.min_samples_split,
            seed: self.config.random_seed,
        }
    }

    fn check_samples(&self, available: usize) -> Result<(), TrainingError> {
        let required = self.config.min_training_samples;
        if available < required {
            return Err(TrainingError::InsufficientSamples {
                available,
                required,
            });
        }
        Ok(())
    }

    fn fit_regressor(
        &self,
        records: &[CanonicalRecord],
        features: &[FeatureVector],
        columns: &[crate::features::FeatureColumn],
        target: impl Fn(&CanonicalRecord) -> Option<f64>,
    ) -> Result<(RandomForest, usize), TrainingError> {
        let (x, y): (Vec<Vec<f64>>, Vec<f64>) = records
            .iter()
            .zip(features)
            .filter_map(|(r, fv)| target(r).map(|t| (fv.select(columns), t)))
            .unzip();
        self.check_samples(y.len())?;

        let forest = RandomForest::fit(TreeTask::Regression, &x, &y, self.forest_params())?;
        Ok((forest, y.len()))
    }

    fn fit_success(
        &self,
        records: &[CanonicalRecord],
        features: &[FeatureVector],
    ) -> Result<(RandomForest, usize), TrainingError> {
        self.check_samples(records.len())?;
        let x: Vec<Vec<f64>> = features.iter().map(|fv| fv.select(&SUCCESS_FEATURES)).collect();
        let y: Vec<f64> = records
            .iter()
            .map(|r| if r.is_success() { 1.0 } else { 0.0 })
            .collect();

        let forest = RandomForest::fit(TreeTask::Classification, &x, &y, self.forest_params())?;
        Ok((forest, y.len()))
    }

    fn fit_anomaly(
        &self,
        records: &[CanonicalRecord],
    ) -> Result<((IsolationForest, NumericScaling), usize), TrainingError> {
        let columns = NumericColumn::present_in(records);
        if columns.len() < self.config.min_anomaly_columns {
            return Err(TrainingError::InsufficientColumns {
                present: columns.len(),
                required: self.config.min_anomaly_columns,
            });
        }
        self.check_samples(records.len())?;

        let scaling = NumericScaling::fit(records, columns).ok_or(TrainingError::InvalidMatrix)?;
        let rows: Vec<Vec<f64>> = records.iter().map(|r| scaling.transform(r)).collect();
        let forest = IsolationForest::fit(
            &rows,
            IsolationParams {
                n_trees: self.config.n_estimators,
                contamination: self.config.contamination,
                seed: self.config.random_seed,
            },
        )?;
        Ok(((forest, scaling), rows.len()))
    }
}
