//! Single-position predictions
//!
//! Input fields go through the same normalize and derive steps as uploads,
//! then the frozen encoder state. Nothing here refits or fails: every
//! problem becomes an `Unavailable` result.

use crate::derived::derive_record;
use crate::features::{BUDGET_VARIANCE_FEATURES, SUCCESS_FEATURES, TIME_TO_FILL_FEATURES};
use crate::models::{CanonicalRecord, Cell, RawTable, SheetKind};
use crate::schema::normalize_table;
use crate::training::{ModelKind, TrainedModelSet};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field values for one position, keyed by any accepted header spelling
pub type PositionFields = BTreeMap<String, Cell>;

/// Outcome of one prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Prediction<T> {
    Predicted { value: T },
    Unavailable { reason: String },
}

impl<T> Prediction<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Prediction::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Prediction::Predicted { value } => Some(value),
            Prediction::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Prediction::Predicted { .. })
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            Prediction::Predicted { .. } => None,
            Prediction::Unavailable { reason } => Some(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyScore {
    pub score: f64,
    pub is_anomaly: bool,
}

/// Every model's view of one position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// Whole days, at least 1
    pub time_to_fill: Prediction<i64>,
    /// Percent over (positive) or under (negative) budget
    pub budget_variance_pct: Prediction<f64>,
    /// Probability in 0..=1 of at least one accepted offer
    pub success_probability: Prediction<f64>,
    pub anomaly: Prediction<AnomalyScore>,
}

impl Forecast {
    /// Models that could not answer, with their reasons
    pub fn unavailable(&self) -> Vec<(ModelKind, &str)> {
        [
            (ModelKind::TimeToFill, self.time_to_fill.unavailable_reason()),
            (ModelKind::BudgetVariance, self.budget_variance_pct.unavailable_reason()),
            (ModelKind::Success, self.success_probability.unavailable_reason()),
            (ModelKind::Anomaly, self.anomaly.unavailable_reason()),
        ]
        .into_iter()
        .filter_map(|(kind, reason)| reason.map(|r| (kind, r)))
        .collect()
    }
}

/// Read-only view over one trained model set
pub struct PredictionService<'a> {
    models: &'a TrainedModelSet,
    today: NaiveDate,
}

impl<'a> PredictionService<'a> {
    pub fn new(models: &'a TrainedModelSet) -> Self {
        Self::with_today(models, Utc::now().date_naive())
    }

    /// Pin "today" for position-age style derivations
    pub fn with_today(models: &'a TrainedModelSet, today: NaiveDate) -> Self {
        Self { models, today }
    }

    /// Normalize and derive one position's fields
    pub fn prepare(&self, fields: &PositionFields) -> Result<CanonicalRecord, String> {
        let mut table = RawTable::new(fields.keys().cloned().collect());
        table.push_row(fields.values().cloned().collect());

        let mut record = normalize_table(&table, SheetKind::Hired)
            .records
            .into_iter()
            .next()
            .ok_or_else(|| "no usable position fields".to_string())?;
        derive_record(&mut record, SheetKind::Hired, self.today);
        Ok(record)
    }

    pub fn predict_time_to_fill(&self, fields: &PositionFields) -> Prediction<i64> {
        match self.regress(fields, ModelKind::TimeToFill) {
            Prediction::Predicted { value } => Prediction::Predicted {
                value: (value.round() as i64).max(1),
            },
            Prediction::Unavailable { reason } => Prediction::Unavailable { reason },
        }
    }

    pub fn predict_budget_variance(&self, fields: &PositionFields) -> Prediction<f64> {
        self.regress(fields, ModelKind::BudgetVariance)
    }

    pub fn predict_success_probability(&self, fields: &PositionFields) -> Prediction<f64> {
        match self.regress(fields, ModelKind::Success) {
            Prediction::Predicted { value } => Prediction::Predicted {
                value: value.clamp(0.0, 1.0),
            },
            other => other,
        }
    }

    pub fn score_anomaly(&self, fields: &PositionFields) -> Prediction<AnomalyScore> {
        let (Some(forest), Some(scaling)) = (&self.models.anomaly, &self.models.encoders.numeric)
        else {
            return not_trained(ModelKind::Anomaly);
        };
        let record = match self.prepare(fields) {
            Ok(record) => record,
            Err(reason) => return Prediction::Unavailable { reason },
        };
        let score = forest.score(&scaling.transform(&record));
        if !score.is_finite() {
            return Prediction::unavailable("anomaly score is not finite");
        }
        Prediction::Predicted {
            value: AnomalyScore {
                score,
                is_anomaly: forest.is_anomaly(score),
            },
        }
    }

    pub fn forecast(&self, fields: &PositionFields) -> Forecast {
        Forecast {
            time_to_fill: self.predict_time_to_fill(fields),
            budget_variance_pct: self.predict_budget_variance(fields),
            success_probability: self.predict_success_probability(fields),
            anomaly: self.score_anomaly(fields),
        }
    }

    fn regress(&self, fields: &PositionFields, kind: ModelKind) -> Prediction<f64> {
        let (model, columns) = match kind {
            ModelKind::TimeToFill => (&self.models.time_to_fill, &TIME_TO_FILL_FEATURES[..]),
            ModelKind::BudgetVariance => {
                (&self.models.budget_variance, &BUDGET_VARIANCE_FEATURES[..])
            }
            ModelKind::Success => (&self.models.success, &SUCCESS_FEATURES[..]),
            ModelKind::Anomaly => return not_trained(kind),
        };
        let Some(model) = model else {
            return not_trained(kind);
        };

        let record = match self.prepare(fields) {
            Ok(record) => record,
            Err(reason) => return Prediction::Unavailable { reason },
        };
        let row = self.models.encoders.transform(&record).select(columns);
        if row.len() != model.n_features() {
            return Prediction::unavailable(format!(
                "{} model expects {} features, got {}",
                kind,
                model.n_features(),
                row.len()
            ));
        }

        let value = model.predict(&row);
        if value.is_finite() {
            Prediction::Predicted { value }
        } else {
            Prediction::unavailable(format!("{} model produced a non-finite value", kind))
        }
    }
}

fn not_trained<T>(kind: ModelKind) -> Prediction<T> {
    Prediction::unavailable(format!("{} model is not trained", kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use crate::models::UNKNOWN;
    use crate::training::Trainer;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 1).unwrap()
    }

    fn corpus() -> Vec<CanonicalRecord> {
        (0..20)
            .map(|i| {
                let mut r = CanonicalRecord {
                    ta_partner: ["Alice", "Bob"][i % 2].to_string(),
                    role: "Engineer".to_string(),
                    cvs_shared: 4.0 + i as f64,
                    interviews_1st: 2.0,
                    accepted: (i % 3 == 0) as u8 as f64,
                    offers: 1.0,
                    max_budget: Some(100_000.0),
                    accepted_salary: Some(95_000.0 + 1_000.0 * (i % 10) as f64),
                    pos_created: NaiveDate::from_ymd_opt(2024, 1 + (i % 6) as u32, 3),
                    filled_date: NaiveDate::from_ymd_opt(2024, 7, 1 + i as u32),
                    ..Default::default()
                };
                derive_record(&mut r, SheetKind::Hired, today());
                r
            })
            .collect()
    }

    fn trained() -> TrainedModelSet {
        let config = TrainingConfig {
            n_estimators: 15,
            ..Default::default()
        };
        Trainer::new(config).train(&corpus(), 1).bundle.unwrap()
    }

    fn fields(pairs: &[(&str, Cell)]) -> PositionFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_untrained_set_is_unavailable() {
        let models = TrainedModelSet::empty();
        let service = PredictionService::with_today(&models, today());
        let input = fields(&[("Role", Cell::text("Engineer"))]);

        let forecast = service.forecast(&input);
        assert!(!forecast.time_to_fill.is_available());
        assert!(!forecast.anomaly.is_available());
        assert_eq!(forecast.unavailable().len(), 4);
    }

    #[test]
    fn test_time_to_fill_is_at_least_one_day() {
        let models = trained();
        let service = PredictionService::with_today(&models, today());
        let input = fields(&[
            ("TA Partner", Cell::text("Alice")),
            ("Number of CVs Shared", Cell::Number(8.0)),
            ("Position Created Date", Cell::text("2024-03-03")),
        ]);
        let days = *service.predict_time_to_fill(&input).value().unwrap();
        assert!(days >= 1);
    }

    #[test]
    fn test_unseen_category_resolves_to_unknown_bucket() {
        let models = trained();
        let service = PredictionService::with_today(&models, today());

        let unseen = fields(&[("TA Partner", Cell::text("Nobody We Know"))]);
        let unknown = fields(&[("TA Partner", Cell::text(UNKNOWN))]);
        assert!(service.predict_time_to_fill(&unseen).is_available());
        assert_eq!(
            service.predict_time_to_fill(&unseen),
            service.predict_time_to_fill(&unknown)
        );
    }

    #[test]
    fn test_empty_fields_are_unavailable_not_a_fault() {
        let models = trained();
        let service = PredictionService::with_today(&models, today());
        let prediction = service.predict_budget_variance(&PositionFields::new());
        assert_eq!(
            prediction,
            Prediction::unavailable("no usable position fields")
        );
    }

    #[test]
    fn test_success_probability_in_unit_range() {
        let models = trained();
        let service = PredictionService::with_today(&models, today());
        let input = fields(&[("TA Partner", Cell::text("Bob"))]);
        let p = *service.predict_success_probability(&input).value().unwrap();
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn test_prediction_serializes_with_status_tag() {
        let p: Prediction<i64> = Prediction::Predicted { value: 12 };
        assert_eq!(
            serde_json::to_value(&p).unwrap(),
            serde_json::json!({"status": "predicted", "value": 12})
        );
    }
}
