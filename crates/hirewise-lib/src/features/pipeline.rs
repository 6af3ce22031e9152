//! Feature assembly from canonical records
//!
//! The layout below is fixed for the lifetime of an encoder state; each
//! supervised model reads a fixed subset of it.

use super::encoder::{LabelEncoder, StandardScaler};
use crate::models::{CanonicalRecord, CategoricalField};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label-encoded categorical fields, in feature order
pub const ENCODED_FIELDS: [CategoricalField; 7] = [
    CategoricalField::HiringManager,
    CategoricalField::TaPartner,
    CategoricalField::SourcingPartner,
    CategoricalField::Country,
    CategoricalField::Project,
    CategoricalField::Role,
    CategoricalField::BusinessLine,
];

/// One column of the full feature layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureColumn {
    HiringManagerEncoded,
    TaPartnerEncoded,
    SourcingPartnerEncoded,
    CountryEncoded,
    ProjectEncoded,
    RoleEncoded,
    BusinessLineEncoded,
    CvsShared,
    MaxBudget,
    CreatedMonth,
    CreatedQuarter,
    CreatedYear,
    CreatedWeekday,
    CvsPerTa,
    CvsPerRole,
    TaHistoricalAvgTtf,
    TaHistoricalSuccessRate,
}

use FeatureColumn as F;

impl FeatureColumn {
    pub const ALL: [FeatureColumn; 17] = [
        F::HiringManagerEncoded,
        F::TaPartnerEncoded,
        F::SourcingPartnerEncoded,
        F::CountryEncoded,
        F::ProjectEncoded,
        F::RoleEncoded,
        F::BusinessLineEncoded,
        F::CvsShared,
        F::MaxBudget,
        F::CreatedMonth,
        F::CreatedQuarter,
        F::CreatedYear,
        F::CreatedWeekday,
        F::CvsPerTa,
        F::CvsPerRole,
        F::TaHistoricalAvgTtf,
        F::TaHistoricalSuccessRate,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            F::HiringManagerEncoded => "hiring_manager_encoded",
            F::TaPartnerEncoded => "ta_partner_encoded",
            F::SourcingPartnerEncoded => "sourcing_partner_encoded",
            F::CountryEncoded => "country_encoded",
            F::ProjectEncoded => "project_encoded",
            F::RoleEncoded => "role_encoded",
            F::BusinessLineEncoded => "business_line_encoded",
            F::CvsShared => "cvs_shared",
            F::MaxBudget => "max_budget",
            F::CreatedMonth => "pos_created_month",
            F::CreatedQuarter => "pos_created_quarter",
            F::CreatedYear => "pos_created_year",
            F::CreatedWeekday => "pos_created_weekday",
            F::CvsPerTa => "cvs_per_ta",
            F::CvsPerRole => "cvs_per_role",
            F::TaHistoricalAvgTtf => "ta_historical_avg_ttf",
            F::TaHistoricalSuccessRate => "ta_historical_success_rate",
        }
    }
}

const ENCODED_COLUMNS: [FeatureColumn; 7] = [
    F::HiringManagerEncoded,
    F::TaPartnerEncoded,
    F::SourcingPartnerEncoded,
    F::CountryEncoded,
    F::ProjectEncoded,
    F::RoleEncoded,
    F::BusinessLineEncoded,
];

pub const TIME_TO_FILL_FEATURES: [FeatureColumn; 13] = [
    ENCODED_COLUMNS[0],
    ENCODED_COLUMNS[1],
    ENCODED_COLUMNS[2],
    ENCODED_COLUMNS[3],
    ENCODED_COLUMNS[4],
    ENCODED_COLUMNS[5],
    ENCODED_COLUMNS[6],
    F::CvsShared,
    F::CreatedMonth,
    F::CreatedQuarter,
    F::CvsPerTa,
    F::CvsPerRole,
    F::TaHistoricalAvgTtf,
];

pub const BUDGET_VARIANCE_FEATURES: [FeatureColumn; 12] = [
    ENCODED_COLUMNS[0],
    ENCODED_COLUMNS[1],
    ENCODED_COLUMNS[2],
    ENCODED_COLUMNS[3],
    ENCODED_COLUMNS[4],
    ENCODED_COLUMNS[5],
    ENCODED_COLUMNS[6],
    F::MaxBudget,
    F::CvsShared,
    F::CreatedMonth,
    F::TaHistoricalAvgTtf,
    F::TaHistoricalSuccessRate,
];

pub const SUCCESS_FEATURES: [FeatureColumn; 12] = [
    ENCODED_COLUMNS[0],
    ENCODED_COLUMNS[1],
    ENCODED_COLUMNS[2],
    ENCODED_COLUMNS[3],
    ENCODED_COLUMNS[4],
    ENCODED_COLUMNS[5],
    ENCODED_COLUMNS[6],
    F::CvsShared,
    F::MaxBudget,
    F::CreatedMonth,
    F::CvsPerTa,
    F::TaHistoricalSuccessRate,
];

/// Full feature row for one record, in `FeatureColumn::ALL` order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: [f64; 17],
}

impl FeatureVector {
    pub fn get(&self, column: FeatureColumn) -> f64 {
        self.values[column.index()]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Project onto a model's feature subset
    pub fn select(&self, columns: &[FeatureColumn]) -> Vec<f64> {
        columns.iter().map(|c| self.get(*c)).collect()
    }
}

/// Per-key means frozen at training time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateTable {
    means: BTreeMap<String, f64>,
    /// Global mean over the training corpus, 0 when it had no values.
    /// Returned for keys the corpus never carried a value for.
    fallback: f64,
}

impl AggregateTable {
    pub fn fit<'a>(pairs: impl IntoIterator<Item = (&'a str, Option<f64>)>) -> Self {
        let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        let (mut total, mut count) = (0.0, 0usize);

        for (key, value) in pairs {
            let Some(value) = value.filter(|v| v.is_finite()) else {
                continue;
            };
            let entry = sums.entry(key.to_string()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
            total += value;
            count += 1;
        }

        Self {
            means: sums
                .into_iter()
                .map(|(key, (sum, n))| (key, sum / n as f64))
                .collect(),
            fallback: if count > 0 { total / count as f64 } else { 0.0 },
        }
    }

    pub fn lookup(&self, key: &str) -> f64 {
        self.means.get(key).copied().unwrap_or(self.fallback)
    }

    pub fn fallback(&self) -> f64 {
        self.fallback
    }

    pub fn len(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }
}

/// Historical per-partner and per-role aggregates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalAggregates {
    /// Mean CVs shared per TA partner
    pub cvs_per_ta: AggregateTable,
    /// Mean CVs shared per role
    pub cvs_per_role: AggregateTable,
    /// Mean time-to-fill per TA partner
    pub ta_avg_ttf: AggregateTable,
    /// Mean CV-to-interview rate per TA partner
    pub ta_success_rate: AggregateTable,
}

impl HistoricalAggregates {
    pub fn fit(records: &[CanonicalRecord]) -> Self {
        Self {
            cvs_per_ta: AggregateTable::fit(
                records.iter().map(|r| (r.ta_partner.as_str(), Some(r.cvs_shared))),
            ),
            cvs_per_role: AggregateTable::fit(
                records.iter().map(|r| (r.role.as_str(), Some(r.cvs_shared))),
            ),
            ta_avg_ttf: AggregateTable::fit(
                records
                    .iter()
                    .map(|r| (r.ta_partner.as_str(), r.time_to_fill.map(|d| d as f64))),
            ),
            ta_success_rate: AggregateTable::fit(
                records
                    .iter()
                    .map(|r| (r.ta_partner.as_str(), Some(r.cv_to_interview_rate))),
            ),
        }
    }
}

/// Numeric columns the anomaly detector can draw on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericColumn {
    TimeToFill,
    CvsShared,
    Interviews1st,
    MaxBudget,
    BudgetVariancePct,
}

impl NumericColumn {
    pub const ALL: [NumericColumn; 5] = [
        NumericColumn::TimeToFill,
        NumericColumn::CvsShared,
        NumericColumn::Interviews1st,
        NumericColumn::MaxBudget,
        NumericColumn::BudgetVariancePct,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NumericColumn::TimeToFill => "time_to_fill",
            NumericColumn::CvsShared => "cvs_shared",
            NumericColumn::Interviews1st => "interviews_1st",
            NumericColumn::MaxBudget => "max_budget",
            NumericColumn::BudgetVariancePct => "budget_variance_pct",
        }
    }

    /// Raw value; counts are never null so they report 0 as absent
    pub fn value(self, record: &CanonicalRecord) -> Option<f64> {
        match self {
            NumericColumn::TimeToFill => record.time_to_fill.map(|d| d as f64),
            NumericColumn::CvsShared => Some(record.cvs_shared).filter(|v| *v != 0.0),
            NumericColumn::Interviews1st => Some(record.interviews_1st).filter(|v| *v != 0.0),
            NumericColumn::MaxBudget => record.max_budget,
            NumericColumn::BudgetVariancePct => record.budget_variance_pct,
        }
    }

    /// Columns at least one record carries a value for
    pub fn present_in(records: &[CanonicalRecord]) -> Vec<NumericColumn> {
        Self::ALL
            .into_iter()
            .filter(|col| records.iter().any(|r| col.value(r).is_some()))
            .collect()
    }
}

/// Scaled numeric subset fed to the anomaly detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericScaling {
    pub columns: Vec<NumericColumn>,
    pub scaler: StandardScaler,
}

impl NumericScaling {
    pub fn fit(records: &[CanonicalRecord], columns: Vec<NumericColumn>) -> Option<Self> {
        let rows: Vec<Vec<f64>> = records.iter().map(|r| numeric_row(r, &columns)).collect();
        let scaler = StandardScaler::fit(&rows)?;
        Some(Self { columns, scaler })
    }

    pub fn transform(&self, record: &CanonicalRecord) -> Vec<f64> {
        self.scaler.transform(&numeric_row(record, &self.columns))
    }
}

fn numeric_row(record: &CanonicalRecord, columns: &[NumericColumn]) -> Vec<f64> {
    columns
        .iter()
        .map(|col| col.value(record).unwrap_or(0.0))
        .collect()
}

/// Everything needed to turn a record into features, frozen per training run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncoderState {
    pub encoders: BTreeMap<CategoricalField, LabelEncoder>,
    pub aggregates: HistoricalAggregates,
    /// Present only when the anomaly detector was trained
    #[serde(default)]
    pub numeric: Option<NumericScaling>,
}

impl EncoderState {
    /// Fit encoders and aggregates on a training corpus
    pub fn fit(records: &[CanonicalRecord]) -> Self {
        let encoders = ENCODED_FIELDS
            .iter()
            .map(|field| {
                let encoder = LabelEncoder::fit(records.iter().map(|r| field.value(r)));
                (*field, encoder)
            })
            .collect();

        Self {
            encoders,
            aggregates: HistoricalAggregates::fit(records),
            numeric: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.encoders.is_empty()
    }

    /// Encode one categorical value; missing encoders and unseen values give
    /// the "Unknown" bucket
    pub fn encode(&self, field: CategoricalField, value: &str) -> f64 {
        self.encoders
            .get(&field)
            .map(|e| e.transform(value) as f64)
            .unwrap_or(0.0)
    }

    pub fn transform(&self, record: &CanonicalRecord) -> FeatureVector {
        let mut values = [0.0; 17];

        for (field, column) in ENCODED_FIELDS.iter().zip(ENCODED_COLUMNS) {
            values[column.index()] = self.encode(*field, field.value(record));
        }

        values[F::CvsShared.index()] = record.cvs_shared;
        values[F::MaxBudget.index()] = record.max_budget.unwrap_or(0.0);

        if let Some(created) = record.pos_created {
            values[F::CreatedMonth.index()] = created.month() as f64;
            values[F::CreatedQuarter.index()] = ((created.month() - 1) / 3 + 1) as f64;
            values[F::CreatedYear.index()] = created.year() as f64;
            values[F::CreatedWeekday.index()] = created.weekday().num_days_from_monday() as f64;
        }

        let agg = &self.aggregates;
        values[F::CvsPerTa.index()] = agg.cvs_per_ta.lookup(&record.ta_partner);
        values[F::CvsPerRole.index()] = agg.cvs_per_role.lookup(&record.role);
        values[F::TaHistoricalAvgTtf.index()] = agg.ta_avg_ttf.lookup(&record.ta_partner);
        values[F::TaHistoricalSuccessRate.index()] = agg.ta_success_rate.lookup(&record.ta_partner);

        for v in values.iter_mut() {
            if !v.is_finite() {
                *v = 0.0;
            }
        }
        FeatureVector { values }
    }

    pub fn transform_all(&self, records: &[CanonicalRecord]) -> Vec<FeatureVector> {
        records.iter().map(|r| self.transform(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UNKNOWN;
    use chrono::NaiveDate;

    fn record(ta: &str, role: &str, cvs: f64, ttf: Option<i64>) -> CanonicalRecord {
        CanonicalRecord {
            ta_partner: ta.to_string(),
            role: role.to_string(),
            cvs_shared: cvs,
            time_to_fill: ttf,
            cv_to_interview_rate: cvs * 2.0,
            pos_created: NaiveDate::from_ymd_opt(2024, 5, 15),
            max_budget: Some(80_000.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_layout_indices_match_order() {
        for (i, column) in FeatureColumn::ALL.iter().enumerate() {
            assert_eq!(column.index(), i);
        }
    }

    #[test]
    fn test_temporal_features() {
        let state = EncoderState::fit(&[record("Alice", "Engineer", 10.0, Some(20))]);
        let fv = state.transform(&record("Alice", "Engineer", 10.0, Some(20)));
        assert_eq!(fv.get(F::CreatedMonth), 5.0);
        assert_eq!(fv.get(F::CreatedQuarter), 2.0);
        assert_eq!(fv.get(F::CreatedYear), 2024.0);
        // 2024-05-15 was a Wednesday
        assert_eq!(fv.get(F::CreatedWeekday), 2.0);
        assert_eq!(fv.get(F::MaxBudget), 80_000.0);
    }

    #[test]
    fn test_missing_date_and_budget_default_to_zero() {
        let state = EncoderState::fit(&[record("Alice", "Engineer", 10.0, Some(20))]);
        let fv = state.transform(&CanonicalRecord::default());
        assert_eq!(fv.get(F::CreatedMonth), 0.0);
        assert_eq!(fv.get(F::MaxBudget), 0.0);
    }

    #[test]
    fn test_aggregates_are_frozen_means() {
        let corpus = vec![
            record("Alice", "Engineer", 10.0, Some(20)),
            record("Alice", "Analyst", 20.0, Some(40)),
            record("Bob", "Engineer", 30.0, None),
        ];
        let state = EncoderState::fit(&corpus);

        let fv = state.transform(&record("Alice", "Engineer", 99.0, None));
        assert_eq!(fv.get(F::CvsPerTa), 15.0);
        assert_eq!(fv.get(F::CvsPerRole), 20.0);
        assert_eq!(fv.get(F::TaHistoricalAvgTtf), 30.0);

        // Bob never had a time-to-fill, so the global mean stands in
        let fv = state.transform(&record("Bob", "Engineer", 1.0, None));
        assert_eq!(fv.get(F::TaHistoricalAvgTtf), 30.0);
    }

    #[test]
    fn test_unseen_partner_uses_global_mean_and_unknown_bucket() {
        let corpus = vec![
            record("Alice", "Engineer", 10.0, Some(20)),
            record("Bob", "Engineer", 30.0, Some(40)),
        ];
        let state = EncoderState::fit(&corpus);
        let fv = state.transform(&record("Mallory", "Engineer", 5.0, None));

        assert_eq!(fv.get(F::CvsPerTa), 20.0);
        let unknown = state.encoders[&CategoricalField::TaPartner].transform(UNKNOWN) as f64;
        assert_eq!(fv.get(F::TaPartnerEncoded), unknown);
    }

    #[test]
    fn test_empty_corpus_falls_back_to_zero() {
        let state = EncoderState::fit(&[]);
        let fv = state.transform(&record("Alice", "Engineer", 10.0, Some(20)));
        assert_eq!(fv.get(F::TaHistoricalAvgTtf), 0.0);
        assert_eq!(fv.get(F::CvsPerTa), 0.0);
    }

    #[test]
    fn test_model_subsets_select_in_order() {
        let state = EncoderState::fit(&[record("Alice", "Engineer", 10.0, Some(20))]);
        let fv = state.transform(&record("Alice", "Engineer", 10.0, Some(20)));
        let row = fv.select(&TIME_TO_FILL_FEATURES);
        assert_eq!(row.len(), 13);
        assert_eq!(row[7], 10.0);
        assert_eq!(fv.select(&BUDGET_VARIANCE_FEATURES)[7], 80_000.0);
        assert_eq!(fv.select(&SUCCESS_FEATURES).len(), 12);
    }

    #[test]
    fn test_numeric_presence_ignores_zero_counts() {
        let mut a = CanonicalRecord::default();
        a.max_budget = Some(50_000.0);
        let b = CanonicalRecord::default();
        let present = NumericColumn::present_in(&[a, b]);
        assert_eq!(present, vec![NumericColumn::MaxBudget]);
    }
}
