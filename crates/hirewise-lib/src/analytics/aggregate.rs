//! Dashboard aggregation over a filtered record set

use super::commentary::{commentary, Insight};
use super::filter::FilterSpec;
use crate::config::CommentaryThresholds;
use crate::models::{CanonicalRecord, CategoricalField, SheetKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Non-null observations behind each mean
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiSamples {
    pub time_to_fill: usize,
    pub budget_variance: usize,
    pub position_age: usize,
}

/// Headline metrics; every mean is over non-null values and 0 when there are none
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub record_count: usize,
    pub mean_time_to_fill: f64,
    /// Mean CV-to-interview rate (%)
    pub mean_conversion_rate: f64,
    pub mean_budget_variance: f64,
    pub total_accepted: f64,
    pub mean_position_age: f64,
    pub samples: KpiSamples,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStage {
    pub stage: String,
    pub total: f64,
}

/// Raw stage sums in funnel order; never adjusted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Funnel {
    pub stages: Vec<FunnelStage>,
    /// True when no stage exceeds the one before it
    pub monotonic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub ta_partner: String,
    pub positions: usize,
    /// Positions with at least one accepted offer
    pub hires: usize,
    pub mean_time_to_fill: Option<f64>,
    pub mean_conversion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub field: CategoricalField,
    /// Descending by count; ties keep encounter order
    pub values: Vec<ValueCount>,
}

/// Everything one dashboard query returns; computed per request, never stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub kind: SheetKind,
    pub kpis: Kpis,
    pub funnel: Funnel,
    pub leaderboard: Vec<LeaderboardRow>,
    pub distributions: Vec<Distribution>,
    pub commentary: Vec<Insight>,
}

pub struct AggregationEngine {
    leaderboard_size: usize,
    thresholds: CommentaryThresholds,
}

impl AggregationEngine {
    pub fn new(leaderboard_size: usize, thresholds: CommentaryThresholds) -> Self {
        Self {
            leaderboard_size,
            thresholds,
        }
    }

    pub fn aggregate(
        &self,
        records: &[CanonicalRecord],
        kind: SheetKind,
        filter: &FilterSpec,
    ) -> AggregateResult {
        let selected = filter.apply(records);
        let kpis = kpis(&selected);
        let commentary = commentary(&kpis, kind, &self.thresholds);

        AggregateResult {
            kind,
            funnel: funnel(&selected),
            leaderboard: leaderboard(&selected, self.leaderboard_size),
            distributions: CategoricalField::ALL
                .iter()
                .map(|field| distribution(&selected, *field))
                .collect(),
            kpis,
            commentary,
        }
    }
}

/// Mean of the present values and how many there were
fn mean(values: impl Iterator<Item = f64>) -> (f64, usize) {
    let (sum, n) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        (0.0, 0)
    } else {
        (sum / n as f64, n)
    }
}

pub fn kpis(records: &[&CanonicalRecord]) -> Kpis {
    let (mean_time_to_fill, ttf_n) = mean(records.iter().filter_map(|r| r.time_to_fill.map(|d| d as f64)));
    let (mean_conversion_rate, _) = mean(records.iter().map(|r| r.cv_to_interview_rate));
    let (mean_budget_variance, budget_n) = mean(records.iter().filter_map(|r| r.budget_variance_pct));
    let (mean_position_age, age_n) = mean(records.iter().filter_map(|r| r.position_age.map(|d| d as f64)));

    Kpis {
        record_count: records.len(),
        mean_time_to_fill,
        mean_conversion_rate,
        mean_budget_variance,
        total_accepted: records.iter().map(|r| r.accepted).sum(),
        mean_position_age,
        samples: KpiSamples {
            time_to_fill: ttf_n,
            budget_variance: budget_n,
            position_age: age_n,
        },
    }
}

pub fn funnel(records: &[&CanonicalRecord]) -> Funnel {
    let sum = |f: fn(&CanonicalRecord) -> f64| records.iter().map(|r| f(r)).sum::<f64>();
    let stages = vec![
        FunnelStage {
            stage: "CVs Shared".to_string(),
            total: sum(|r| r.cvs_shared),
        },
        FunnelStage {
            stage: "Interviews".to_string(),
            total: sum(|r| r.interviews_1st),
        },
        FunnelStage {
            stage: "Offers".to_string(),
            total: sum(|r| r.offers),
        },
        FunnelStage {
            stage: "Accepted".to_string(),
            total: sum(|r| r.accepted),
        },
    ];
    let monotonic = stages.windows(2).all(|w| w[1].total <= w[0].total);
    Funnel { stages, monotonic }
}

/// Per-partner summary sorted by ascending mean time-to-fill
///
/// The sort is stable, so ties keep encounter order; partners with no
/// time-to-fill value sort last.
pub fn leaderboard(records: &[&CanonicalRecord], top_n: usize) -> Vec<LeaderboardRow> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&CanonicalRecord>> = HashMap::new();
    for &record in records {
        let key = record.ta_partner.as_str();
        groups
            .entry(key)
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(record);
    }

    let mut rows: Vec<LeaderboardRow> = order
        .into_iter()
        .map(|partner| {
            let group = &groups[partner];
            let (ttf, ttf_n) = mean(group.iter().filter_map(|r| r.time_to_fill.map(|d| d as f64)));
            let (conversion, _) = mean(group.iter().map(|r| r.cv_to_interview_rate));
            LeaderboardRow {
                ta_partner: partner.to_string(),
                positions: group.len(),
                hires: group.iter().filter(|r| r.is_success()).count(),
                mean_time_to_fill: (ttf_n > 0).then_some(ttf),
                mean_conversion_rate: conversion,
            }
        })
        .collect();

    rows.sort_by(|a, b| match (a.mean_time_to_fill, b.mean_time_to_fill) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    rows.truncate(top_n);
    rows
}

pub fn distribution(records: &[&CanonicalRecord], field: CategoricalField) -> Distribution {
    let mut values: Vec<ValueCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for &record in records {
        let value = field.value(record);
        match index.get(value) {
            Some(&i) => values[i].count += 1,
            None => {
                index.insert(value, values.len());
                values.push(ValueCount {
                    value: value.to_string(),
                    count: 1,
                });
            }
        }
    }
    values.sort_by(|a, b| b.count.cmp(&a.count));
    Distribution { field, values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::FilterSpec;

    fn hire(ta: &str, ttf: Option<i64>, budget: Option<f64>) -> CanonicalRecord {
        CanonicalRecord {
            ta_partner: ta.to_string(),
            time_to_fill: ttf,
            budget_variance_pct: budget,
            cvs_shared: 10.0,
            interviews_1st: 3.0,
            offers: 1.0,
            accepted: 1.0,
            cv_to_interview_rate: 30.0,
            ..Default::default()
        }
    }

    fn engine() -> AggregationEngine {
        AggregationEngine::new(10, CommentaryThresholds::default())
    }

    #[test]
    fn test_means_ignore_nulls() {
        let records = vec![
            hire("A", Some(20), Some(10.0)),
            hire("A", None, None),
            hire("B", Some(40), Some(-4.0)),
        ];
        let refs: Vec<&CanonicalRecord> = records.iter().collect();
        let k = kpis(&refs);
        assert_eq!(k.record_count, 3);
        assert_eq!(k.mean_time_to_fill, 30.0);
        assert_eq!(k.mean_budget_variance, 3.0);
        assert_eq!(k.samples.budget_variance, 2);
        assert_eq!(k.total_accepted, 3.0);
    }

    #[test]
    fn test_all_null_column_yields_zero() {
        let records = vec![hire("A", None, None)];
        let refs: Vec<&CanonicalRecord> = records.iter().collect();
        let k = kpis(&refs);
        assert_eq!(k.mean_time_to_fill, 0.0);
        assert_eq!(k.mean_budget_variance, 0.0);
        assert_eq!(kpis(&[]).mean_conversion_rate, 0.0);
    }

    #[test]
    fn test_funnel_reports_raw_sums() {
        let mut odd = hire("A", None, None);
        odd.offers = 50.0;
        let records = vec![hire("A", None, None), odd];
        let refs: Vec<&CanonicalRecord> = records.iter().collect();
        let f = funnel(&refs);
        assert_eq!(f.stages[0].total, 20.0);
        assert_eq!(f.stages[2].total, 51.0);
        assert!(!f.monotonic);

        let refs: Vec<&CanonicalRecord> = records[..1].iter().collect();
        assert!(funnel(&refs).monotonic);
    }

    #[test]
    fn test_leaderboard_order_and_ties() {
        let records = vec![
            hire("Slow", Some(60), None),
            hire("TieFirst", Some(25), None),
            hire("NoData", None, None),
            hire("Fast", Some(10), None),
            hire("TieSecond", Some(25), None),
        ];
        let refs: Vec<&CanonicalRecord> = records.iter().collect();
        let names: Vec<String> = leaderboard(&refs, 10)
            .into_iter()
            .map(|r| r.ta_partner)
            .collect();
        assert_eq!(names, ["Fast", "TieFirst", "TieSecond", "Slow", "NoData"]);
    }

    #[test]
    fn test_leaderboard_truncates_and_counts_hires() {
        let mut records: Vec<CanonicalRecord> = (0..12)
            .map(|i| hire(&format!("P{}", i), Some(i), None))
            .collect();
        records[0].accepted = 0.0;
        records.push(hire("P0", Some(0), None));
        let refs: Vec<&CanonicalRecord> = records.iter().collect();
        let rows = leaderboard(&refs, 10);
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0].ta_partner, "P0");
        assert_eq!(rows[0].positions, 2);
        assert_eq!(rows[0].hires, 1);
    }

    #[test]
    fn test_distribution_descending_with_stable_ties() {
        let records = vec![
            hire("B", None, None),
            hire("A", None, None),
            hire("A", None, None),
            hire("C", None, None),
        ];
        let refs: Vec<&CanonicalRecord> = records.iter().collect();
        let d = distribution(&refs, CategoricalField::TaPartner);
        let values: Vec<(&str, usize)> = d.values.iter().map(|v| (v.value.as_str(), v.count)).collect();
        assert_eq!(values, vec![("A", 2), ("B", 1), ("C", 1)]);
    }

    #[test]
    fn test_aggregate_applies_filter() {
        let records = vec![hire("A", Some(20), None), hire("B", Some(40), None)];
        let filter = FilterSpec::new().with(CategoricalField::TaPartner, ["B"]);
        let result = engine().aggregate(&records, SheetKind::Hired, &filter);
        assert_eq!(result.kpis.record_count, 1);
        assert_eq!(result.kpis.mean_time_to_fill, 40.0);
        assert_eq!(result.distributions.len(), CategoricalField::ALL.len());
        assert_eq!(result.leaderboard.len(), 1);
        assert!(!result.commentary.is_empty());
    }
}
