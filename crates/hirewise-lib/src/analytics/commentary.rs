//! Threshold-based narrative over a KPI block

use super::aggregate::Kpis;
use crate::config::CommentaryThresholds;
use crate::models::SheetKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Good,
    Fair,
    Poor,
}

/// One line of dashboard commentary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub metric: String,
    pub tier: Tier,
    pub message: String,
}

pub fn time_to_fill_tier(days: f64, t: &CommentaryThresholds) -> Tier {
    if days <= t.ttf_excellent_days {
        Tier::Good
    } else if days <= t.ttf_benchmark_days {
        Tier::Fair
    } else {
        Tier::Poor
    }
}

pub fn conversion_tier(pct: f64, t: &CommentaryThresholds) -> Tier {
    if pct >= t.conversion_strong_pct {
        Tier::Good
    } else if pct >= t.conversion_fair_pct {
        Tier::Fair
    } else {
        Tier::Poor
    }
}

pub fn budget_tier(variance_pct: f64, t: &CommentaryThresholds) -> Tier {
    let v = variance_pct.abs();
    if v <= t.budget_on_target_pct {
        Tier::Good
    } else if v <= t.budget_moderate_pct {
        Tier::Fair
    } else {
        Tier::Poor
    }
}

pub fn position_age_tier(days: f64, t: &CommentaryThresholds) -> Tier {
    if days <= t.age_healthy_days {
        Tier::Good
    } else if days <= t.age_aging_days {
        Tier::Fair
    } else {
        Tier::Poor
    }
}

/// Build commentary for the metrics this sheet kind carries
pub fn commentary(kpis: &Kpis, kind: SheetKind, t: &CommentaryThresholds) -> Vec<Insight> {
    if kpis.record_count == 0 {
        return vec![Insight {
            metric: "records".to_string(),
            tier: Tier::Fair,
            message: "No records match the current filters.".to_string(),
        }];
    }

    let mut insights = Vec::new();

    if kpis.samples.time_to_fill > 0 {
        let days = kpis.mean_time_to_fill;
        let tier = time_to_fill_tier(days, t);
        let message = match tier {
            Tier::Good => format!("Average time-to-fill of {:.1} days shows excellent hiring speed.", days),
            Tier::Fair => format!(
                "Average time-to-fill of {:.1} days meets the {:.0}-day benchmark.",
                days, t.ttf_benchmark_days
            ),
            Tier::Poor => format!(
                "Average time-to-fill of {:.1} days exceeds the {:.0}-day benchmark.",
                days, t.ttf_benchmark_days
            ),
        };
        insights.push(Insight {
            metric: "time_to_fill".to_string(),
            tier,
            message,
        });
    }

    let conversion = kpis.mean_conversion_rate;
    let tier = conversion_tier(conversion, t);
    let quality = match tier {
        Tier::Good => "strong",
        Tier::Fair => "fair",
        Tier::Poor => "weak",
    };
    insights.push(Insight {
        metric: "conversion_rate".to_string(),
        tier,
        message: format!("CV-to-interview conversion of {:.1}% is {}.", conversion, quality),
    });

    if kpis.samples.budget_variance > 0 {
        let variance = kpis.mean_budget_variance;
        let tier = budget_tier(variance, t);
        let label = match tier {
            Tier::Good => "on target",
            Tier::Fair => "a moderate drift",
            Tier::Poor => "a significant drift",
        };
        insights.push(Insight {
            metric: "budget_variance".to_string(),
            tier,
            message: format!(
                "Accepted salaries average {:+.1}% against budget, {}.",
                variance, label
            ),
        });
    }

    if kind == SheetKind::Pipeline && kpis.samples.position_age > 0 {
        let age = kpis.mean_position_age;
        let tier = position_age_tier(age, t);
        let label = match tier {
            Tier::Good => "the pipeline is healthy",
            Tier::Fair => "the pipeline is aging",
            Tier::Poor => "the pipeline is stale",
        };
        insights.push(Insight {
            metric: "position_age".to_string(),
            tier,
            message: format!("Open positions average {:.0} days old; {}.", age, label),
        });
    }

    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::aggregate::KpiSamples;

    fn thresholds() -> CommentaryThresholds {
        CommentaryThresholds::default()
    }

    #[test]
    fn test_time_to_fill_tiers() {
        let t = thresholds();
        assert_eq!(time_to_fill_tier(30.0, &t), Tier::Good);
        assert_eq!(time_to_fill_tier(30.5, &t), Tier::Fair);
        assert_eq!(time_to_fill_tier(45.0, &t), Tier::Fair);
        assert_eq!(time_to_fill_tier(45.1, &t), Tier::Poor);
    }

    #[test]
    fn test_other_tiers() {
        let t = thresholds();
        assert_eq!(conversion_tier(25.0, &t), Tier::Good);
        assert_eq!(conversion_tier(15.0, &t), Tier::Fair);
        assert_eq!(conversion_tier(14.9, &t), Tier::Poor);
        assert_eq!(budget_tier(-5.0, &t), Tier::Good);
        assert_eq!(budget_tier(-12.0, &t), Tier::Fair);
        assert_eq!(budget_tier(16.0, &t), Tier::Poor);
        assert_eq!(position_age_tier(61.0, &t), Tier::Poor);
    }

    #[test]
    fn test_commentary_skips_metrics_without_samples() {
        let kpis = Kpis {
            record_count: 3,
            mean_conversion_rate: 30.0,
            ..Default::default()
        };
        let insights = commentary(&kpis, SheetKind::Hired, &thresholds());
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].metric, "conversion_rate");
        assert_eq!(insights[0].tier, Tier::Good);
    }

    #[test]
    fn test_pipeline_commentary_includes_age() {
        let kpis = Kpis {
            record_count: 2,
            mean_position_age: 50.0,
            samples: KpiSamples {
                position_age: 2,
                ..Default::default()
            },
            ..Default::default()
        };
        let insights = commentary(&kpis, SheetKind::Pipeline, &thresholds());
        let age = insights.iter().find(|i| i.metric == "position_age").unwrap();
        assert_eq!(age.tier, Tier::Fair);
        assert!(age.message.contains("aging"));
    }

    #[test]
    fn test_empty_selection() {
        let insights = commentary(&Kpis::default(), SheetKind::Hired, &thresholds());
        assert_eq!(insights.len(), 1);
        assert!(insights[0].message.starts_with("No records"));
    }
}
