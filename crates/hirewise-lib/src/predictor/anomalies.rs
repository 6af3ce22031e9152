//! Batch anomaly detection over stored records

use super::service::Prediction;
use crate::features::NumericScaling;
use crate::models::CanonicalRecord;
use crate::training::TrainedModelSet;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One record the detector flagged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalousRecord {
    pub req_id: Option<String>,
    pub position_title: Option<String>,
    pub ta_partner: String,
    pub role: String,
    pub score: f64,
    /// The most extreme scaled column, e.g. "time_to_fill 3.1 std above typical"
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub total_records: usize,
    pub anomaly_count: usize,
    /// Percent of scored records flagged
    pub anomaly_rate: f64,
    /// Sorted by descending score
    pub anomalies: Vec<AnomalousRecord>,
}

/// Score every record and collect the anomalous ones
pub fn detect_anomalies(
    models: &TrainedModelSet,
    records: &[CanonicalRecord],
) -> Prediction<AnomalyReport> {
    let (Some(forest), Some(scaling)) = (&models.anomaly, &models.encoders.numeric) else {
        return Prediction::unavailable("anomaly model is not trained");
    };

    let mut anomalies: Vec<AnomalousRecord> = records
        .iter()
        .filter_map(|record| {
            let scaled = scaling.transform(record);
            let score = forest.score(&scaled);
            forest.is_anomaly(score).then(|| AnomalousRecord {
                req_id: record.req_id.clone(),
                position_title: record.position_title.clone(),
                ta_partner: record.ta_partner.clone(),
                role: record.role.clone(),
                score,
                reason: explain(scaling, &scaled),
            })
        })
        .collect();
    anomalies.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let total_records = records.len();
    let anomaly_count = anomalies.len();
    let anomaly_rate = if total_records > 0 {
        anomaly_count as f64 / total_records as f64 * 100.0
    } else {
        0.0
    };

    Prediction::Predicted {
        value: AnomalyReport {
            total_records,
            anomaly_count,
            anomaly_rate,
            anomalies,
        },
    }
}

fn explain(scaling: &NumericScaling, scaled: &[f64]) -> String {
    let extreme = scaling
        .columns
        .iter()
        .zip(scaled)
        .max_by(|a, b| a.1.abs().partial_cmp(&b.1.abs()).unwrap_or(Ordering::Equal));

    match extreme {
        Some((column, z)) => {
            let direction = if *z >= 0.0 { "above" } else { "below" };
            format!("{} {:.1} std {} typical", column.as_str(), z.abs(), direction)
        }
        None => "unusual combination of values".to_string(),
    }
}
