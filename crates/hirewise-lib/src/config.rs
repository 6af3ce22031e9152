//! Engine configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding the record store and model bundle
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_bundle_file")]
    pub bundle_file: String,

    #[serde(default = "default_records_file")]
    pub records_file: String,

    #[serde(default)]
    pub training: TrainingConfig,

    #[serde(default)]
    pub commentary: CommentaryThresholds,

    /// Rows kept in the partner leaderboard
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_bundle_file() -> String {
    "models.json".to_string()
}

fn default_records_file() -> String {
    "records.json".to_string()
}

fn default_leaderboard_size() -> usize {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            bundle_file: default_bundle_file(),
            records_file: default_records_file(),
            training: TrainingConfig::default(),
            commentary: CommentaryThresholds::default(),
            leaderboard_size: default_leaderboard_size(),
        }
    }
}

impl EngineConfig {
    pub fn bundle_path(&self) -> PathBuf {
        self.data_dir.join(&self.bundle_file)
    }

    pub fn records_path(&self) -> PathBuf {
        self.data_dir.join(&self.records_file)
    }
}

/// Training policy shared by all four models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Labeled rows a model needs before it is fit
    #[serde(default = "default_min_training_samples")]
    pub min_training_samples: usize,

    /// Trees per ensemble
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,

    #[serde(default = "default_random_seed")]
    pub random_seed: u64,

    /// Expected share of anomalous records, sets the detector threshold
    #[serde(default = "default_contamination")]
    pub contamination: f64,

    /// Numeric columns the anomaly detector needs present
    #[serde(default = "default_min_anomaly_columns")]
    pub min_anomaly_columns: usize,
}

fn default_min_training_samples() -> usize {
    10
}

fn default_n_estimators() -> usize {
    100
}

fn default_max_depth() -> usize {
    12
}

fn default_min_samples_split() -> usize {
    2
}

fn default_random_seed() -> u64 {
    42
}

fn default_contamination() -> f64 {
    0.1
}

fn default_min_anomaly_columns() -> usize {
    2
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_training_samples: default_min_training_samples(),
            n_estimators: default_n_estimators(),
            max_depth: default_max_depth(),
            min_samples_split: default_min_samples_split(),
            random_seed: default_random_seed(),
            contamination: default_contamination(),
            min_anomaly_columns: default_min_anomaly_columns(),
        }
    }
}

/// Fixed tier boundaries for dashboard commentary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentaryThresholds {
    /// Mean time-to-fill (days) at or below which speed is excellent
    #[serde(default = "default_ttf_excellent")]
    pub ttf_excellent_days: f64,
    #[serde(default = "default_ttf_benchmark")]
    pub ttf_benchmark_days: f64,

    /// CV-to-interview conversion (%) at or above which conversion is strong
    #[serde(default = "default_conversion_strong")]
    pub conversion_strong_pct: f64,
    #[serde(default = "default_conversion_fair")]
    pub conversion_fair_pct: f64,

    /// Absolute budget variance (%) bands
    #[serde(default = "default_budget_on_target")]
    pub budget_on_target_pct: f64,
    #[serde(default = "default_budget_moderate")]
    pub budget_moderate_pct: f64,

    /// Mean open-position age (days) bands
    #[serde(default = "default_age_healthy")]
    pub age_healthy_days: f64,
    #[serde(default = "default_age_aging")]
    pub age_aging_days: f64,
}

fn default_ttf_excellent() -> f64 {
    30.0
}

fn default_ttf_benchmark() -> f64 {
    45.0
}

fn default_conversion_strong() -> f64 {
    25.0
}

fn default_conversion_fair() -> f64 {
    15.0
}

fn default_budget_on_target() -> f64 {
    5.0
}

fn default_budget_moderate() -> f64 {
    15.0
}

fn default_age_healthy() -> f64 {
    45.0
}

fn default_age_aging() -> f64 {
    60.0
}

impl Default for CommentaryThresholds {
    fn default() -> Self {
        Self {
            ttf_excellent_days: default_ttf_excellent(),
            ttf_benchmark_days: default_ttf_benchmark(),
            conversion_strong_pct: default_conversion_strong(),
            conversion_fair_pct: default_conversion_fair(),
            budget_on_target_pct: default_budget_on_target(),
            budget_moderate_pct: default_budget_moderate(),
            age_healthy_days: default_age_healthy(),
            age_aging_days: default_age_aging(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.training.min_training_samples, 10);
        assert_eq!(config.training.random_seed, 42);
        assert_eq!(config.leaderboard_size, 10);
        assert_eq!(config.bundle_path(), PathBuf::from("./data/models.json"));
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"training": {"n_estimators": 25}}"#).unwrap();
        assert_eq!(config.training.n_estimators, 25);
        assert_eq!(config.training.contamination, 0.1);
        assert_eq!(config.commentary.ttf_excellent_days, 30.0);
    }
}
