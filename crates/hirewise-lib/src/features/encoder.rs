//! Fitted categorical and numeric encoders
//!
//! Both are fit once per training run and frozen into the encoder state;
//! prediction only ever calls `transform`.

use crate::models::UNKNOWN;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Stable label -> integer table for one categorical field
///
/// Classes are sorted, and "Unknown" is always one of them so unseen values
/// have a bucket to fall into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut classes: BTreeSet<String> = values
            .into_iter()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        classes.insert(UNKNOWN.to_string());
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn unknown_index(&self) -> usize {
        self.index_of(UNKNOWN).unwrap_or(0)
    }

    /// Encoded value; unseen labels resolve to the "Unknown" bucket
    pub fn transform(&self, value: &str) -> usize {
        self.index_of(value.trim())
            .unwrap_or_else(|| self.unknown_index())
    }

    pub fn contains(&self, value: &str) -> bool {
        self.index_of(value.trim()).is_some()
    }

    fn index_of(&self, value: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .ok()
    }
}

/// Per-column standardization with population statistics
///
/// A constant column scales by 1 so it maps to 0 instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    /// Fit on row-major data; returns None for an empty or ragged matrix
    pub fn fit(rows: &[Vec<f64>]) -> Option<Self> {
        let width = rows.first()?.len();
        if width == 0 || rows.iter().any(|r| r.len() != width) {
            return None;
        }
        let n = rows.len() as f64;

        let means: Vec<f64> = (0..width)
            .map(|c| rows.iter().map(|r| r[c]).sum::<f64>() / n)
            .collect();
        let stds = (0..width)
            .map(|c| {
                let var = rows.iter().map(|r| (r[c] - means[c]).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                if std > f64::EPSILON && std.is_finite() {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Some(Self { means, stds })
    }

    pub fn width(&self) -> usize {
        self.means.len()
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(x, (mean, std))| (x - mean) / std)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_encoder_is_sorted_and_contains_unknown() {
        let encoder = LabelEncoder::fit(["Zoe", "Alice", "Alice", " Bob "]);
        assert_eq!(encoder.classes(), &["Alice", "Bob", UNKNOWN, "Zoe"]);
        assert_eq!(encoder.transform("Alice"), 0);
        assert_eq!(encoder.transform("Bob"), 1);
        assert_eq!(encoder.transform("Zoe"), 3);
    }

    #[test]
    fn test_unseen_label_maps_to_unknown_bucket() {
        let encoder = LabelEncoder::fit(["Alice", "Bob"]);
        assert_eq!(encoder.transform("Mallory"), encoder.unknown_index());
        assert_eq!(encoder.transform(UNKNOWN), encoder.unknown_index());
        assert!(!encoder.contains("Mallory"));
    }

    #[test]
    fn test_empty_fit_has_only_unknown() {
        let encoder = LabelEncoder::fit(std::iter::empty());
        assert_eq!(encoder.classes(), &[UNKNOWN]);
        assert_eq!(encoder.transform("anything"), 0);
    }

    #[test]
    fn test_scaler_population_std() {
        let rows = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();
        assert_eq!(scaler.transform(&[1.0, 5.0]), vec![-1.0, 0.0]);
        assert_eq!(scaler.transform(&[3.0, 7.0]), vec![1.0, 2.0]);
    }

    #[test]
    fn test_scaler_rejects_ragged_input() {
        assert!(StandardScaler::fit(&[]).is_none());
        assert!(StandardScaler::fit(&[vec![1.0], vec![1.0, 2.0]]).is_none());
    }
}
