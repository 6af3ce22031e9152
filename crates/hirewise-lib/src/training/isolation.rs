//! Isolation forest anomaly scorer
//!
//! Anomalies isolate in fewer random splits than inliers. Scores follow
//! `2^(-E[h(x)] / c(n))`: near 1 for anomalies, well below 0.5 for inliers.

use crate::error::TrainingError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Subsample drawn for each tree
const MAX_SAMPLES: usize = 256;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, Copy)]
pub struct IsolationParams {
    pub n_trees: usize,
    /// Expected anomaly share; the score threshold sits at the `1 - contamination` quantile
    pub contamination: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
enum INode {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IsolationTree {
    nodes: Vec<INode>,
}

impl IsolationTree {
    fn grow(rows: &[Vec<f64>], idx: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow_node(rows, idx, 0, max_depth, rng);
        tree
    }

    fn grow_node(
        &mut self,
        rows: &[Vec<f64>],
        idx: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let node_id = self.nodes.len();
        self.nodes.push(INode::Leaf { size: idx.len() });
        if depth >= max_depth || idx.len() <= 1 {
            return node_id;
        }

        let width = rows[idx[0]].len();
        let splittable: Vec<(usize, f64, f64)> = (0..width)
            .filter_map(|f| {
                let (lo, hi) = idx.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                    (lo.min(rows[i][f]), hi.max(rows[i][f]))
                });
                (lo < hi).then_some((f, lo, hi))
            })
            .collect();
        if splittable.is_empty() {
            return node_id;
        }

        let (feature, lo, hi) = splittable[rng.gen_range(0..splittable.len())];
        let threshold = rng.gen_range(lo..hi);
        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
            idx.into_iter().partition(|&i| rows[i][feature] < threshold);
        if left_idx.is_empty() || right_idx.is_empty() {
            return node_id;
        }

        let left = self.grow_node(rows, left_idx, depth + 1, max_depth, rng);
        let right = self.grow_node(rows, right_idx, depth + 1, max_depth, rng);
        self.nodes[node_id] = INode::Split {
            feature,
            threshold,
            left,
            right,
        };
        node_id
    }

    fn path_length(&self, row: &[f64]) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes.get(node) {
                Some(INode::Leaf { size }) => return depth + average_path_length(*size),
                Some(INode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = row.get(*feature).copied().unwrap_or(0.0);
                    node = if v < *threshold { *left } else { *right };
                    depth += 1.0;
                }
                None => return depth,
            }
        }
    }
}

/// Average unsuccessful-search path length in a BST of `n` nodes
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
    n_features: usize,
    /// Scores strictly above this are anomalous
    threshold: f64,
}

impl IsolationForest {
    pub fn fit(rows: &[Vec<f64>], params: IsolationParams) -> Result<Self, TrainingError> {
        let n_features = rows.first().map(Vec::len).unwrap_or(0);
        if rows.is_empty() || n_features == 0 || rows.iter().any(|r| r.len() != n_features) {
            return Err(TrainingError::InvalidMatrix);
        }
        if rows.iter().flatten().any(|v| !v.is_finite()) {
            return Err(TrainingError::NonFinite("anomaly matrix"));
        }

        let sample_size = rows.len().min(MAX_SAMPLES);
        let max_depth = (sample_size as f64).log2().ceil().max(1.0) as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.n_trees.max(1))
            .map(|_| {
                let idx = rand::seq::index::sample(&mut rng, rows.len(), sample_size).into_vec();
                IsolationTree::grow(rows, idx, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            sample_size,
            n_features,
            threshold: f64::INFINITY,
        };

        let mut scores: Vec<f64> = rows.iter().map(|r| forest.score(r)).collect();
        scores.sort_by(|a, b| a.total_cmp(b));
        let contamination = params.contamination.clamp(0.0, 0.5);
        forest.threshold = quantile(&scores, 1.0 - contamination);
        Ok(forest)
    }

    /// Anomaly score in (0, 1]
    pub fn score(&self, row: &[f64]) -> f64 {
        let c = average_path_length(self.sample_size);
        if self.trees.is_empty() || c <= 0.0 {
            return 0.5;
        }
        let mean_path =
            self.trees.iter().map(|t| t.path_length(row)).sum::<f64>() / self.trees.len() as f64;
        2f64.powf(-mean_path / c)
    }

    pub fn is_anomaly(&self, score: f64) -> bool {
        score > self.threshold
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

/// Linear-interpolated quantile of sorted values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::INFINITY,
        1 => sorted[0],
        len => {
            let pos = q.clamp(0.0, 1.0) * (len - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> IsolationParams {
        IsolationParams {
            n_trees: 100,
            contamination: 0.1,
            seed: 42,
        }
    }

    fn cluster_with_outlier() -> Vec<Vec<f64>> {
        let mut rows: Vec<Vec<f64>> = (0..50)
            .map(|i| vec![(i % 5) as f64 * 0.1, (i % 7) as f64 * 0.1])
            .collect();
        rows.push(vec![25.0, -30.0]);
        rows
    }

    #[test]
    fn test_outlier_scores_highest() {
        let rows = cluster_with_outlier();
        let forest = IsolationForest::fit(&rows, params()).unwrap();
        let outlier = forest.score(&[25.0, -30.0]);
        let inlier = forest.score(&[0.2, 0.3]);
        assert!(outlier > inlier);
        assert!(forest.is_anomaly(outlier));
        assert!(!forest.is_anomaly(inlier));
    }

    #[test]
    fn test_scores_in_unit_interval() {
        let rows = cluster_with_outlier();
        let forest = IsolationForest::fit(&rows, params()).unwrap();
        for row in &rows {
            let s = forest.score(row);
            assert!(s > 0.0 && s <= 1.0, "score {}", s);
        }
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!((average_path_length(256) - 10.24).abs() < 0.01);
    }

    #[test]
    fn test_quantile() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile(&sorted, 0.5), 3.0);
        assert_eq!(quantile(&sorted, 1.0), 5.0);
        assert!((quantile(&sorted, 0.9) - 4.6).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_empty_input() {
        assert!(IsolationForest::fit(&[], params()).is_err());
    }
}
