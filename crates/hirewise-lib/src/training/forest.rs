//! Bootstrap-aggregated CART trees
//!
//! Regression trees split on variance reduction and consider every feature;
//! classification trees split on Gini impurity over a random sqrt(features)
//! subset. Leaves hold the mean target, which for 0/1 labels is the
//! positive-class fraction.

use crate::error::TrainingError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Smallest impurity decrease worth a split
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeTask {
    Regression,
    Classification,
}

/// Ensemble hyper-parameters
#[derive(Debug, Clone, Copy)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// One fitted tree stored as a flat node arena; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    task: TreeTask,
    params: ForestParams,
    max_features: usize,
    nodes: Vec<Node>,
}

impl<'a> TreeBuilder<'a> {
    fn build(&mut self, idx: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let node_id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: mean_of(self.y, &idx),
        });

        let parent = impurity(self.task, self.y, &idx);
        if depth >= self.params.max_depth
            || idx.len() < self.params.min_samples_split.max(2)
            || parent <= MIN_GAIN
        {
            return node_id;
        }

        let Some(split) = self.best_split(&idx, rng) else {
            return node_id;
        };
        if parent - split.impurity <= MIN_GAIN {
            return node_id;
        }

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = idx
            .into_iter()
            .partition(|&i| self.x[i][split.feature] <= split.threshold);
        if left_idx.is_empty() || right_idx.is_empty() {
            return node_id;
        }

        let left = self.build(left_idx, depth + 1, rng);
        let right = self.build(right_idx, depth + 1, rng);
        self.nodes[node_id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_id
    }

    fn best_split(&self, idx: &[usize], rng: &mut StdRng) -> Option<SplitCandidate> {
        let n_features = self.x.first().map(Vec::len).unwrap_or(0);
        let features: Vec<usize> = if self.max_features >= n_features {
            (0..n_features).collect()
        } else {
            rand::seq::index::sample(rng, n_features, self.max_features).into_vec()
        };

        let n = idx.len();
        let total_sum: f64 = idx.iter().map(|&i| self.y[i]).sum();
        let total_sq: f64 = idx.iter().map(|&i| self.y[i] * self.y[i]).sum();

        let mut sorted = idx.to_vec();
        let mut best: Option<SplitCandidate> = None;

        for feature in features {
            sorted.sort_by(|a, b| self.x[*a][feature].total_cmp(&self.x[*b][feature]));

            let (mut left_sum, mut left_sq) = (0.0, 0.0);
            for k in 0..n - 1 {
                let yi = self.y[sorted[k]];
                left_sum += yi;
                left_sq += yi * yi;

                let here = self.x[sorted[k]][feature];
                let next = self.x[sorted[k + 1]][feature];
                if here == next {
                    continue;
                }

                let n_left = (k + 1) as f64;
                let n_right = (n - k - 1) as f64;
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;

                let score = match self.task {
                    TreeTask::Regression => {
                        (left_sq - left_sum * left_sum / n_left)
                            + (right_sq - right_sum * right_sum / n_right)
                    }
                    TreeTask::Classification => {
                        n_left * gini(left_sum / n_left) + n_right * gini(right_sum / n_right)
                    }
                };

                if best.map(|b| score < b.impurity).unwrap_or(true) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: here + (next - here) / 2.0,
                        impurity: score,
                    });
                }
            }
        }
        best
    }
}

impl DecisionTree {
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut node = 0;
        loop {
            match self.nodes.get(node) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = row.get(*feature).copied().unwrap_or(0.0);
                    node = if v <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Bagged ensemble of CART trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    task: TreeTask,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn fit(
        task: TreeTask,
        x: &[Vec<f64>],
        y: &[f64],
        params: ForestParams,
    ) -> Result<Self, TrainingError> {
        let n_features = x.first().map(Vec::len).unwrap_or(0);
        if x.is_empty() || x.len() != y.len() || n_features == 0 {
            return Err(TrainingError::InvalidMatrix);
        }
        if x.iter().any(|row| row.len() != n_features) {
            return Err(TrainingError::InvalidMatrix);
        }
        if x.iter().flatten().any(|v| !v.is_finite()) {
            return Err(TrainingError::NonFinite("feature matrix"));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(TrainingError::NonFinite("target"));
        }

        let max_features = match task {
            TreeTask::Regression => n_features,
            TreeTask::Classification => ((n_features as f64).sqrt() as usize).max(1),
        };

        let mut rng = StdRng::seed_from_u64(params.seed);
        let n = x.len();
        let trees = (0..params.n_estimators.max(1))
            .map(|_| {
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let mut builder = TreeBuilder {
                    x,
                    y,
                    task,
                    params,
                    max_features,
                    nodes: Vec::new(),
                };
                builder.build(bootstrap, 0, &mut rng);
                DecisionTree {
                    nodes: builder.nodes,
                }
            })
            .collect();

        Ok(Self {
            task,
            n_features,
            trees,
        })
    }

    /// Mean of tree outputs: a regression value, or a positive-class
    /// probability for classifiers
    pub fn predict(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / self.trees.len() as f64
    }

    pub fn task(&self) -> TreeTask {
        self.task
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

fn mean_of(y: &[f64], idx: &[usize]) -> f64 {
    if idx.is_empty() {
        return 0.0;
    }
    idx.iter().map(|&i| y[i]).sum::<f64>() / idx.len() as f64
}

fn gini(p: f64) -> f64 {
    1.0 - p * p - (1.0 - p) * (1.0 - p)
}

/// Node impurity in the same units `best_split` scores children in
fn impurity(task: TreeTask, y: &[f64], idx: &[usize]) -> f64 {
    let n = idx.len() as f64;
    if idx.is_empty() {
        return 0.0;
    }
    let sum: f64 = idx.iter().map(|&i| y[i]).sum();
    match task {
        TreeTask::Regression => {
            let sq: f64 = idx.iter().map(|&i| y[i] * y[i]).sum();
            (sq - sum * sum / n).max(0.0)
        }
        TreeTask::Classification => n * gini(sum / n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(seed: u64) -> ForestParams {
        ForestParams {
            n_estimators: 25,
            max_depth: 8,
            min_samples_split: 2,
            seed,
        }
    }

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y: Vec<f64> = (0..40).map(|i| if i < 20 { 10.0 } else { 50.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_regressor_learns_step_function() {
        let (x, y) = step_data();
        let forest = RandomForest::fit(TreeTask::Regression, &x, &y, params(42)).unwrap();
        assert!((forest.predict(&[2.0, 0.0]) - 10.0).abs() < 5.0);
        assert!((forest.predict(&[38.0, 1.0]) - 50.0).abs() < 5.0);
        assert_eq!(forest.n_trees(), 25);
    }

    #[test]
    fn test_classifier_outputs_probabilities() {
        let (x, y) = step_data();
        let labels: Vec<f64> = y.iter().map(|v| if *v > 20.0 { 1.0 } else { 0.0 }).collect();
        let forest = RandomForest::fit(TreeTask::Classification, &x, &labels, params(42)).unwrap();
        let low = forest.predict(&[1.0, 1.0]);
        let high = forest.predict(&[39.0, 0.0]);
        assert!((0.0..=1.0).contains(&low));
        assert!((0.0..=1.0).contains(&high));
        assert!(high > low);
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let (x, y) = step_data();
        let a = RandomForest::fit(TreeTask::Regression, &x, &y, params(7)).unwrap();
        let b = RandomForest::fit(TreeTask::Regression, &x, &y, params(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_constant_target_gives_single_leaf_trees() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let y = vec![3.0; 10];
        let forest = RandomForest::fit(TreeTask::Regression, &x, &y, params(1)).unwrap();
        assert_eq!(forest.predict(&[100.0]), 3.0);
        assert!(forest.trees.iter().all(|t| t.node_count() == 1));
    }

    #[test]
    fn test_rejects_invalid_input() {
        let err = RandomForest::fit(TreeTask::Regression, &[], &[], params(1)).unwrap_err();
        assert!(matches!(err, TrainingError::InvalidMatrix));

        let x = vec![vec![1.0], vec![f64::NAN]];
        let err = RandomForest::fit(TreeTask::Regression, &x, &[1.0, 2.0], params(1)).unwrap_err();
        assert!(matches!(err, TrainingError::NonFinite(_)));
    }

    #[test]
    fn test_serde_round_trip_preserves_predictions() {
        let (x, y) = step_data();
        let forest = RandomForest::fit(TreeTask::Regression, &x, &y, params(42)).unwrap();
        let json = serde_json::to_string(&forest).unwrap();
        let restored: RandomForest = serde_json::from_str(&json).unwrap();
        for row in &x {
            assert_eq!(forest.predict(row), restored.predict(row));
        }
    }
}
