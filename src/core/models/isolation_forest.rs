use crate::utils::error::{Result, SentinelError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForestParams {
    pub n_estimators: usize,
    pub max_samples: usize,
    /// Expected outlier share; `None` keeps the fixed -0.5 offset.
    pub contamination: Option<f64>,
    pub seed: u64,
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: None,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

/// 節點以陣列儲存，避免 JSON 反序列化時遞迴過深
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn build(samples: &[&[f64]], max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(samples.to_vec(), 0, max_depth, rng);
        tree
    }

    fn grow(&mut self, samples: Vec<&[f64]>, depth: usize, max_depth: usize, rng: &mut StdRng) -> usize {
        let index = self.nodes.len();
        self.nodes.push(Node::Leaf { size: samples.len() });

        if depth >= max_depth || samples.len() <= 1 {
            return index;
        }

        let Some((feature, threshold)) = pick_split(&samples, rng) else {
            return index;
        };

        let (left, right): (Vec<&[f64]>, Vec<&[f64]>) =
            samples.into_iter().partition(|s| s[feature] < threshold);

        let left = self.grow(left, depth + 1, max_depth, rng);
        let right = self.grow(right, depth + 1, max_depth, rng);
        self.nodes[index] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        index
    }

    fn path_length(&self, sample: &[f64]) -> f64 {
        let mut index = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[index] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if sample[*feature] < *threshold { *left } else { *right };
                    depth += 1.0;
                }
                Node::Leaf { size } => return depth + average_path_length(*size),
            }
        }
    }
}

/// 隨機挑選一個非常數特徵，門檻值在其範圍內均勻取樣
fn pick_split(samples: &[&[f64]], rng: &mut StdRng) -> Option<(usize, f64)> {
    let n_features = samples[0].len();
    let mut candidates: Vec<usize> = (0..n_features).collect();

    while !candidates.is_empty() {
        let pick = rng.gen_range(0..candidates.len());
        let feature = candidates.swap_remove(pick);

        let (min, max) = samples.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s[feature]), hi.max(s[feature]))
        });

        if max > min {
            let threshold = rng.gen_range(min..max);
            return Some((feature, threshold));
        }
    }

    None
}

/// Average path length of an unsuccessful BST search over `n` points.
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
    max_samples: usize,
    pub offset: f64,
}

impl IsolationForest {
    pub fn fit(samples: &[Vec<f64>], params: &IsolationForestParams) -> Result<Self> {
        if samples.is_empty() {
            return Err(SentinelError::ModelError {
                message: "Cannot fit an isolation forest on an empty dataset".to_string(),
            });
        }
        if params.n_estimators == 0 {
            return Err(SentinelError::ModelError {
                message: "n_estimators must be at least 1".to_string(),
            });
        }

        let mut rng = StdRng::seed_from_u64(params.seed);
        let max_samples = params.max_samples.clamp(1, samples.len());
        let max_depth = (max_samples.max(2) as f64).log2().ceil() as usize;

        let trees = (0..params.n_estimators)
            .map(|_| {
                let picked: Vec<&[f64]> =
                    rand::seq::index::sample(&mut rng, samples.len(), max_samples)
                        .into_iter()
                        .map(|i| samples[i].as_slice())
                        .collect();
                IsolationTree::build(&picked, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            max_samples,
            offset: -0.5,
        };

        if let Some(contamination) = params.contamination.filter(|c| *c > 0.0) {
            let mut scores: Vec<f64> = samples.iter().map(|s| forest.score_sample(s)).collect();
            forest.offset = percentile(&mut scores, contamination.min(0.5) * 100.0);
        }

        tracing::debug!(
            "Isolation forest fitted: {} trees, max_samples={}, offset={:.4}",
            forest.trees.len(),
            forest.max_samples,
            forest.offset
        );

        Ok(forest)
    }

    /// 原始異常分數，範圍 [-1, 0]，越低越異常
    pub fn score_sample(&self, sample: &[f64]) -> f64 {
        let mean_depth = self
            .trees
            .iter()
            .map(|tree| tree.path_length(sample))
            .sum::<f64>()
            / self.trees.len() as f64;

        let normaliser = average_path_length(self.max_samples).max(f64::EPSILON);
        -(2f64.powf(-mean_depth / normaliser))
    }

    /// Shifted score: negative values are outliers.
    pub fn decision_function(&self, sample: &[f64]) -> f64 {
        self.score_sample(sample) - self.offset
    }

    pub fn is_outlier(&self, sample: &[f64]) -> bool {
        self.decision_function(sample) < 0.0
    }
}

/// Linear-interpolation percentile, `q` in [0, 100].
fn percentile(values: &mut [f64], q: f64) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let rank = (q / 100.0) * (values.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    values[lower] + (values[upper] - values[lower]) * fraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn clustered(n: usize, seed: u64) -> Vec<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| vec![rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)])
            .collect()
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(256) ≈ 10.24
        assert!((average_path_length(256) - 10.244).abs() < 0.01);
    }

    #[test]
    fn test_percentile_interpolates() {
        let mut values = vec![4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(&mut values, 0.0), 1.0);
        assert_eq!(percentile(&mut values, 100.0), 4.0);
        assert!((percentile(&mut values, 50.0) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_outlier_scores_lower_than_inliers() {
        let data = clustered(500, 7);
        let forest = IsolationForest::fit(&data, &IsolationForestParams::default()).unwrap();

        let inlier = forest.decision_function(&[0.0, 0.0]);
        let outlier = forest.decision_function(&[8.0, -8.0]);
        assert!(outlier < inlier);
        assert!(forest.is_outlier(&[8.0, -8.0]));
    }

    #[test]
    fn test_contamination_sets_offset() {
        let data = clustered(400, 11);
        let params = IsolationForestParams {
            contamination: Some(0.1),
            ..IsolationForestParams::default()
        };
        let forest = IsolationForest::fit(&data, &params).unwrap();

        let flagged = data.iter().filter(|s| forest.is_outlier(s)).count();
        // 大約 10% 的訓練樣本會落在門檻之下
        assert!((20..=60).contains(&flagged), "flagged {}", flagged);
    }

    #[test]
    fn test_fit_is_deterministic_for_seed() {
        let data = clustered(200, 3);
        let a = IsolationForest::fit(&data, &IsolationForestParams::default()).unwrap();
        let b = IsolationForest::fit(&data, &IsolationForestParams::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.decision_function(&[0.3, 0.2]), b.decision_function(&[0.3, 0.2]));
    }

    #[test]
    fn test_serde_preserves_scores() {
        let data = clustered(100, 5);
        let forest = IsolationForest::fit(&data, &IsolationForestParams::default()).unwrap();
        let json = serde_json::to_string(&forest).unwrap();
        let restored: IsolationForest = serde_json::from_str(&json).unwrap();
        let before = forest.decision_function(&[0.5, -0.5]);
        let after = restored.decision_function(&[0.5, -0.5]);
        assert!((before - after).abs() < 1e-9);
    }

    #[test]
    fn test_constant_data_does_not_panic() {
        let data = vec![vec![1.0, 1.0]; 20];
        let forest = IsolationForest::fit(&data, &IsolationForestParams::default()).unwrap();
        assert!(forest.score_sample(&[1.0, 1.0]).is_finite());
    }
}
