use crate::utils::error::{Result, SentinelError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Reweight classes inversely to their frequency.
    pub balanced: bool,
    pub seed: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            balanced: true,
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
        distribution: Vec<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DecisionTree {
    nodes: Vec<Node>,
}

/// 建樹時共用的唯讀資料
struct TreeBuilder<'a> {
    features: &'a [Vec<f64>],
    labels: &'a [usize],
    weights: Vec<f64>,
    n_classes: usize,
    max_features: usize,
    params: &'a RandomForestParams,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl TreeBuilder<'_> {
    fn class_weights(&self, indices: &[usize]) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_classes];
        for &i in indices {
            totals[self.labels[i]] += self.weights[i];
        }
        totals
    }

    fn grow(&self, tree: &mut DecisionTree, indices: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let totals = self.class_weights(&indices);
        let index = tree.nodes.len();
        tree.nodes.push(Node::Leaf {
            distribution: normalise(&totals),
        });

        let pure = totals.iter().filter(|w| **w > 0.0).count() <= 1;
        let depth_reached = self.params.max_depth.is_some_and(|max| depth >= max);
        if pure || depth_reached || indices.len() < self.params.min_samples_split {
            return index;
        }

        let Some(split) = self.best_split(&indices, &totals, rng) else {
            return index;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.features[i][split.feature] <= split.threshold);

        let left = self.grow(tree, left, depth + 1, rng);
        let right = self.grow(tree, right, depth + 1, rng);
        tree.nodes[index] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        index
    }

    /// 依序檢查隨機排列的特徵，直到看過 max_features 個非常數特徵
    fn best_split(&self, indices: &[usize], totals: &[f64], rng: &mut StdRng) -> Option<SplitCandidate> {
        let n_features = self.features[indices[0]].len();
        let mut order: Vec<usize> = (0..n_features).collect();
        order.shuffle(rng);

        let parent_impurity = gini(totals);
        let mut best: Option<SplitCandidate> = None;
        let mut visited = 0;

        for feature in order {
            if visited >= self.max_features {
                break;
            }

            let mut sorted = indices.to_vec();
            sorted.sort_by(|&a, &b| self.features[a][feature].total_cmp(&self.features[b][feature]));

            let first = self.features[sorted[0]][feature];
            let last = self.features[sorted[sorted.len() - 1]][feature];
            if first == last {
                continue;
            }
            visited += 1;

            let total_weight: f64 = totals.iter().sum();
            let mut left = vec![0.0; self.n_classes];
            let mut right = totals.to_vec();

            for position in 0..sorted.len() - 1 {
                let i = sorted[position];
                left[self.labels[i]] += self.weights[i];
                right[self.labels[i]] -= self.weights[i];

                let current = self.features[i][feature];
                let next = self.features[sorted[position + 1]][feature];
                if current == next {
                    continue;
                }

                let n_left = position + 1;
                let n_right = sorted.len() - n_left;
                if n_left < self.params.min_samples_leaf || n_right < self.params.min_samples_leaf {
                    continue;
                }

                let w_left: f64 = left.iter().sum();
                let w_right = total_weight - w_left;
                let impurity =
                    (w_left * gini(&left) + w_right * gini(&right)) / total_weight;

                if impurity < parent_impurity
                    && best.as_ref().map_or(true, |b| impurity < b.impurity)
                {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: current + (next - current) / 2.0,
                        impurity,
                    });
                }
            }
        }

        best
    }
}

impl DecisionTree {
    fn predict(&self, sample: &[f64]) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if sample[*feature] <= *threshold { *left } else { *right };
                }
                Node::Leaf { distribution } => return distribution,
            }
        }
    }
}

fn gini(weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - weights.iter().map(|w| (w / total).powi(2)).sum::<f64>()
}

fn normalise(weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return vec![1.0 / weights.len() as f64; weights.len()];
    }
    weights.iter().map(|w| w / total).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    trees: Vec<DecisionTree>,
    pub n_classes: usize,
}

impl RandomForestClassifier {
    pub fn fit(features: &[Vec<f64>], labels: &[usize], params: &RandomForestParams) -> Result<Self> {
        if features.is_empty() || features.len() != labels.len() {
            return Err(SentinelError::ModelError {
                message: format!(
                    "Invalid training set: {} samples, {} labels",
                    features.len(),
                    labels.len()
                ),
            });
        }

        let n_classes = labels.iter().max().map_or(0, |m| m + 1).max(2);
        let n = features.len();
        let n_features = features[0].len();
        let max_features = ((n_features as f64).sqrt().floor() as usize).max(1);

        let mut class_counts = vec![0usize; n_classes];
        for &label in labels {
            class_counts[label] += 1;
        }
        let present = class_counts.iter().filter(|c| **c > 0).count().max(1);
        let class_weight: Vec<f64> = class_counts
            .iter()
            .map(|&count| {
                if params.balanced && count > 0 {
                    n as f64 / (present as f64 * count as f64)
                } else {
                    1.0
                }
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            // bootstrap：抽中次數即為樣本權重的倍數
            let mut draws = vec![0usize; n];
            for _ in 0..n {
                draws[rng.gen_range(0..n)] += 1;
            }

            let weights: Vec<f64> = draws
                .iter()
                .zip(labels)
                .map(|(&count, &label)| count as f64 * class_weight[label])
                .collect();
            let indices: Vec<usize> = (0..n).filter(|&i| draws[i] > 0).collect();

            let builder = TreeBuilder {
                features,
                labels,
                weights,
                n_classes,
                max_features,
                params,
            };
            let mut tree = DecisionTree { nodes: Vec::new() };
            builder.grow(&mut tree, indices, 0, &mut rng);
            trees.push(tree);
        }

        tracing::debug!(
            "Random forest fitted: {} trees, {} classes, class weights {:?}",
            trees.len(),
            n_classes,
            class_weight
        );

        Ok(Self { trees, n_classes })
    }

    /// 各棵樹葉節點分布的平均
    pub fn predict_proba(&self, sample: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (p, leaf) in proba.iter_mut().zip(tree.predict(sample)) {
                *p += leaf;
            }
        }
        let n_trees = self.trees.len().max(1) as f64;
        proba.iter_mut().for_each(|p| *p /= n_trees);
        proba
    }

    pub fn predict(&self, sample: &[f64]) -> usize {
        self.predict_proba(sample)
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map_or(0, |(class, _)| class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..60 {
            let depth = 10.0 + (i % 20) as f64;
            let magnitude = 5.0 + (i % 10) as f64 * 0.1;
            features.push(vec![depth, magnitude]);
            labels.push(0);
        }
        for i in 0..15 {
            let depth = 15.0 + (i % 10) as f64;
            let magnitude = 8.0 + (i % 5) as f64 * 0.2;
            features.push(vec![depth, magnitude]);
            labels.push(1);
        }
        (features, labels)
    }

    #[test]
    fn test_gini() {
        assert_eq!(gini(&[5.0, 0.0]), 0.0);
        assert!((gini(&[1.0, 1.0]) - 0.5).abs() < 1e-12);
        assert_eq!(gini(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_separates_large_shallow_events() {
        let (features, labels) = separable();
        let forest = RandomForestClassifier::fit(&features, &labels, &RandomForestParams::default()).unwrap();

        let tsunami = forest.predict_proba(&[20.0, 8.6]);
        let quiet = forest.predict_proba(&[20.0, 5.3]);

        assert!(tsunami[1] > 0.7, "p={:?}", tsunami);
        assert!(quiet[1] < 0.3, "p={:?}", quiet);
        assert_eq!(forest.predict(&[20.0, 8.6]), 1);
        assert!((tsunami.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_is_deterministic_for_seed() {
        let (features, labels) = separable();
        let params = RandomForestParams {
            n_estimators: 10,
            ..RandomForestParams::default()
        };
        let a = RandomForestClassifier::fit(&features, &labels, &params).unwrap();
        let b = RandomForestClassifier::fit(&features, &labels, &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_class_predicts_that_class() {
        let features = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let labels = vec![0, 0];
        let forest = RandomForestClassifier::fit(&features, &labels, &RandomForestParams::default()).unwrap();
        assert_eq!(forest.predict_proba(&[2.0, 3.0]), vec![1.0, 0.0]);
    }

    #[test]
    fn test_mismatched_labels_rejected() {
        let features = vec![vec![1.0, 2.0]];
        assert!(RandomForestClassifier::fit(&features, &[], &RandomForestParams::default()).is_err());
    }
}
