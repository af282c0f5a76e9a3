use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Hyperparameters for the notification forest. Defaults follow the
/// production training job: 200 trees, balanced class weights, fixed seed.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestConfig {
    pub trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            trees: 200,
            max_depth: None,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

/// Bagged ensemble of CART trees over the encoded feature vectors,
/// predicting the binary notify-now label by majority vote.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit the ensemble. Class imbalance is compensated with sample weights
    /// inversely proportional to label frequency, applied inside the Gini
    /// impurity so minority rows pull splits as hard as majority rows.
    pub fn fit(rows: &[Vec<f64>], labels: &[u8], config: &ForestConfig) -> Self {
        debug_assert_eq!(rows.len(), labels.len());
        let weights = balanced_weights(labels);
        let features = rows.first().map(Vec::len).unwrap_or(0);
        let subset = feature_subset_size(features);

        let trees = (0..config.trees)
            .map(|index| {
                let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(index as u64));
                let sample = bootstrap_indices(rows.len(), &mut rng);
                let grower = TreeGrower {
                    rows,
                    labels,
                    weights: &weights,
                    features,
                    subset,
                    config,
                };
                DecisionTree {
                    root: grower.grow(sample, 0, &mut rng),
                }
            })
            .collect();

        Self { trees }
    }

    pub fn predict(&self, row: &[f64]) -> u8 {
        let votes = self
            .trees
            .iter()
            .filter(|tree| tree.predict(row) == 1)
            .count();
        // Ties resolve to "do not notify".
        u8::from(votes * 2 > self.trees.len())
    }

    pub fn predict_batch(&self, rows: &[Vec<f64>]) -> Vec<u8> {
        rows.iter().map(|row| self.predict(row)).collect()
    }
}

#[derive(Debug, Clone)]
struct DecisionTree {
    root: Node,
}

impl DecisionTree {
    fn predict(&self, row: &[f64]) -> u8 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { label } => return *label,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        label: u8,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

struct TreeGrower<'a> {
    rows: &'a [Vec<f64>],
    labels: &'a [u8],
    weights: &'a [f64],
    features: usize,
    subset: usize,
    config: &'a ForestConfig,
}

impl TreeGrower<'_> {
    fn grow(&self, indices: Vec<usize>, depth: usize, rng: &mut StdRng) -> Node {
        let (weight_zero, weight_one) = self.class_weights(&indices);
        let majority = u8::from(weight_one > weight_zero);

        let depth_reached = self
            .config
            .max_depth
            .map(|limit| depth >= limit)
            .unwrap_or(false);
        if weight_zero == 0.0
            || weight_one == 0.0
            || depth_reached
            || indices.len() < self.config.min_samples_split
        {
            return Node::Leaf { label: majority };
        }

        let parent_impurity = gini(weight_zero, weight_one);
        let Some(split) = self.best_split(&indices, parent_impurity, rng) else {
            return Node::Leaf { label: majority };
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&index| self.rows[index][split.feature] <= split.threshold);

        Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.grow(left, depth + 1, rng)),
            right: Box::new(self.grow(right, depth + 1, rng)),
        }
    }

    fn class_weights(&self, indices: &[usize]) -> (f64, f64) {
        let mut zero = 0.0;
        let mut one = 0.0;
        for &index in indices {
            if self.labels[index] == 1 {
                one += self.weights[index];
            } else {
                zero += self.weights[index];
            }
        }
        (zero, one)
    }

    /// Scan a random sqrt-sized feature subset for the weighted-Gini-optimal
    /// threshold, returning None when nothing improves on the parent.
    fn best_split(
        &self,
        indices: &[usize],
        parent_impurity: f64,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let mut best: Option<SplitCandidate> = None;
        let mut best_impurity = parent_impurity - 1e-9;

        for feature in sample_features(self.features, self.subset, rng) {
            let mut column: Vec<(f64, u8, f64)> = indices
                .iter()
                .map(|&index| {
                    (
                        self.rows[index][feature],
                        self.labels[index],
                        self.weights[index],
                    )
                })
                .collect();
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let total: (f64, f64) = column.iter().fold((0.0, 0.0), |acc, entry| {
                if entry.1 == 1 {
                    (acc.0, acc.1 + entry.2)
                } else {
                    (acc.0 + entry.2, acc.1)
                }
            });

            let mut left = (0.0, 0.0);
            for pair in 0..column.len() - 1 {
                let entry = column[pair];
                if entry.1 == 1 {
                    left.1 += entry.2;
                } else {
                    left.0 += entry.2;
                }

                let next_value = column[pair + 1].0;
                if entry.0 == next_value {
                    continue;
                }

                let right = (total.0 - left.0, total.1 - left.1);
                let left_weight = left.0 + left.1;
                let right_weight = right.0 + right.1;
                let impurity = (left_weight * gini(left.0, left.1)
                    + right_weight * gini(right.0, right.1))
                    / (left_weight + right_weight);

                if impurity < best_impurity {
                    best_impurity = impurity;
                    best = Some(SplitCandidate {
                        feature,
                        threshold: (entry.0 + next_value) / 2.0,
                    });
                }
            }
        }

        best
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
}

fn gini(weight_zero: f64, weight_one: f64) -> f64 {
    let total = weight_zero + weight_one;
    if total == 0.0 {
        return 0.0;
    }
    let p_zero = weight_zero / total;
    let p_one = weight_one / total;
    1.0 - p_zero * p_zero - p_one * p_one
}

/// Balanced sample weights: total / (classes * class_count), so each class
/// contributes equal total mass regardless of its row count.
fn balanced_weights(labels: &[u8]) -> Vec<f64> {
    let ones = labels.iter().filter(|&&label| label == 1).count();
    let zeros = labels.len() - ones;
    let total = labels.len() as f64;

    labels
        .iter()
        .map(|&label| {
            let count = if label == 1 { ones } else { zeros };
            if count == 0 {
                0.0
            } else {
                total / (2.0 * count as f64)
            }
        })
        .collect()
}

fn bootstrap_indices(len: usize, rng: &mut StdRng) -> Vec<usize> {
    (0..len).map(|_| rng.gen_range(0..len)).collect()
}

fn feature_subset_size(features: usize) -> usize {
    ((features as f64).sqrt().floor() as usize).max(1)
}

fn sample_features(features: usize, subset: usize, rng: &mut StdRng) -> Vec<usize> {
    if subset >= features {
        return (0..features).collect();
    }
    rand::seq::index::sample(rng, features, subset).into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<u8>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for days in [-20, -5, 0, 3, 7, 14, 21, 28, 30] {
            rows.push(vec![1.0, 0.0, days as f64]);
            labels.push(1);
        }
        for days in [31, 45, 60, 90, 120, 200, 365] {
            rows.push(vec![0.0, 1.0, days as f64]);
            labels.push(0);
        }
        (rows, labels)
    }

    #[test]
    fn learns_a_separable_boundary() {
        let (rows, labels) = separable();
        let config = ForestConfig {
            trees: 25,
            ..ForestConfig::default()
        };
        let forest = RandomForest::fit(&rows, &labels, &config);

        assert_eq!(forest.predict(&[1.0, 0.0, 5.0]), 1);
        assert_eq!(forest.predict(&[0.0, 1.0, 250.0]), 0);
    }

    #[test]
    fn training_is_deterministic_for_a_fixed_seed() {
        let (rows, labels) = separable();
        let config = ForestConfig {
            trees: 15,
            ..ForestConfig::default()
        };
        let first = RandomForest::fit(&rows, &labels, &config);
        let second = RandomForest::fit(&rows, &labels, &config);

        for days in -30..120 {
            let row = vec![1.0, 0.0, days as f64];
            assert_eq!(first.predict(&row), second.predict(&row));
        }
    }

    #[test]
    fn balanced_weights_equalize_class_mass() {
        let labels = [1, 1, 1, 0];
        let weights = balanced_weights(&labels);
        let positive: f64 = weights[..3].iter().sum();
        assert!((positive - weights[3]).abs() < 1e-9);
    }

    #[test]
    fn single_class_input_yields_constant_predictions() {
        let rows = vec![vec![0.0, 1.0], vec![1.0, 2.0], vec![0.0, 3.0]];
        let labels = vec![1, 1, 1];
        let config = ForestConfig {
            trees: 5,
            ..ForestConfig::default()
        };
        let forest = RandomForest::fit(&rows, &labels, &config);
        assert_eq!(forest.predict(&[0.0, 100.0]), 1);
    }
}
