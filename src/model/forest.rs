//! Isolation forest outlier estimator with the usual score conventions:
//! `score_samples` in (−1, 0) where lower means more anomalous,
//! `decision_function = score_samples − offset` with the offset set to the
//! contamination quantile of the training scores, and `predict` flagging an
//! outlier when the decision value is negative. Fits are deterministic for a
//! given seed. The rest of the crate treats this as a black box behind
//! fit/score/decision/predict.

use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Subsample size per tree (ψ in the isolation forest literature).
const MAX_SAMPLES: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    Leaf {
        size: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<TreeNode>,
    /// ψ actually used for this fit
    subsample: usize,
    contamination: f64,
    offset: f64,
    n_features: usize,
}

impl IsolationForest {
    /// Fit on a standardized training matrix. `contamination` fixes the
    /// decision offset at that quantile of the training scores.
    pub fn fit(x: ArrayView2<'_, f64>, contamination: f64, n_estimators: usize, seed: u64) -> Self {
        let n = x.nrows();
        let subsample = n.min(MAX_SAMPLES).max(1);
        let max_depth = (subsample as f64).log2().ceil().max(1.0) as usize;
        let mut rng = StdRng::seed_from_u64(seed);

        let mut trees = Vec::with_capacity(n_estimators);
        for _ in 0..n_estimators {
            let indices = sample_without_replacement(&mut rng, n, subsample);
            trees.push(build_tree(&mut rng, &x, &indices, 0, max_depth));
        }

        let mut forest = Self {
            trees,
            subsample,
            contamination,
            offset: 0.0,
            n_features: x.ncols(),
        };

        // Offset at the contamination quantile of the training scores, so
        // roughly that fraction of the training set lands below zero.
        let mut scores: Vec<f64> = (0..n)
            .map(|i| forest.score_row(x.row(i).as_slice().unwrap_or(&[])))
            .collect();
        scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        forest.offset = percentile(&scores, contamination);
        forest
    }

    /// Anomaly score for one standardized session vector; higher = more
    /// normal, bounded in (−1, 0).
    pub fn score_row(&self, row: &[f64]) -> f64 {
        let avg_path: f64 = self
            .trees
            .iter()
            .map(|t| path_length(t, row, 0))
            .sum::<f64>()
            / self.trees.len() as f64;
        let norm = average_path_length(self.subsample);
        if norm <= 0.0 {
            return -1.0;
        }
        -(2f64.powf(-avg_path / norm))
    }

    /// Signed distance from the decision boundary; negative = outlier.
    pub fn decision_row(&self, row: &[f64]) -> f64 {
        self.score_row(row) - self.offset
    }

    /// True when the vector is flagged as an outlier.
    pub fn predict_outlier(&self, row: &[f64]) -> bool {
        self.decision_row(row) < 0.0
    }

    /// Fraction of rows flagged as outliers.
    pub fn outlier_rate(&self, x: ArrayView2<'_, f64>) -> f64 {
        if x.nrows() == 0 {
            return 0.0;
        }
        let outliers = (0..x.nrows())
            .filter(|&i| self.predict_outlier(x.row(i).as_slice().unwrap_or(&[])))
            .count();
        outliers as f64 / x.nrows() as f64
    }
}

fn sample_without_replacement(rng: &mut StdRng, n: usize, k: usize) -> Vec<usize> {
    if k >= n {
        return (0..n).collect();
    }
    // Partial Fisher-Yates over an index vector
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.gen_range(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}

fn build_tree(
    rng: &mut StdRng,
    x: &ArrayView2<'_, f64>,
    indices: &[usize],
    depth: usize,
    max_depth: usize,
) -> TreeNode {
    if indices.len() <= 1 || depth >= max_depth {
        return TreeNode::Leaf {
            size: indices.len(),
        };
    }

    // Pick a feature with spread among the candidate rows; give up into a
    // leaf when every column is constant.
    let n_features = x.ncols();
    let start = rng.gen_range(0..n_features);
    let mut chosen = None;
    for k in 0..n_features {
        let feature = (start + k) % n_features;
        let (min, max) = column_bounds(x, indices, feature);
        if max > min {
            chosen = Some((feature, min, max));
            break;
        }
    }
    let Some((feature, min, max)) = chosen else {
        return TreeNode::Leaf {
            size: indices.len(),
        };
    };

    let threshold = rng.gen_range(min..max);
    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|&i| x[(i, feature)] < threshold);

    TreeNode::Split {
        feature,
        threshold,
        left: Box::new(build_tree(rng, x, &left, depth + 1, max_depth)),
        right: Box::new(build_tree(rng, x, &right, depth + 1, max_depth)),
    }
}

fn column_bounds(x: &ArrayView2<'_, f64>, indices: &[usize], feature: usize) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &i in indices {
        let v = x[(i, feature)];
        min = min.min(v);
        max = max.max(v);
    }
    (min, max)
}

fn path_length(node: &TreeNode, row: &[f64], depth: usize) -> f64 {
    match node {
        TreeNode::Leaf { size } => depth as f64 + average_path_length(*size),
        TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            let value = row.get(*feature).copied().unwrap_or(0.0);
            if value < *threshold {
                path_length(left, row, depth + 1)
            } else {
                path_length(right, row, depth + 1)
            }
        }
    }
}

/// Expected path length of an unsuccessful BST search over n points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolation percentile over ascending scores, q in [0, 1].
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = idx - lo as f64;
        sorted[lo] + frac * (sorted[hi] - sorted[lo])
    }
}
