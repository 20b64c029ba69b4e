//! CART regression tree used as the ensemble base learner.

use ndarray::{Array2, ArrayView1};
use rand::seq::index::sample;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// Growth limits for a tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    /// Nodes with fewer rows are not split.
    pub min_node_size: usize,
    pub max_depth: Option<usize>,
    /// Candidate features sampled at each node.
    pub max_features: usize,
}

/// A fitted regression tree minimising squared error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    root: TreeNode,
}

struct Builder<'a> {
    x: &'a Array2<f64>,
    y: &'a [f64],
    params: TreeParams,
    importances: Vec<f64>,
}

impl RegressionTree {
    /// Grow a tree on the rows listed in `indices` (repeats allowed, as in a
    /// bootstrap sample). Returns the tree and its per-feature impurity decrease.
    pub fn grow(
        x: &Array2<f64>,
        y: &[f64],
        indices: Vec<usize>,
        params: TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> (Self, Vec<f64>) {
        let mut builder = Builder {
            x,
            y,
            params,
            importances: vec![0.0; x.ncols()],
        };
        let root = builder.build(indices, 0, rng);
        (Self { root }, builder.importances)
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        depth(&self.root)
    }
}

impl Builder<'_> {
    fn build(&mut self, indices: Vec<usize>, depth: usize, rng: &mut ChaCha8Rng) -> TreeNode {
        let n_samples = indices.len();
        let (sum, sq_sum) = indices.iter().fold((0.0, 0.0), |(s, q), &i| {
            let v = self.y[i];
            (s + v, q + v * v)
        });
        let value = if n_samples == 0 {
            0.0
        } else {
            sum / n_samples as f64
        };
        let leaf = TreeNode::Leaf { value, n_samples };

        if n_samples < self.params.min_node_size.max(2)
            || self.params.max_depth.is_some_and(|d| depth >= d)
        {
            return leaf;
        }
        let parent_sse = sq_sum - sum * sum / n_samples as f64;
        if parent_sse <= f64::EPSILON {
            return leaf;
        }

        let Some((feature_idx, threshold, gain)) = self.best_split(&indices, sum, parent_sse, rng)
        else {
            return leaf;
        };
        self.importances[feature_idx] += gain;

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[[i, feature_idx]] <= threshold);
        let left = Box::new(self.build(left_idx, depth + 1, rng));
        let right = Box::new(self.build(right_idx, depth + 1, rng));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
        }
    }

    /// Best (feature, threshold, SSE reduction) over a random feature subset.
    fn best_split(
        &self,
        indices: &[usize],
        total_sum: f64,
        parent_sse: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<(usize, f64, f64)> {
        let n_features = self.x.ncols();
        if n_features == 0 {
            return None;
        }
        let mtry = self.params.max_features.clamp(1, n_features);
        let n = indices.len();
        let mut best: Option<(usize, f64, f64)> = None;
        let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);

        for feature_idx in sample(rng, n_features, mtry).into_iter() {
            pairs.clear();
            pairs.extend(indices.iter().map(|&i| (self.x[[i, feature_idx]], self.y[i])));
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            // Sweep thresholds between distinct consecutive values.
            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            let total_sq: f64 = pairs.iter().map(|(_, y)| y * y).sum();
            for k in 0..n - 1 {
                let (xv, yv) = pairs[k];
                left_sum += yv;
                left_sq += yv * yv;
                if xv == pairs[k + 1].0 {
                    continue;
                }
                let left_n = (k + 1) as f64;
                let right_n = (n - k - 1) as f64;
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / left_n)
                    + (right_sq - right_sum * right_sum / right_n);
                let gain = parent_sse - sse;
                if gain > best.map_or(1e-12, |b| b.2) {
                    best = Some((feature_idx, (xv + pairs[k + 1].0) / 2.0, gain));
                }
            }
        }
        best
    }
}
