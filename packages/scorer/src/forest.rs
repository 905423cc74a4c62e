//! Isolation forest.
//!
//! Each tree is grown on a random sub-sample by repeatedly picking a random
//! feature and a random split value between that feature's minimum and
//! maximum. Anomalies are isolated in fewer splits, so their average path
//! length across the ensemble is short.
//!
//! Scores follow the usual convention: `score_samples` is the negated
//! anomaly score `-2^(-E[h(x)] / c(n))` (lower is more abnormal), and the
//! decision function subtracts the `contamination` quantile of the training
//! scores, so negative decisions are outliers.
//!
//! Trees are built in parallel. Every tree draws from its own RNG seeded by
//! a master RNG, so the result is identical regardless of thread count.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tile_anomaly_io::progress::ProgressCallback;

use crate::ScoreError;
use crate::features::FeatureMatrix;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Ensemble parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub seed: u64,
}

/// Average path length of an unsuccessful search in a binary search tree of
/// `n` nodes; normalizes path lengths and accounts for unsplit leaves.
#[must_use]
#[allow(clippy::cast_precision_loss)]
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

#[derive(Debug, Clone, Copy)]
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

#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn build(x: &FeatureMatrix, sample: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(x, sample, 0, max_depth, rng);
        tree
    }

    fn grow(
        &mut self,
        x: &FeatureMatrix,
        indices: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            size: indices.len(),
        });

        if indices.len() <= 1 || depth >= max_depth {
            return id;
        }

        // Only features that still vary within this node can split it.
        let candidates: Vec<(usize, f64, f64)> = (0..x.n_cols())
            .filter_map(|feature| {
                let (min, max) = indices.iter().fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(min, max), &i| {
                        let v = x.get(i, feature);
                        (min.min(v), max.max(v))
                    },
                );
                (max > min).then_some((feature, min, max))
            })
            .collect();

        if candidates.is_empty() {
            return id;
        }

        let (feature, min, max) = candidates[rng.random_range(0..candidates.len())];
        let threshold = rng.random_range(min..max);

        // threshold is in [min, max), so both sides are non-empty.
        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| x.get(i, feature) <= threshold);

        let left = self.grow(x, left, depth + 1, max_depth, rng);
        let right = self.grow(x, right, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };

        id
    }

    #[allow(clippy::cast_precision_loss)]
    fn path_length(&self, row: &[f64]) -> f64 {
        let mut node = 0;
        let mut depth = 0usize;
        loop {
            match self.nodes[node] {
                Node::Leaf { size } => return depth as f64 + average_path_length(size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[feature] <= threshold { left } else { right };
                    depth += 1;
                }
            }
        }
    }
}

/// A fitted isolation forest.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
    offset: f64,
}

impl IsolationForest {
    /// Grows the ensemble on `x` and calibrates the decision offset so that
    /// roughly `contamination` of the training rows fall below zero.
    ///
    /// Reports one progress unit per finished tree.
    ///
    /// # Errors
    ///
    /// Returns [`ScoreError::EmptyBatch`] if `x` has no rows and
    /// [`ScoreError::InvalidParameter`] for a zero-sized ensemble or a
    /// contamination outside `(0, 0.5]`.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn fit(
        x: &FeatureMatrix,
        params: &ForestParams,
        progress: &Arc<dyn ProgressCallback>,
    ) -> Result<Self, ScoreError> {
        let n = x.n_rows();
        if n == 0 {
            return Err(ScoreError::EmptyBatch);
        }
        if params.n_estimators == 0 {
            return Err(ScoreError::InvalidParameter {
                name: "n_estimators",
                message: "must be at least 1".to_string(),
            });
        }
        if params.max_samples == 0 {
            return Err(ScoreError::InvalidParameter {
                name: "max_samples",
                message: "must be at least 1".to_string(),
            });
        }
        if !(params.contamination > 0.0 && params.contamination <= 0.5) {
            return Err(ScoreError::InvalidParameter {
                name: "contamination",
                message: format!("{} is outside (0, 0.5]", params.contamination),
            });
        }

        let sample_size = params.max_samples.min(n);
        let max_depth = (sample_size.max(2) as f64).log2().ceil() as usize;

        let mut master = StdRng::seed_from_u64(params.seed);
        let seeds: Vec<u64> = (0..params.n_estimators).map(|_| master.random()).collect();

        log::info!(
            "Growing {} trees on {sample_size} of {n} rows (max depth {max_depth})",
            params.n_estimators
        );

        let trees = seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let sample = rand::seq::index::sample(&mut rng, n, sample_size).into_vec();
                let tree = IsolationTree::build(x, sample, max_depth, &mut rng);
                progress.inc(1);
                tree
            })
            .collect();

        let mut forest = Self {
            trees,
            sample_size,
            offset: 0.0,
        };

        let training_scores = forest.score_samples(x);
        forest.offset = tile_anomaly_stats::quantile(&training_scores, params.contamination)
            .unwrap_or(-0.5);

        progress.finish(format!("Grew {} trees", forest.trees.len()));
        Ok(forest)
    }

    /// Negated anomaly score per row, in `[-1, 0)`. Lower is more abnormal.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn score_samples(&self, x: &FeatureMatrix) -> Vec<f64> {
        let normalizer = average_path_length(self.sample_size);
        let n_trees = self.trees.len() as f64;

        (0..x.n_rows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                let mean_depth =
                    self.trees.iter().map(|t| t.path_length(row)).sum::<f64>() / n_trees;
                // A single-row sample never splits; treat every row as average.
                let ratio = if normalizer > 0.0 {
                    mean_depth / normalizer
                } else {
                    1.0
                };
                -(2f64.powf(-ratio))
            })
            .collect()
    }

    /// `score_samples` shifted by the contamination offset. Negative values
    /// are outliers.
    #[must_use]
    pub fn decision_function(&self, x: &FeatureMatrix) -> Vec<f64> {
        self.score_samples(x)
            .into_iter()
            .map(|s| s - self.offset)
            .collect()
    }

    /// `true` for rows whose decision value is negative.
    #[must_use]
    pub fn predict(&self, x: &FeatureMatrix) -> Vec<bool> {
        self.decision_function(x)
            .into_iter()
            .map(|d| d < 0.0)
            .collect()
    }

    #[must_use]
    pub const fn offset(&self) -> f64 {
        self.offset
    }

    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use tile_anomaly_io::progress::null_progress;

    use super::*;

    fn params(contamination: f64, seed: u64) -> ForestParams {
        ForestParams {
            n_estimators: 100,
            max_samples: 256,
            contamination,
            seed,
        }
    }

    fn uniform_cloud(n: usize, seed: u64) -> FeatureMatrix {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut x = FeatureMatrix::new(5);
        for _ in 0..n {
            let row: Vec<f64> = (0..5).map(|_| rng.random_range(0.0..1.0)).collect();
            x.push_row(&row);
        }
        x
    }

    #[test]
    fn average_path_length_matches_known_values() {
        assert!(average_path_length(0).abs() < f64::EPSILON);
        assert!(average_path_length(1).abs() < f64::EPSILON);
        assert!((average_path_length(2) - 1.0).abs() < f64::EPSILON);
        // 2 * (ln 255 + gamma) - 2 * 255 / 256
        assert!((average_path_length(256) - 10.244_770_920_119_917).abs() < 1e-9);
    }

    #[test]
    fn isolated_point_scores_lowest() {
        let mut x = uniform_cloud(300, 1);
        x.push_row(&[25.0, -25.0, 25.0, 25.0, 25.0]);

        let forest = IsolationForest::fit(&x, &params(0.02, 42), &null_progress()).unwrap();
        let scores = forest.score_samples(&x);

        let (lowest, _) = scores
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert_eq!(lowest, 300);
        assert!(forest.predict(&x)[300]);
        assert!(scores.iter().all(|s| (-1.0..0.0).contains(s)));
    }

    #[test]
    fn flagged_fraction_tracks_contamination() {
        let x = uniform_cloud(1_000, 7);
        for contamination in [0.02, 0.05, 0.1] {
            let forest =
                IsolationForest::fit(&x, &params(contamination, 42), &null_progress()).unwrap();
            let flagged = forest.predict(&x).into_iter().filter(|&f| f).count();
            #[allow(clippy::cast_precision_loss)]
            let fraction = flagged as f64 / 1_000.0;
            assert!(
                (fraction - contamination).abs() <= 0.02,
                "flagged {fraction} for contamination {contamination}"
            );
        }
    }

    #[test]
    fn same_seed_same_scores() {
        let x = uniform_cloud(400, 3);
        let a = IsolationForest::fit(&x, &params(0.05, 9), &null_progress()).unwrap();
        let b = IsolationForest::fit(&x, &params(0.05, 9), &null_progress()).unwrap();
        assert_eq!(a.decision_function(&x), b.decision_function(&x));

        let c = IsolationForest::fit(&x, &params(0.05, 10), &null_progress()).unwrap();
        assert_ne!(a.score_samples(&x), c.score_samples(&x));
    }

    #[test]
    fn tiny_batches_are_scored() {
        let single = FeatureMatrix::from_rows(5, &[[1.0, 2.0, 3.0, 4.0, 5.0]]);
        let forest = IsolationForest::fit(&single, &params(0.1, 1), &null_progress()).unwrap();
        assert_eq!(forest.score_samples(&single), vec![-0.5]);

        let identical = FeatureMatrix::from_rows(5, &[[1.0; 5], [1.0; 5], [1.0; 5]]);
        let forest = IsolationForest::fit(&identical, &params(0.1, 1), &null_progress()).unwrap();
        let scores = forest.score_samples(&identical);
        assert!(scores.iter().all(|s| (s - scores[0]).abs() < f64::EPSILON));
    }

    #[test]
    fn rejects_bad_parameters() {
        let x = uniform_cloud(10, 1);
        let err = IsolationForest::fit(&x, &params(0.7, 1), &null_progress()).unwrap_err();
        assert!(matches!(
            err,
            ScoreError::InvalidParameter {
                name: "contamination",
                ..
            }
        ));

        let empty = FeatureMatrix::new(5);
        assert!(matches!(
            IsolationForest::fit(&empty, &params(0.1, 1), &null_progress()),
            Err(ScoreError::EmptyBatch)
        ));
    }
}
