//! Isolation Forest Backend
//!
//! Random axis-aligned splits; anomalies are isolated in fewer splits.
//! s(x) = 2^(-E[h(x)] / c(psi)), cutoff = training quantile at 1 - contamination.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::backend::{check_contamination, check_dataset, quantile, Score, ScoringBackend};
use crate::logic::error::{BackendError, BackendResult};

// ============================================================================
// CONSTANTS
// ============================================================================

pub const DEFAULT_TREES: usize = 100;
pub const DEFAULT_SUBSAMPLE: usize = 256;

const EULER_GAMMA: f64 = 0.577_215_664_9;

// ============================================================================
// TREE
// ============================================================================

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn build(
        data: &[Vec<f64>],
        rows: Vec<usize>,
        depth: usize,
        limit: usize,
        rng: &mut StdRng,
    ) -> Node {
        if depth >= limit || rows.len() <= 1 {
            return Node::Leaf { size: rows.len() };
        }

        let dim = data[rows[0]].len();
        let ranges: Vec<(usize, f64, f64)> = (0..dim)
            .filter_map(|j| {
                let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                    (lo.min(data[r][j]), hi.max(data[r][j]))
                });
                (hi > lo).then_some((j, lo, hi))
            })
            .collect();

        // Every remaining row is identical
        if ranges.is_empty() {
            return Node::Leaf { size: rows.len() };
        }

        let (feature, lo, hi) = ranges[rng.gen_range(0..ranges.len())];
        let value = rng.gen_range(lo..hi);
        let (left, right): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| data[r][feature] < value);

        Node::Split {
            feature,
            value,
            left: Box::new(Node::build(data, left, depth + 1, limit, rng)),
            right: Box::new(Node::build(data, right, depth + 1, limit, rng)),
        }
    }

    fn path_length(&self, x: &[f64]) -> f64 {
        let mut node = self;
        let mut depth = 0.0;
        loop {
            match node {
                Node::Leaf { size } => return depth + average_path(*size),
                Node::Split { feature, value, left, right } => {
                    node = if x[*feature] < *value { &**left } else { &**right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` items
fn average_path(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

// ============================================================================
// BACKEND
// ============================================================================

#[derive(Debug, Clone)]
pub struct IsolationForestBackend {
    pub n_trees: usize,
    pub sample_size: usize,
    pub seed: Option<u64>,
}

impl Default for IsolationForestBackend {
    fn default() -> Self {
        Self {
            n_trees: DEFAULT_TREES,
            sample_size: DEFAULT_SUBSAMPLE,
            seed: None,
        }
    }
}

impl IsolationForestBackend {
    pub fn with_seed(seed: Option<u64>) -> Self {
        Self { seed, ..Self::default() }
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IsolationForestModel {
    trees: Vec<Node>,
    dim: usize,
    /// c(psi), normalizes path lengths
    norm: f64,
    /// Score above which a vector is anomalous
    pub cutoff: f64,
}

impl IsolationForestModel {
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    fn raw_score(&self, x: &[f64]) -> f64 {
        let mean_path =
            self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        2f64.powf(-mean_path / self.norm)
    }
}

impl ScoringBackend for IsolationForestBackend {
    type Model = IsolationForestModel;

    fn name(&self) -> &str {
        "isolation_forest"
    }

    fn fit(&self, dataset: &[Vec<f64>], contamination: f64) -> BackendResult<IsolationForestModel> {
        check_contamination(contamination)?;
        if self.n_trees == 0 || self.sample_size < 2 {
            return Err(BackendError::InvalidParameter {
                name: "n_trees/sample_size".to_string(),
                reason: "need at least 1 tree and a subsample of 2".to_string(),
            });
        }
        let dim = check_dataset(dataset, 2)?;
        let n = dataset.len();
        let psi = self.sample_size.min(n);
        let limit = (psi as f64).log2().ceil() as usize;

        let mut rng = self.rng();
        let trees: Vec<Node> = (0..self.n_trees)
            .map(|_| {
                let rows = rand::seq::index::sample(&mut rng, n, psi).into_vec();
                Node::build(dataset, rows, 0, limit, &mut rng)
            })
            .collect();

        let mut model = IsolationForestModel {
            trees,
            dim,
            norm: average_path(psi),
            cutoff: 1.0,
        };

        let training: Vec<f64> = dataset.iter().map(|row| model.raw_score(row)).collect();
        model.cutoff = quantile(&training, 1.0 - contamination);

        log::debug!(
            "isolation forest fit: n={}, psi={}, trees={}, cutoff={:.4}",
            n,
            psi,
            self.n_trees,
            model.cutoff
        );
        Ok(model)
    }

    fn score(&self, model: &IsolationForestModel, vector: &[f64]) -> BackendResult<Score> {
        if vector.len() != model.dim {
            return Err(BackendError::DimensionMismatch { expected: model.dim, got: vector.len() });
        }
        let score = model.raw_score(vector);
        if !score.is_finite() {
            return Err(BackendError::Numerical("non-finite isolation score".to_string()));
        }
        Ok(Score {
            score,
            is_anomaly: score > model.cutoff,
        })
    }
}
