//! Scoring Backend - Capability interface used by detectors
//!
//! Detector chỉ biết `fit` và `score`. Thuật toán cụ thể nằm sau trait này.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::isolation::{IsolationForestBackend, IsolationForestModel};
use super::zscore::{ZScoreBackend, ZScoreModel};
use crate::logic::config::DetectorConfig;
use crate::logic::error::{BackendError, BackendResult};

// ============================================================================
// TRAIT
// ============================================================================

/// Output of a single scoring call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Higher means more anomalous
    pub score: f64,
    /// Backend's own verdict
    pub is_anomaly: bool,
}

/// Trait cho scoring backends (z-score, isolation forest, ...)
///
/// `fit` runs on the blocking pool and may be slow. `score` runs on the tick
/// path and should be cheap.
pub trait ScoringBackend: Send + Sync + 'static {
    type Model: Send + Sync + 'static;

    fn name(&self) -> &str;

    fn fit(&self, dataset: &[Vec<f64>], contamination: f64) -> BackendResult<Self::Model>;

    fn score(&self, model: &Self::Model, vector: &[f64]) -> BackendResult<Score>;
}

// ============================================================================
// BACKEND KIND
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    #[default]
    #[serde(rename = "zscore")]
    ZScore,
    #[serde(rename = "isolation_forest")]
    IsolationForest,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::ZScore => "zscore",
            BackendKind::IsolationForest => "isolation_forest",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Unknown backend '{0}' (expected zscore or isolation_forest)")]
pub struct UnknownBackend(pub String);

impl FromStr for BackendKind {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zscore" | "z_score" => Ok(BackendKind::ZScore),
            "isolation_forest" | "iforest" => Ok(BackendKind::IsolationForest),
            other => Err(UnknownBackend(other.to_string())),
        }
    }
}

// ============================================================================
// BUILT-IN BACKENDS
// ============================================================================

/// Built-in backend selected by `BackendKind`
#[derive(Debug, Clone)]
pub enum Backend {
    ZScore(ZScoreBackend),
    IsolationForest(IsolationForestBackend),
}

/// Model produced by a built-in backend
#[derive(Debug, Clone)]
pub enum BackendModel {
    ZScore(ZScoreModel),
    IsolationForest(IsolationForestModel),
}

impl Backend {
    pub fn for_config(config: &DetectorConfig) -> Self {
        match config.backend {
            BackendKind::ZScore => Backend::ZScore(ZScoreBackend::default()),
            BackendKind::IsolationForest => {
                Backend::IsolationForest(IsolationForestBackend::with_seed(config.seed))
            }
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::ZScore(_) => BackendKind::ZScore,
            Backend::IsolationForest(_) => BackendKind::IsolationForest,
        }
    }
}

impl ScoringBackend for Backend {
    type Model = BackendModel;

    fn name(&self) -> &str {
        self.kind().as_str()
    }

    fn fit(&self, dataset: &[Vec<f64>], contamination: f64) -> BackendResult<BackendModel> {
        match self {
            Backend::ZScore(b) => b.fit(dataset, contamination).map(BackendModel::ZScore),
            Backend::IsolationForest(b) => {
                b.fit(dataset, contamination).map(BackendModel::IsolationForest)
            }
        }
    }

    fn score(&self, model: &BackendModel, vector: &[f64]) -> BackendResult<Score> {
        match (self, model) {
            (Backend::ZScore(b), BackendModel::ZScore(m)) => b.score(m, vector),
            (Backend::IsolationForest(b), BackendModel::IsolationForest(m)) => b.score(m, vector),
            (b, _) => Err(BackendError::ModelMismatch { expected: b.kind().as_str() }),
        }
    }
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Every row must be non-empty and share the first row's width
pub(crate) fn check_dataset(dataset: &[Vec<f64>], required: usize) -> BackendResult<usize> {
    if dataset.len() < required {
        return Err(BackendError::InsufficientData { required, got: dataset.len() });
    }
    let dim = dataset[0].len();
    if dim == 0 {
        return Err(BackendError::InvalidParameter {
            name: "dataset".to_string(),
            reason: "rows have no columns".to_string(),
        });
    }
    if let Some(row) = dataset.iter().find(|r| r.len() != dim) {
        return Err(BackendError::DimensionMismatch { expected: dim, got: row.len() });
    }
    if dataset.iter().flatten().any(|v| !v.is_finite()) {
        return Err(BackendError::Numerical("dataset contains non-finite values".to_string()));
    }
    Ok(dim)
}

pub(crate) fn check_contamination(contamination: f64) -> BackendResult<()> {
    if contamination > 0.0 && contamination <= 0.5 {
        Ok(())
    } else {
        Err(BackendError::InvalidParameter {
            name: "contamination".to_string(),
            reason: format!("must be in (0, 0.5], got {}", contamination),
        })
    }
}

/// Linear-interpolated quantile, `q` in [0, 1]
pub(crate) fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
