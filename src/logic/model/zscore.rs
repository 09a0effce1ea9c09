//! Z-Score Backend - Per-column standardization
//!
//! score = z_max / (z_max + cutoff), nên score > 0.5 tương đương z_max > cutoff.

use ndarray::{Array1, Array2, ArrayView1, Axis};

use super::backend::{check_contamination, check_dataset, quantile, Score, ScoringBackend};
use crate::logic::error::{BackendError, BackendResult};

/// Smallest std used when standardizing (constant columns)
const STD_FLOOR: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct ZScoreBackend {
    /// Lower bound on the fitted z cutoff
    pub z_floor: f64,
}

impl Default for ZScoreBackend {
    fn default() -> Self {
        Self { z_floor: 3.0 }
    }
}

#[derive(Debug, Clone)]
pub struct ZScoreModel {
    mean: Array1<f64>,
    std: Array1<f64>,
    /// Max |z| above which a vector is anomalous
    pub cutoff: f64,
}

impl ZScoreModel {
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    fn z_max(&self, vector: ArrayView1<f64>) -> f64 {
        vector
            .iter()
            .zip(self.mean.iter().zip(self.std.iter()))
            .map(|(x, (m, s))| ((x - m) / s).abs())
            .fold(0.0, f64::max)
    }
}

impl ScoringBackend for ZScoreBackend {
    type Model = ZScoreModel;

    fn name(&self) -> &str {
        "zscore"
    }

    fn fit(&self, dataset: &[Vec<f64>], contamination: f64) -> BackendResult<ZScoreModel> {
        check_contamination(contamination)?;
        let dim = check_dataset(dataset, 1)?;
        let n = dataset.len();

        let flat: Vec<f64> = dataset.iter().flatten().copied().collect();
        let data = Array2::from_shape_vec((n, dim), flat)
            .map_err(|e| BackendError::Numerical(e.to_string()))?;

        let mean = data
            .mean_axis(Axis(0))
            .ok_or_else(|| BackendError::Numerical("empty dataset".to_string()))?;
        let raw_std = if n > 1 {
            data.std_axis(Axis(0), 1.0)
        } else {
            Array1::zeros(dim)
        };
        let std = raw_std.mapv(|s| if s.is_finite() && s > STD_FLOOR { s } else { STD_FLOOR });

        let mut model = ZScoreModel { mean, std, cutoff: self.z_floor };

        let training_z: Vec<f64> = data.rows().into_iter().map(|row| model.z_max(row)).collect();
        let fitted = quantile(&training_z, 1.0 - contamination);
        model.cutoff = fitted.max(self.z_floor);

        log::debug!("zscore fit: n={}, dim={}, cutoff={:.3}", n, dim, model.cutoff);
        Ok(model)
    }

    fn score(&self, model: &ZScoreModel, vector: &[f64]) -> BackendResult<Score> {
        if vector.len() != model.dim() {
            return Err(BackendError::DimensionMismatch {
                expected: model.dim(),
                got: vector.len(),
            });
        }
        let z = model.z_max(ArrayView1::from(vector));
        if !z.is_finite() {
            return Err(BackendError::Numerical("non-finite z-score".to_string()));
        }
        Ok(Score {
            score: z / (z + model.cutoff),
            is_anomaly: z > model.cutoff,
        })
    }
}
