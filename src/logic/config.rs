//! Detector Configuration
//!
//! Per-detector settings. Fixed at creation, replaceable only through reset.

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::logic::error::{DetectorError, DetectorResult};
use crate::logic::features::MissingFieldPolicy;
use crate::logic::model::BackendKind;
use crate::logic::window::Aggregate;

/// Detector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Samples required before the first fit
    pub min_samples: usize,

    /// Samples seen between two background retrains
    pub retrain_interval: usize,

    /// Buffer capacity
    pub window_size: usize,

    /// Score cutoff. When unset the backend's own verdict is used.
    pub threshold: Option<f64>,

    /// Expected anomaly fraction passed to `fit`
    pub contamination: f64,

    /// Rolling window sizes (samples)
    pub rolling_windows: Vec<usize>,

    /// Aggregates computed for every rolling window
    pub rolling_aggregates: Vec<Aggregate>,

    /// Lag periods (samples back from the tail)
    pub lag_periods: Vec<usize>,

    /// What to do when a sample omits a schema field
    pub missing_fields: MissingFieldPolicy,

    /// Scoring backend
    pub backend: BackendKind,

    /// RNG seed for stochastic backends
    pub seed: Option<u64>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_samples: constants::DEFAULT_MIN_SAMPLES,
            retrain_interval: constants::DEFAULT_RETRAIN_INTERVAL,
            window_size: constants::DEFAULT_WINDOW_SIZE,
            threshold: None,
            contamination: constants::DEFAULT_CONTAMINATION,
            rolling_windows: constants::DEFAULT_ROLLING_WINDOWS.to_vec(),
            rolling_aggregates: Aggregate::ALL.to_vec(),
            lag_periods: constants::DEFAULT_LAG_PERIODS.to_vec(),
            missing_fields: MissingFieldPolicy::Reject,
            backend: BackendKind::ZScore,
            seed: None,
        }
    }
}

impl DetectorConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let backend = constants::get_backend_name()
            .parse()
            .unwrap_or_else(|e| {
                log::warn!("{}; falling back to zscore backend", e);
                BackendKind::ZScore
            });

        Self {
            min_samples: constants::get_min_samples(),
            retrain_interval: constants::get_retrain_interval(),
            window_size: constants::get_window_size(),
            contamination: constants::get_contamination(),
            backend,
            ..Self::default()
        }
    }

    /// Small-footprint config, handy for tests and demos
    pub fn small(min_samples: usize, window_size: usize) -> Self {
        Self {
            min_samples,
            window_size,
            ..Self::default()
        }
    }

    /// Rolling window sizes as computed: each clamped to `window_size`,
    /// duplicates created by the clamp dropped, first occurrence kept.
    pub fn effective_rolling_windows(&self) -> Vec<usize> {
        let mut out: Vec<usize> = Vec::with_capacity(self.rolling_windows.len());
        for w in self.rolling_windows.iter().map(|&w| w.min(self.window_size)) {
            if !out.contains(&w) {
                out.push(w);
            }
        }
        out
    }

    /// Validate before any detector state is created
    pub fn validate(&self) -> DetectorResult<()> {
        if self.min_samples == 0 {
            return Err(DetectorError::invalid_config("min_samples", "must be > 0"));
        }
        if self.retrain_interval == 0 {
            return Err(DetectorError::invalid_config("retrain_interval", "must be > 0"));
        }
        if self.window_size == 0 {
            return Err(DetectorError::invalid_config("window_size", "must be > 0"));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(DetectorError::invalid_config(
                "contamination",
                format!("must be in (0, 0.5], got {}", self.contamination),
            ));
        }
        if let Some(t) = self.threshold {
            if !t.is_finite() {
                return Err(DetectorError::invalid_config("threshold", "must be finite"));
            }
        }

        check_periods("rolling_windows", &self.rolling_windows)?;
        check_periods("lag_periods", &self.lag_periods)?;

        if let Some(&p) = self.lag_periods.iter().find(|&&p| p >= self.window_size) {
            return Err(DetectorError::invalid_config(
                "lag_periods",
                format!("lag {} must be smaller than window_size {}", p, self.window_size),
            ));
        }
        if !self.rolling_windows.is_empty() && self.rolling_aggregates.is_empty() {
            return Err(DetectorError::invalid_config(
                "rolling_aggregates",
                "at least one aggregate is required when rolling windows are set",
            ));
        }
        let mut aggs = self.rolling_aggregates.clone();
        aggs.sort();
        aggs.dedup();
        if aggs.len() != self.rolling_aggregates.len() {
            return Err(DetectorError::invalid_config("rolling_aggregates", "duplicate aggregate"));
        }
        if let MissingFieldPolicy::Fill { value } = self.missing_fields {
            if !value.is_finite() {
                return Err(DetectorError::invalid_config(
                    "missing_fields",
                    "fill value must be finite",
                ));
            }
        }

        Ok(())
    }
}

fn check_periods(field: &'static str, periods: &[usize]) -> DetectorResult<()> {
    if periods.iter().any(|&p| p == 0) {
        return Err(DetectorError::invalid_config(field, "values must be > 0"));
    }
    let mut sorted = periods.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() != periods.len() {
        return Err(DetectorError::invalid_config(field, "duplicate value"));
    }
    Ok(())
}
