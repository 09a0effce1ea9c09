//! Central Configuration Constants
//!
//! Single source of truth for detector defaults.
//! Every default can be overridden from the environment via the `get_*` helpers.

/// Samples required before the first model is fit
pub const DEFAULT_MIN_SAMPLES: usize = 50;

/// Samples between two background retrains
pub const DEFAULT_RETRAIN_INTERVAL: usize = 100;

/// Sliding window capacity (samples kept for training)
pub const DEFAULT_WINDOW_SIZE: usize = 1000;

/// Expected fraction of anomalies in the training window
pub const DEFAULT_CONTAMINATION: f64 = 0.05;

/// Default rolling window sizes
pub const DEFAULT_ROLLING_WINDOWS: &[usize] = &[5];

/// Default lag periods
pub const DEFAULT_LAG_PERIODS: &[usize] = &[1];

/// Placeholder for lag features that are not available yet
pub const LAG_PLACEHOLDER: f64 = 0.0;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Stream Detector";

// ============================================
// Helper functions to read from env with fallback
// ============================================

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Get min samples from environment or use default
pub fn get_min_samples() -> usize {
    env_parse("DETECTOR_MIN_SAMPLES").unwrap_or(DEFAULT_MIN_SAMPLES)
}

/// Get retrain interval from environment or use default
pub fn get_retrain_interval() -> usize {
    env_parse("DETECTOR_RETRAIN_INTERVAL").unwrap_or(DEFAULT_RETRAIN_INTERVAL)
}

/// Get window size from environment or use default
pub fn get_window_size() -> usize {
    env_parse("DETECTOR_WINDOW_SIZE").unwrap_or(DEFAULT_WINDOW_SIZE)
}

/// Get contamination from environment or use default
pub fn get_contamination() -> f64 {
    env_parse("DETECTOR_CONTAMINATION").unwrap_or(DEFAULT_CONTAMINATION)
}

/// Get backend name from environment ("zscore" if unset)
pub fn get_backend_name() -> String {
    std::env::var("DETECTOR_BACKEND")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|_| "zscore".to_string())
}
