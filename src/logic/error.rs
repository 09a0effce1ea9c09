//! Error types for detectors and scoring backends

use thiserror::Error;

/// Result alias for detector and registry operations
pub type DetectorResult<T> = Result<T, DetectorError>;

/// Result alias for scoring backend calls
pub type BackendResult<T> = Result<T, BackendError>;

// ============================================================================
// DETECTOR ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectorError {
    // Input shape errors (sample rejected, no state change)
    #[error("Schema mismatch: missing required fields {missing:?}")]
    SchemaMismatch { missing: Vec<String> },

    #[error("Unknown fields not in locked schema: {fields:?}")]
    UnknownField { fields: Vec<String> },

    #[error("Field '{field}' has wrong type: expected {expected}")]
    FieldTypeMismatch { field: String, expected: &'static str },

    #[error("Field '{field}' is not a finite number")]
    NonFiniteValue { field: String },

    #[error("Sample has no fields")]
    EmptySample,

    // Resource errors
    #[error("Detector not found: {0}")]
    NotFound(String),

    // Backend errors
    #[error("Retrain failed: {0}")]
    RetrainFailed(String),

    #[error("Scoring failed: {0}")]
    ScoringError(String),

    // Validation errors
    #[error("Invalid config: {field} - {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}

impl DetectorError {
    pub fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        DetectorError::InvalidConfig { field, reason: reason.into() }
    }

    /// True for errors caused by the shape of an incoming sample
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            DetectorError::SchemaMismatch { .. }
                | DetectorError::UnknownField { .. }
                | DetectorError::FieldTypeMismatch { .. }
                | DetectorError::NonFiniteValue { .. }
                | DetectorError::EmptySample
        )
    }
}

// ============================================================================
// BACKEND ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("Insufficient data: required {required}, got {got}")]
    InsufficientData { required: usize, got: usize },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Invalid parameter: {name} - {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Model was not produced by the {expected} backend")]
    ModelMismatch { expected: &'static str },

    #[error("Numerical error: {0}")]
    Numerical(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mismatch_display() {
        let e = DetectorError::SchemaMismatch { missing: vec!["cpu".to_string()] };
        assert!(e.to_string().contains("cpu"));
        assert!(e.is_rejection());
    }

    #[test]
    fn test_invalid_config_display() {
        let e = DetectorError::invalid_config("min_samples", "must be > 0");
        assert_eq!(e.to_string(), "Invalid config: min_samples - must be > 0");
        assert!(!e.is_rejection());
    }

    #[test]
    fn test_backend_error_display() {
        let e = BackendError::InsufficientData { required: 2, got: 1 };
        assert_eq!(e.to_string(), "Insufficient data: required 2, got 1");
    }

    #[test]
    fn test_errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DetectorError>();
        assert_send_sync::<BackendError>();
    }
}
