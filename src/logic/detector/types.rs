//! Detector Types - Replies, stats and published models

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::features::FieldSpec;

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorStatus {
    /// Not enough samples (or no successful fit yet)
    Collecting,
    /// Model available, no retrain in flight
    Ready,
    /// Model available, background retrain running
    Retraining,
}

/// Reply to a single `process` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub status: DetectorStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_anomaly: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples_until_ready: Option<u64>,
    pub model_version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessResponse {
    pub(crate) fn collecting(samples_until_ready: u64, model_version: u64) -> Self {
        Self {
            status: DetectorStatus::Collecting,
            score: None,
            is_anomaly: None,
            samples_until_ready: Some(samples_until_ready),
            model_version,
            error: None,
        }
    }

    pub(crate) fn scored(
        status: DetectorStatus,
        score: f64,
        is_anomaly: bool,
        model_version: u64,
    ) -> Self {
        Self {
            status,
            score: Some(score),
            is_anomaly: Some(is_anomaly),
            samples_until_ready: None,
            model_version,
            error: None,
        }
    }

    pub(crate) fn failed(status: DetectorStatus, model_version: u64, error: String) -> Self {
        Self {
            status,
            score: None,
            is_anomaly: None,
            samples_until_ready: None,
            model_version,
            error: Some(error),
        }
    }
}

/// Detector statistics snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorStats {
    pub detector_id: String,
    pub status: DetectorStatus,
    pub model_version: u64,
    pub samples_collected: u64,
    pub total_processed: u64,
    pub samples_since_retrain: u64,
    pub buffer_len: usize,
    pub last_retrain_error: Option<String>,
    pub retrain_count: u64,
    pub failed_retrains: u64,
    pub anomalies_detected: u64,
    pub last_retrained_at: Option<DateTime<Utc>>,
    pub last_retrain_duration_ms: Option<u64>,
    pub model_id: Option<Uuid>,
    pub feature_count: usize,
    pub layout_hash: Option<u32>,
    pub backend: String,
}

/// Row of `list()`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorSummary {
    pub detector_id: String,
    pub status: DetectorStatus,
    pub model_version: u64,
}

/// Locked schema with its full feature layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub fields: Vec<FieldSpec>,
    pub feature_names: Vec<String>,
    pub layout_hash: u32,
}

/// A fitted model as seen by the scoring path
#[derive(Debug)]
pub struct PublishedModel<M> {
    pub version: u64,
    pub model: Arc<M>,
    pub model_id: Uuid,
    pub fitted_at: DateTime<Utc>,
    /// Rows in the training snapshot
    pub trained_on: usize,
}

impl<M> Clone for PublishedModel<M> {
    fn clone(&self) -> Self {
        Self {
            version: self.version,
            model: Arc::clone(&self.model),
            model_id: self.model_id,
            fitted_at: self.fitted_at,
            trained_on: self.trained_on,
        }
    }
}
