//! Commands - JSON command surface over the detector registry
//!
//! Mỗi dòng stdin là một `Command`, mỗi reply là một `Reply`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::logic::config::DetectorConfig;
use crate::logic::detector::{DetectorStats, DetectorSummary, ProcessResponse};
use crate::logic::features::Sample;
use crate::logic::registry::Registry;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Incoming request, tagged by `op`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Process {
        detector_id: String,
        sample: Sample,
        #[serde(default)]
        config: Option<DetectorConfig>,
    },
    Stats {
        detector_id: String,
    },
    Reset {
        detector_id: String,
        #[serde(default)]
        config: Option<DetectorConfig>,
    },
    Delete {
        detector_id: String,
    },
    List,
}

/// Outgoing reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply {
    pub fn success(result: Value) -> Self {
        Self { ok: true, result: Some(result), error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { ok: false, result: None, error: Some(error.into()) }
    }
}

impl From<Result<Value, String>> for Reply {
    fn from(result: Result<Value, String>) -> Self {
        match result {
            Ok(value) => Reply::success(value),
            Err(e) => Reply::failure(e),
        }
    }
}

// ============================================================================
// COMMAND HANDLERS
// ============================================================================

/// Score one sample (creates the detector on first use)
pub fn process_sample(
    registry: &Registry,
    detector_id: &str,
    sample: &Sample,
    config: Option<DetectorConfig>,
) -> Result<ProcessResponse, String> {
    registry.process(detector_id, sample, config).map_err(|e| {
        if e.is_rejection() {
            log::debug!("[{}] Sample rejected: {}", detector_id, e);
        } else {
            log::warn!("[{}] Process failed: {}", detector_id, e);
        }
        e.to_string()
    })
}

pub fn get_stats(registry: &Registry, detector_id: &str) -> Result<DetectorStats, String> {
    registry.stats(detector_id).map_err(|e| e.to_string())
}

pub fn reset_detector(
    registry: &Registry,
    detector_id: &str,
    config: Option<DetectorConfig>,
) -> Result<bool, String> {
    registry
        .reset(detector_id, config)
        .map(|_| true)
        .map_err(|e| e.to_string())
}

pub fn delete_detector(registry: &Registry, detector_id: &str) -> Result<bool, String> {
    registry
        .delete(detector_id)
        .map(|_| true)
        .map_err(|e| e.to_string())
}

pub fn list_detectors(registry: &Registry) -> Vec<DetectorSummary> {
    registry.list()
}

// ============================================================================
// DISPATCH
// ============================================================================

pub fn dispatch(registry: &Registry, command: Command) -> Result<Value, String> {
    match command {
        Command::Process { detector_id, sample, config } => {
            to_value(process_sample(registry, &detector_id, &sample, config)?)
        }
        Command::Stats { detector_id } => to_value(get_stats(registry, &detector_id)?),
        Command::Reset { detector_id, config } => {
            to_value(reset_detector(registry, &detector_id, config)?)
        }
        Command::Delete { detector_id } => to_value(delete_detector(registry, &detector_id)?),
        Command::List => to_value(list_detectors(registry)),
    }
}

/// Parse and run one JSON line
pub fn handle_line(registry: &Registry, line: &str) -> Reply {
    match serde_json::from_str::<Command>(line) {
        Ok(command) => dispatch(registry, command).into(),
        Err(e) => Reply::failure(format!("Invalid command: {}", e)),
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

// ============================================================================
// TESTS
// ============================================================================
