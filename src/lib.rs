//! Stream Detector Core
//!
//! Online anomaly scoring over labeled observation streams. Each detector
//! buffers recent samples, scores every new one against the current model
//! and retrains in the background without blocking the scoring path.

pub mod api;
pub mod constants;
pub mod logic;

pub use logic::config::DetectorConfig;
pub use logic::detector::{
    builtin_factory, BackendFactory, DetectorStats, DetectorStatus, DetectorSummary,
    ProcessResponse, StreamingDetector,
};
pub use logic::error::{BackendError, DetectorError, DetectorResult};
pub use logic::features::{sample, MissingFieldPolicy, Sample, SampleValue};
pub use logic::model::{Backend, BackendKind, Score, ScoringBackend};
pub use logic::registry::Registry;
pub use logic::window::Aggregate;
