//! Streaming Detector - Tick/tock orchestration
//!
//! **Tick** (`process`): encode -> buffer -> score. Never waits for training.
//! **Tock** (retrain): fit on a buffer snapshot on the blocking pool, then
//! swap the model under the detector lock.
//!
//! ## Rules:
//! 1. Model version only moves forward by 1 per successful fit
//! 2. A tock started before `reset` can never publish after it (epoch check)
//! 3. A failing or panicking fit always clears the in-flight flag

pub mod types;


use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::logic::config::DetectorConfig;
use crate::logic::error::{DetectorError, DetectorResult};
use crate::logic::features::{FeatureLayout, Sample, SampleCodec};
use crate::logic::model::{Backend, ScoringBackend};
use crate::logic::window::SlidingWindow;

pub use types::{
    DetectorStats, DetectorStatus, DetectorSummary, ProcessResponse, PublishedModel, SchemaInfo,
};

/// Builds the backend for a detector from its config
pub type BackendFactory<B> = Arc<dyn Fn(&DetectorConfig) -> B + Send + Sync>;

/// Factory for the built-in backends
pub fn builtin_factory() -> BackendFactory<Backend> {
    Arc::new(Backend::for_config)
}

// ============================================================================
// STATE
// ============================================================================

struct DetectorState<B: ScoringBackend> {
    config: DetectorConfig,
    backend: Arc<B>,
    codec: SampleCodec,
    window: SlidingWindow,
    layout: Option<FeatureLayout>,
    model: Option<PublishedModel<B::Model>>,

    /// Bumped on every reset; a tock only publishes into its own epoch
    epoch: u64,
    retrain_in_flight: bool,
    retrain_task: Option<JoinHandle<()>>,

    samples_collected: u64,
    samples_since_retrain: u64,
    total_processed: u64,
    retrain_count: u64,
    failed_retrains: u64,
    anomalies_detected: u64,
    last_retrain_error: Option<String>,
    last_retrained_at: Option<chrono::DateTime<Utc>>,
    last_retrain_duration_ms: Option<u64>,
}

impl<B: ScoringBackend> DetectorState<B> {
    fn new(config: DetectorConfig, backend: B, epoch: u64) -> Self {
        let window = SlidingWindow::new(
            config.window_size,
            &config.effective_rolling_windows(),
            &config.rolling_aggregates,
            &config.lag_periods,
        );
        Self {
            codec: SampleCodec::new(config.missing_fields),
            window,
            backend: Arc::new(backend),
            layout: None,
            model: None,
            epoch,
            retrain_in_flight: false,
            retrain_task: None,
            samples_collected: 0,
            samples_since_retrain: 0,
            total_processed: 0,
            retrain_count: 0,
            failed_retrains: 0,
            anomalies_detected: 0,
            last_retrain_error: None,
            last_retrained_at: None,
            last_retrain_duration_ms: None,
            config,
        }
    }

    fn model_version(&self) -> u64 {
        self.model.as_ref().map(|m| m.version).unwrap_or(0)
    }

    fn status(&self) -> DetectorStatus {
        match (&self.model, self.retrain_in_flight) {
            (None, _) => DetectorStatus::Collecting,
            (Some(_), true) => DetectorStatus::Retraining,
            (Some(_), false) => DetectorStatus::Ready,
        }
    }

    /// Feature vectors of every buffered sample, oldest first
    fn training_set(&self) -> Vec<Vec<f64>> {
        self.window
            .snapshot()
            .iter()
            .map(|entry| entry.features.clone())
            .collect()
    }

    fn publish(&mut self, model: B::Model, trained_on: usize, elapsed: Duration) -> u64 {
        let version = self.model_version() + 1;
        let fitted_at = Utc::now();
        let model_id = Uuid::new_v4();

        self.model = Some(PublishedModel {
            version,
            model: Arc::new(model),
            model_id,
            fitted_at,
            trained_on,
        });
        self.retrain_count += 1;
        self.last_retrain_error = None;
        self.last_retrained_at = Some(fitted_at);
        self.last_retrain_duration_ms = Some(elapsed.as_millis() as u64);
        version
    }

    fn record_failure(&mut self, error: &DetectorError) {
        self.failed_retrains += 1;
        self.last_retrain_error = Some(error.to_string());
    }
}

// ============================================================================
// DETECTOR
// ============================================================================

pub struct StreamingDetector<B: ScoringBackend = Backend> {
    id: String,
    factory: BackendFactory<B>,
    runtime: Handle,
    state: Arc<Mutex<DetectorState<B>>>,
}

impl<B: ScoringBackend> StreamingDetector<B> {
    /// Create a detector. Retrains are spawned on `runtime`'s blocking pool.
    pub fn new(
        id: impl Into<String>,
        config: DetectorConfig,
        factory: BackendFactory<B>,
        runtime: Handle,
    ) -> DetectorResult<Self> {
        config.validate()?;
        let backend = (*factory)(&config);
        Ok(Self {
            id: id.into(),
            factory,
            runtime,
            state: Arc::new(Mutex::new(DetectorState::new(config, backend, 0))),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> DetectorConfig {
        self.state.lock().config.clone()
    }

    pub fn status(&self) -> DetectorStatus {
        self.state.lock().status()
    }

    pub fn model_version(&self) -> u64 {
        self.state.lock().model_version()
    }

    /// Currently published model, if any
    pub fn current_model(&self) -> Option<PublishedModel<B::Model>> {
        self.state.lock().model.clone()
    }

    pub fn summary(&self) -> DetectorSummary {
        let state = self.state.lock();
        DetectorSummary {
            detector_id: self.id.clone(),
            status: state.status(),
            model_version: state.model_version(),
        }
    }

    // ------------------------------------------------------------------------
    // TICK
    // ------------------------------------------------------------------------

    /// Ingest one sample and score it.
    ///
    /// Shape errors are returned as `Err` and leave the detector untouched.
    /// Fit and scoring failures are reported inside the response.
    pub fn process(&self, sample: &Sample) -> DetectorResult<ProcessResponse> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let raw = state.codec.encode(sample)?;
        if state.layout.is_none() {
            if let Some(schema) = state.codec.schema() {
                state.layout = Some(FeatureLayout::build(
                    schema,
                    &state.config.effective_rolling_windows(),
                    &state.config.rolling_aggregates,
                    &state.config.lag_periods,
                ));
            }
        }

        state.window.append(raw);
        state.samples_collected += 1;
        state.total_processed += 1;
        state.samples_since_retrain += 1;

        let min_samples = state.config.min_samples as u64;
        if state.samples_collected < min_samples {
            return Ok(ProcessResponse::collecting(
                min_samples - state.samples_collected,
                state.model_version(),
            ));
        }

        // First fit runs inline so the threshold-crossing sample is scored
        if state.model.is_none() {
            let dataset = state.training_set();
            let started = Instant::now();
            match run_fit(&*state.backend, &dataset, state.config.contamination) {
                Ok(model) => {
                    let version = state.publish(model, dataset.len(), started.elapsed());
                    state.samples_since_retrain = 0;
                    log::info!(
                        "[{}] Initial model fitted: v{} on {} samples ({}ms)",
                        self.id,
                        version,
                        dataset.len(),
                        started.elapsed().as_millis()
                    );
                }
                Err(e) => {
                    log::warn!("[{}] Initial fit failed: {}", self.id, e);
                    state.record_failure(&e);
                    let mut response = ProcessResponse::collecting(0, state.model_version());
                    response.error = Some(e.to_string());
                    return Ok(response);
                }
            }
        }

        let mut response = self.score_latest(state);

        if state.samples_since_retrain >= state.config.retrain_interval as u64
            && !state.retrain_in_flight
        {
            self.launch_retrain(state);
            if response.status == DetectorStatus::Ready {
                response.status = DetectorStatus::Retraining;
            }
        }

        Ok(response)
    }

    fn score_latest(&self, state: &mut DetectorState<B>) -> ProcessResponse {
        let status = state.status();
        let version = state.model_version();

        let (published, latest) = match (&state.model, state.window.latest()) {
            (Some(m), Some(l)) => (m, l),
            _ => return ProcessResponse::collecting(0, version),
        };

        match state.backend.score(&published.model, &latest.features) {
            Ok(score) => {
                let is_anomaly = match state.config.threshold {
                    Some(threshold) => score.score >= threshold,
                    None => score.is_anomaly,
                };
                if is_anomaly {
                    state.anomalies_detected += 1;
                    log::debug!("[{}] Anomaly: score={:.4} (v{})", self.id, score.score, version);
                }
                ProcessResponse::scored(status, score.score, is_anomaly, version)
            }
            Err(e) => {
                let error = DetectorError::ScoringError(e.to_string());
                log::warn!("[{}] {}", self.id, error);
                ProcessResponse::failed(status, version, error.to_string())
            }
        }
    }

    // ------------------------------------------------------------------------
    // TOCK
    // ------------------------------------------------------------------------

    /// Start a background retrain now.
    ///
    /// Returns false when there is no model yet or a retrain is already running.
    pub fn request_retrain(&self) -> bool {
        let mut guard = self.state.lock();
        if guard.model.is_none() || guard.retrain_in_flight {
            return false;
        }
        self.launch_retrain(&mut guard);
        true
    }

    fn launch_retrain(&self, state: &mut DetectorState<B>) {
        let dataset = state.training_set();
        let epoch = state.epoch;
        let contamination = state.config.contamination;
        let backend = Arc::clone(&state.backend);
        let shared = Arc::clone(&self.state);
        let id = self.id.clone();

        state.retrain_in_flight = true;
        state.samples_since_retrain = 0;
        log::debug!("[{}] Retrain started on {} samples", id, dataset.len());

        let task = self.runtime.spawn_blocking(move || {
            let started = Instant::now();
            let outcome = run_fit(&*backend, &dataset, contamination);

            let mut state = shared.lock();
            if state.epoch != epoch {
                log::info!("[{}] Discarding retrain result from before reset", id);
                return;
            }
            state.retrain_in_flight = false;

            match outcome {
                Ok(model) => {
                    let version = state.publish(model, dataset.len(), started.elapsed());
                    log::info!(
                        "[{}] Model swapped: v{} on {} samples ({}ms)",
                        id,
                        version,
                        dataset.len(),
                        started.elapsed().as_millis()
                    );
                }
                Err(e) => {
                    let kept = state.model_version();
                    log::warn!("[{}] Retrain failed, keeping v{}: {}", id, kept, e);
                    state.record_failure(&e);
                }
            }
        });

        state.retrain_task = Some(task);
    }

    /// Await the most recently launched retrain, if any
    pub async fn wait_for_retrain(&self) {
        let task = self.state.lock().retrain_task.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                log::error!("[{}] Retrain task did not complete: {}", self.id, e);
            }
        }
    }

    // ------------------------------------------------------------------------
    // RESET / STATS
    // ------------------------------------------------------------------------

    /// Drop every sample, the model, the schema and all counters.
    ///
    /// A new config is validated before anything is touched.
    pub fn reset(&self, config: Option<DetectorConfig>) -> DetectorResult<()> {
        if let Some(cfg) = &config {
            cfg.validate()?;
        }

        let mut guard = self.state.lock();
        let config = config.unwrap_or_else(|| guard.config.clone());
        let backend = (*self.factory)(&config);
        let epoch = guard.epoch + 1;
        let pending = guard.retrain_task.take();

        *guard = DetectorState::new(config, backend, epoch);
        // An old tock may still be running; it will see the new epoch and bail
        guard.retrain_task = pending;

        log::info!("[{}] Detector reset (epoch {})", self.id, epoch);
        Ok(())
    }

    pub fn stats(&self) -> DetectorStats {
        let state = self.state.lock();
        let model = state.model.as_ref();

        DetectorStats {
            detector_id: self.id.clone(),
            status: state.status(),
            model_version: state.model_version(),
            samples_collected: state.samples_collected,
            total_processed: state.total_processed,
            samples_since_retrain: state.samples_since_retrain,
            buffer_len: state.window.len(),
            last_retrain_error: state.last_retrain_error.clone(),
            retrain_count: state.retrain_count,
            failed_retrains: state.failed_retrains,
            anomalies_detected: state.anomalies_detected,
            last_retrained_at: state.last_retrained_at,
            last_retrain_duration_ms: state.last_retrain_duration_ms,
            model_id: model.map(|m| m.model_id),
            feature_count: state.layout.as_ref().map(|l| l.feature_count()).unwrap_or(0),
            layout_hash: state.layout.as_ref().map(|l| l.hash),
            backend: state.backend.name().to_string(),
        }
    }

    /// Locked schema, `None` before the first accepted sample
    pub fn schema(&self) -> Option<SchemaInfo> {
        let state = self.state.lock();
        let schema = state.codec.schema()?;
        let layout = state.layout.as_ref()?;
        Some(SchemaInfo {
            fields: schema.fields().to_vec(),
            feature_names: layout.feature_names.clone(),
            layout_hash: layout.hash,
        })
    }

    /// Raw rows currently buffered, oldest first
    pub fn buffered_rows(&self) -> Vec<Vec<f64>> {
        self.state
            .lock()
            .window
            .snapshot()
            .iter()
            .map(|entry| entry.raw.clone())
            .collect()
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Run `fit`, turning both errors and panics into `RetrainFailed`
fn run_fit<B: ScoringBackend>(
    backend: &B,
    dataset: &[Vec<f64>],
    contamination: f64,
) -> DetectorResult<B::Model> {
    match panic::catch_unwind(AssertUnwindSafe(|| backend.fit(dataset, contamination))) {
        Ok(Ok(model)) => Ok(model),
        Ok(Err(e)) => Err(DetectorError::RetrainFailed(e.to_string())),
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(DetectorError::RetrainFailed(format!("backend panicked: {}", msg)))
        }
    }
}
