//! Detector Registry - Process-wide `detector_id -> detector` map
//!
//! Detectors được tạo lazy ở lần `process` đầu tiên và sống tới khi bị xóa.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;

use crate::logic::config::DetectorConfig;
use crate::logic::detector::{
    builtin_factory, BackendFactory, DetectorStats, DetectorSummary, ProcessResponse,
    StreamingDetector,
};
use crate::logic::error::{DetectorError, DetectorResult};
use crate::logic::features::Sample;
use crate::logic::model::{Backend, ScoringBackend};

pub struct Registry<B: ScoringBackend = Backend> {
    detectors: RwLock<HashMap<String, Arc<StreamingDetector<B>>>>,
    factory: BackendFactory<B>,
    default_config: DetectorConfig,
    runtime: Handle,
}

impl Registry<Backend> {
    /// Registry using the built-in backends
    pub fn new(runtime: Handle) -> Self {
        Self::with_factory(runtime, builtin_factory())
    }
}

impl<B: ScoringBackend> Registry<B> {
    pub fn with_factory(runtime: Handle, factory: BackendFactory<B>) -> Self {
        Self {
            detectors: RwLock::new(HashMap::new()),
            factory,
            default_config: DetectorConfig::default(),
            runtime,
        }
    }

    /// Config used when a detector is created without one
    pub fn with_default_config(mut self, config: DetectorConfig) -> Self {
        self.default_config = config;
        self
    }

    pub fn default_config(&self) -> &DetectorConfig {
        &self.default_config
    }

    // ========================================================================
    // LOOKUP
    // ========================================================================

    /// Return the detector for `id`, creating it on first use.
    ///
    /// The config is validated before anything is created. Once a detector
    /// exists, later configs are ignored.
    pub fn get_or_create(
        &self,
        id: &str,
        config: Option<DetectorConfig>,
    ) -> DetectorResult<Arc<StreamingDetector<B>>> {
        if let Some(cfg) = &config {
            cfg.validate()?;
        }

        if let Some(existing) = self.detectors.read().get(id) {
            return Ok(Arc::clone(existing));
        }

        let mut map = self.detectors.write();
        // Another caller may have created it between the two locks
        if let Some(existing) = map.get(id) {
            return Ok(Arc::clone(existing));
        }

        let config = config.unwrap_or_else(|| self.default_config.clone());
        let detector = Arc::new(StreamingDetector::new(
            id,
            config,
            Arc::clone(&self.factory),
            self.runtime.clone(),
        )?);
        map.insert(id.to_string(), Arc::clone(&detector));

        log::info!("Detector created: {} (total {})", id, map.len());
        Ok(detector)
    }

    pub fn get(&self, id: &str) -> DetectorResult<Arc<StreamingDetector<B>>> {
        self.detectors
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| DetectorError::NotFound(id.to_string()))
    }

    /// `(id, status, model_version)` for every detector, sorted by id
    pub fn list(&self) -> Vec<DetectorSummary> {
        let detectors: Vec<Arc<StreamingDetector<B>>> =
            self.detectors.read().values().cloned().collect();

        let mut summaries: Vec<DetectorSummary> = detectors.iter().map(|d| d.summary()).collect();
        summaries.sort_by(|a, b| a.detector_id.cmp(&b.detector_id));
        summaries
    }

    pub fn len(&self) -> usize {
        self.detectors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.read().is_empty()
    }

    // ========================================================================
    // OPERATIONS
    // ========================================================================

    pub fn process(
        &self,
        id: &str,
        sample: &Sample,
        config: Option<DetectorConfig>,
    ) -> DetectorResult<ProcessResponse> {
        self.get_or_create(id, config)?.process(sample)
    }

    pub fn stats(&self, id: &str) -> DetectorResult<DetectorStats> {
        Ok(self.get(id)?.stats())
    }

    pub fn reset(&self, id: &str, config: Option<DetectorConfig>) -> DetectorResult<()> {
        self.get(id)?.reset(config)
    }

    pub fn delete(&self, id: &str) -> DetectorResult<()> {
        match self.detectors.write().remove(id) {
            Some(_) => {
                log::info!("Detector deleted: {}", id);
                Ok(())
            }
            None => Err(DetectorError::NotFound(id.to_string())),
        }
    }

    /// Drop every detector
    pub fn clear(&self) {
        let mut map = self.detectors.write();
        let count = map.len();
        map.clear();
        log::info!("Registry cleared ({} detectors)", count);
    }

    /// Wait until no detector has a retrain in flight
    pub async fn wait_idle(&self) {
        let detectors: Vec<Arc<StreamingDetector<B>>> =
            self.detectors.read().values().cloned().collect();
        for detector in detectors {
            detector.wait_for_retrain().await;
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::detector::DetectorStatus;
    use crate::logic::features::sample;

    fn registry() -> Registry {
        Registry::new(Handle::current())
    }

    fn small() -> DetectorConfig {
        DetectorConfig {
            min_samples: 3,
            retrain_interval: 4,
            window_size: 20,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_get_or_create_returns_same_instance() {
        let registry = registry();
        let a = registry.get_or_create("cpu", Some(small())).unwrap();
        let b = registry.get_or_create("cpu", None).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);

        // Later configs are ignored
        let c = registry
            .get_or_create("cpu", Some(DetectorConfig { min_samples: 99, ..Default::default() }))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &c));
        assert_eq!(c.config().min_samples, 3);
    }

    #[tokio::test]
    async fn test_missing_detector_is_not_found() {
        let registry = registry();
        assert!(matches!(registry.get("nope"), Err(DetectorError::NotFound(_))));
        assert!(matches!(registry.stats("nope"), Err(DetectorError::NotFound(_))));
        assert!(matches!(registry.reset("nope", None), Err(DetectorError::NotFound(_))));
        assert_eq!(registry.delete("nope"), Err(DetectorError::NotFound("nope".to_string())));
    }

    #[tokio::test]
    async fn test_invalid_config_creates_nothing() {
        let registry = registry();
        let bad = DetectorConfig { window_size: 0, ..Default::default() };
        assert!(matches!(
            registry.get_or_create("cpu", Some(bad)),
            Err(DetectorError::InvalidConfig { field: "window_size", .. })
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_list_is_sorted() {
        let registry = registry();
        for id in ["zeta", "alpha", "mid"] {
            registry.process(id, &sample([("x", 1.0)]), Some(small())).unwrap();
        }
        let ids: Vec<String> = registry.list().into_iter().map(|s| s.detector_id).collect();
        assert_eq!(ids, vec!["alpha", "mid", "zeta"]);
        assert!(registry
            .list()
            .iter()
            .all(|s| s.status == DetectorStatus::Collecting && s.model_version == 0));
    }

    #[tokio::test]
    async fn test_process_reaches_ready_and_retrains() {
        let registry = registry();
        for i in 0..3 {
            registry.process("net", &sample([("x", i as f64)]), Some(small())).unwrap();
        }
        assert_eq!(registry.stats("net").unwrap().model_version, 1);

        for i in 0..4 {
            registry.process("net", &sample([("x", i as f64)]), None).unwrap();
        }
        registry.wait_idle().await;

        let stats = registry.stats("net").unwrap();
        assert_eq!(stats.model_version, 2);
        assert_eq!(stats.status, DetectorStatus::Ready);
    }

    #[tokio::test]
    async fn test_delete_and_recreate() {
        let registry = registry();
        registry.process("disk", &sample([("x", 1.0)]), Some(small())).unwrap();
        let first = registry.get("disk").unwrap();

        registry.delete("disk").unwrap();
        assert!(registry.get("disk").is_err());

        registry.process("disk", &sample([("y", 1.0)]), None).unwrap();
        let second = registry.get("disk").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.stats().samples_collected, 1);
    }

    #[tokio::test]
    async fn test_reset_through_registry() {
        let registry = registry();
        for i in 0..5 {
            registry.process("io", &sample([("x", i as f64)]), Some(small())).unwrap();
        }
        registry.reset("io", None).unwrap();
        let stats = registry.stats("io").unwrap();
        assert_eq!(stats.model_version, 0);
        assert_eq!(stats.samples_collected, 0);
    }

    #[tokio::test]
    async fn test_clear() {
        let registry = registry();
        registry.get_or_create("a", None).unwrap();
        registry.get_or_create("b", None).unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.list().is_empty());
    }

    #[tokio::test]
    async fn test_default_config_is_used() {
        let registry = registry().with_default_config(DetectorConfig {
            min_samples: 2,
            ..Default::default()
        });
        registry.process("d", &sample([("x", 1.0)]), None).unwrap();
        let r = registry.process("d", &sample([("x", 2.0)]), None).unwrap();
        assert_eq!(r.status, DetectorStatus::Ready);
    }

    // ========================================================================
    // CONCURRENCY
    // ========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_process_on_shared_id() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 250;

        let registry = registry();
        let cfg = DetectorConfig {
            min_samples: 5,
            retrain_interval: 7,
            window_size: 20,
            ..Default::default()
        };

        std::thread::scope(|scope| {
            for t in 0..THREADS {
                let registry = &registry;
                let cfg = cfg.clone();
                scope.spawn(move || {
                    for i in 0..PER_THREAD {
                        let v = ((t * 31 + i) % 17) as f64;
                        let r = registry.process("shared", &sample([("x", v)]), Some(cfg.clone()));
                        assert!(r.is_ok(), "thread {} sample {}: {:?}", t, i, r);
                    }
                });
            }
        });
        registry.wait_idle().await;

        assert_eq!(registry.len(), 1);
        let stats = registry.stats("shared").unwrap();
        assert_eq!(stats.total_processed, (THREADS * PER_THREAD) as u64);
        assert_eq!(stats.samples_collected, (THREADS * PER_THREAD) as u64);
        assert!(stats.buffer_len <= 20);
        assert_eq!(stats.failed_retrains, 0);
        assert!(stats.model_version >= 1);
        assert_eq!(stats.model_version, stats.retrain_count);
        assert_eq!(stats.status, DetectorStatus::Ready);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reads_race_with_creation() {
        const WRITERS: usize = 4;
        const IDS_PER_WRITER: usize = 50;

        let registry = registry();
        let start = std::sync::Barrier::new(WRITERS * 2);

        std::thread::scope(|scope| {
            for t in 0..WRITERS {
                let (registry, start) = (&registry, &start);
                scope.spawn(move || {
                    start.wait();
                    for i in 0..IDS_PER_WRITER {
                        let id = format!("w{}-{:03}", t, i);
                        registry.get_or_create(&id, Some(small())).unwrap();
                    }
                });
            }
            for t in 0..WRITERS {
                let (registry, start) = (&registry, &start);
                scope.spawn(move || {
                    start.wait();
                    let mut seen = 0;
                    for i in 0..IDS_PER_WRITER * 4 {
                        let list = registry.list();
                        assert!(list.len() >= seen);
                        assert!(list.windows(2).all(|p| p[0].detector_id < p[1].detector_id));
                        seen = list.len();

                        let id = format!("w{}-{:03}", t, i % IDS_PER_WRITER);
                        match registry.get(&id) {
                            Ok(d) => assert_eq!(d.id(), id),
                            Err(e) => assert_eq!(e, DetectorError::NotFound(id)),
                        }
                    }
                });
            }
        });

        assert_eq!(registry.len(), WRITERS * IDS_PER_WRITER);
        for t in 0..WRITERS {
            for i in 0..IDS_PER_WRITER {
                assert!(registry.get(&format!("w{}-{:03}", t, i)).is_ok());
            }
        }
    }
}
