//! Lazily loaded, serialized owner of the inference engine.
//!
//! There is exactly one `ModelRuntime` per process, constructed in the
//! composition root and shared through `Arc`. Loading happens on first use
//! behind a `OnceCell`: concurrent first callers wait on a single load, and
//! a failed load leaves the cell empty so the next call tries again. The
//! load itself runs in a spawned task, so a caller that gives up (a request
//! deadline, a dropped connection) stops waiting without aborting a download
//! or a server startup halfway through.
//!
//! Generation is funneled through a FIFO queue (a fair async mutex). The
//! queue permit moves into a spawned task together with the engine handle,
//! so a pass that has started always runs to completion while holding the
//! permit, even if the caller stops waiting for it.

use std::sync::Arc;
use std::time::Instant;

use conversary_types::error::{GenerationError, ModelLoadError};
use conversary_types::model::{ComputeDevice, EngineKind, ModelStatus, RawGeneration};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, instrument, warn};

use super::engine::{InferenceBackend, InferenceEngine};

/// Static settings fixed when the runtime is constructed.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub model_id: String,
    pub engine: EngineKind,
    pub max_new_tokens: u32,
}

pub struct ModelRuntime<B: InferenceBackend> {
    settings: RuntimeSettings,
    backend: Arc<B>,
    engine: Arc<OnceCell<Arc<B::Engine>>>,
    queue: Arc<Mutex<()>>,
}

impl<B: InferenceBackend> ModelRuntime<B> {
    pub fn new(backend: B, settings: RuntimeSettings) -> Self {
        Self {
            settings,
            backend: Arc::new(backend),
            engine: Arc::new(OnceCell::new()),
            queue: Arc::new(Mutex::new(())),
        }
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Load the model if it is not loaded yet. Subsequent calls are no-ops.
    pub async fn ensure_loaded(&self) -> Result<(), ModelLoadError> {
        if self.engine.initialized() {
            return Ok(());
        }

        let backend = Arc::clone(&self.backend);
        let cell = Arc::clone(&self.engine);
        let model_id = self.settings.model_id.clone();
        let engine_kind = self.settings.engine;

        // Callers racing here each spawn a task, but the cell lets only one
        // of them run `load`; the rest wait for its result.
        let task = tokio::spawn(async move {
            cell.get_or_try_init(|| async {
                let start = Instant::now();
                info!(model = %model_id, engine = %engine_kind, "Loading model");
                match backend.load().await {
                    Ok(engine) => {
                        info!(
                            model = %model_id,
                            device = %engine.device(),
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "Model loaded"
                        );
                        Ok(Arc::new(engine))
                    }
                    Err(e) => {
                        warn!(model = %model_id, error = %e, "Model load failed");
                        Err(e)
                    }
                }
            })
            .await
            .map(|_| ())
        });

        match task.await {
            Ok(result) => result,
            Err(e) => Err(ModelLoadError::Backend(format!("model load task failed: {e}"))),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.initialized()
    }

    /// Device of the loaded engine, if any.
    pub fn device(&self) -> Option<&ComputeDevice> {
        self.engine.get().map(|engine| engine.device())
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            model: self.settings.model_id.clone(),
            engine: self.settings.engine,
            loaded: self.is_loaded(),
            device: self.device().cloned(),
        }
    }

    /// Generate with the configured `max_new_tokens` bound.
    pub async fn generate(&self, prompt: &str) -> Result<RawGeneration, GenerationError> {
        self.generate_with_limit(prompt, self.settings.max_new_tokens)
            .await
    }

    /// Run one generation pass. Waits for any pass already in flight.
    ///
    /// Fails with [`GenerationError::NotLoaded`] when `ensure_loaded` has not
    /// succeeded yet.
    #[instrument(skip_all, fields(prompt_len = prompt.len(), max_new_tokens = max_new_tokens))]
    pub async fn generate_with_limit(
        &self,
        prompt: &str,
        max_new_tokens: u32,
    ) -> Result<RawGeneration, GenerationError> {
        let engine = self.engine.get().cloned().ok_or(GenerationError::NotLoaded)?;

        let queued_at = Instant::now();
        let permit = Arc::clone(&self.queue).lock_owned().await;
        debug!(
            waited_ms = queued_at.elapsed().as_millis() as u64,
            "Generation slot acquired"
        );

        let prompt = prompt.to_owned();
        let task = tokio::spawn(async move {
            let _permit = permit;
            engine.generate(&prompt, max_new_tokens).await
        });

        match task.await {
            Ok(result) => result,
            Err(e) => Err(GenerationError::Backend(format!(
                "generation task failed: {e}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, settings};
    use std::time::Duration;

    #[tokio::test]
    async fn test_generate_before_load_is_rejected() {
        let runtime = ModelRuntime::new(FakeBackend::echoing(), settings());
        let err = runtime.generate("hello").await.unwrap_err();
        assert!(matches!(err, GenerationError::NotLoaded));
    }

    #[tokio::test]
    async fn test_ensure_loaded_is_idempotent() {
        let backend = FakeBackend::echoing();
        let counters = backend.counters();
        let runtime = ModelRuntime::new(backend, settings());

        runtime.ensure_loaded().await.unwrap();
        runtime.ensure_loaded().await.unwrap();
        runtime.ensure_loaded().await.unwrap();

        assert!(runtime.is_loaded());
        assert_eq!(counters.loads(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_loads_once() {
        let backend = FakeBackend::echoing().with_load_delay(Duration::from_millis(50));
        let counters = backend.counters();
        let runtime = Arc::new(ModelRuntime::new(backend, settings()));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let runtime = Arc::clone(&runtime);
            handles.push(tokio::spawn(async move { runtime.ensure_loaded().await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(counters.loads(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_leaves_runtime_loadable() {
        let backend = FakeBackend::echoing().failing_loads(1);
        let counters = backend.counters();
        let runtime = ModelRuntime::new(backend, settings());

        let err = runtime.ensure_loaded().await.unwrap_err();
        assert!(matches!(err, ModelLoadError::WeightsUnavailable(_)));
        assert!(!runtime.is_loaded());
        assert!(runtime.status().device.is_none());

        runtime.ensure_loaded().await.unwrap();
        assert!(runtime.is_loaded());
        assert_eq!(counters.loads(), 2);
    }

    #[tokio::test]
    async fn test_status_reports_device_after_load() {
        let runtime = ModelRuntime::new(FakeBackend::echoing(), settings());
        assert!(!runtime.status().loaded);

        runtime.ensure_loaded().await.unwrap();
        let status = runtime.status();
        assert!(status.loaded);
        assert_eq!(status.model, "fake-model");
        assert_eq!(status.device, Some(ComputeDevice::cpu()));
    }

    #[tokio::test]
    async fn test_generate_uses_configured_token_bound() {
        let backend = FakeBackend::echoing();
        let counters = backend.counters();
        let runtime = ModelRuntime::new(backend, settings());
        runtime.ensure_loaded().await.unwrap();

        runtime.generate("hi").await.unwrap();
        runtime.generate_with_limit("hi", 7).await.unwrap();

        assert_eq!(counters.token_limits(), vec![100, 7]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_generation_is_serialized() {
        let backend = FakeBackend::echoing().with_generate_delay(Duration::from_millis(20));
        let counters = backend.counters();
        let runtime = Arc::new(ModelRuntime::new(backend, settings()));
        runtime.ensure_loaded().await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let runtime = Arc::clone(&runtime);
            handles.push(tokio::spawn(async move {
                runtime.generate(&format!("prompt {i}")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(counters.generations(), 8);
        assert_eq!(counters.max_in_flight(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_abandoned_generation_still_holds_the_queue() {
        let backend = FakeBackend::echoing().with_generate_delay(Duration::from_millis(150));
        let counters = backend.counters();
        let runtime = Arc::new(ModelRuntime::new(backend, settings()));
        runtime.ensure_loaded().await.unwrap();

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), runtime.generate("slow")).await;
        assert!(abandoned.is_err());

        runtime.generate("next").await.unwrap();

        assert_eq!(counters.generations(), 2);
        assert_eq!(counters.max_in_flight(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_abandoned_load_keeps_running() {
        let backend = FakeBackend::echoing().with_load_delay(Duration::from_millis(200));
        let counters = backend.counters();
        let runtime = ModelRuntime::new(backend, settings());

        let first =
            tokio::time::timeout(Duration::from_millis(120), runtime.ensure_loaded()).await;
        assert!(first.is_err());
        assert!(!runtime.is_loaded());

        // Later callers join the load already in flight instead of starting over.
        for _ in 0..2 {
            let _ = tokio::time::timeout(Duration::from_millis(120), runtime.ensure_loaded()).await;
        }
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(runtime.is_loaded());
        assert_eq!(counters.loads(), 1);

        runtime.ensure_loaded().await.unwrap();
        assert_eq!(counters.loads(), 1);
    }
}
