//! Inference backend and engine traits.
//!
//! A backend knows how to bring a model up (fetch weights, pick a device,
//! start the engine). The engine it produces performs generation. Both use
//! native async fn in traits (RPITIT, Rust 2024 edition); implementations
//! live in conversary-infra.

use conversary_types::error::{GenerationError, ModelLoadError};
use conversary_types::model::{ComputeDevice, RawGeneration};

/// Produces a ready-to-use [`InferenceEngine`].
pub trait InferenceBackend: Send + Sync + 'static {
    type Engine: InferenceEngine;

    /// Select a device and load tokenizer and weights.
    ///
    /// Called at most once per successful load by `ModelRuntime`. A failure
    /// must leave no partial state behind that would prevent a retry.
    fn load(&self) -> impl std::future::Future<Output = Result<Self::Engine, ModelLoadError>> + Send;
}

/// A loaded model able to run generation passes.
///
/// Engines are not required to be reentrant: `ModelRuntime` never calls
/// `generate` on the same engine concurrently.
pub trait InferenceEngine: Send + Sync + 'static {
    /// Device the weights were placed on.
    fn device(&self) -> &ComputeDevice;

    /// Run one autoregressive pass bounded by `max_new_tokens`.
    fn generate(
        &self,
        prompt: &str,
        max_new_tokens: u32,
    ) -> impl std::future::Future<Output = Result<RawGeneration, GenerationError>> + Send;
}
