//! Model runtime: the single owner of the loaded inference engine.
//!
//! - `InferenceBackend` / `InferenceEngine`: ports implemented in conversary-infra
//! - `ModelRuntime`: load-once lifecycle plus the FIFO generation queue

pub mod engine;
pub mod model_runtime;

pub use engine::{InferenceBackend, InferenceEngine};
pub use model_runtime::{ModelRuntime, RuntimeSettings};
