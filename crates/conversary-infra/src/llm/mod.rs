//! Local inference: the GGUF model store, device selection, and the engines
//! that implement `InferenceBackend` / `InferenceEngine` from conversary-core.
//!
//! `LocalBackend` is chosen from `[model].engine` at startup and dispatches
//! to the concrete engine, so the composition root can name one type.

pub mod device;
#[cfg(feature = "llama-cpp")]
pub mod llama_cpp;
pub mod model_store;
pub mod server;

use std::path::Path;

use conversary_core::runtime::{InferenceBackend, InferenceEngine};
use conversary_types::config::{AppConfig, ModelConfig};
use conversary_types::error::{GenerationError, ModelLoadError};
use conversary_types::model::{ComputeDevice, EngineKind, RawGeneration};

pub use model_store::ModelStore;
pub use server::{LlamaServerBackend, LlamaServerEngine};

pub enum LocalBackend {
    Server(LlamaServerBackend),
    #[cfg(feature = "llama-cpp")]
    LlamaCpp(llama_cpp::LlamaCppBackend),
}

impl LocalBackend {
    /// Build the backend named by `config.model.engine`.
    pub fn from_config(
        data_dir: &Path,
        config: &AppConfig,
        show_progress: bool,
    ) -> Result<Self, ModelLoadError> {
        match config.model.engine {
            EngineKind::LlamaServer => Ok(Self::Server(
                LlamaServerBackend::new(data_dir, config.model.clone(), config.llama_server.clone())
                    .with_progress(show_progress),
            )),
            #[cfg(feature = "llama-cpp")]
            EngineKind::LlamaCpp => Ok(Self::LlamaCpp(
                llama_cpp::LlamaCppBackend::new(data_dir, config.model.clone())
                    .with_progress(show_progress),
            )),
            #[cfg(not(feature = "llama-cpp"))]
            EngineKind::LlamaCpp => Err(ModelLoadError::Backend(
                "engine 'llama-cpp' requires a build with the `llama-cpp` feature".to_string(),
            )),
        }
    }

    pub fn store(&self) -> &ModelStore {
        match self {
            Self::Server(backend) => backend.store(),
            #[cfg(feature = "llama-cpp")]
            Self::LlamaCpp(backend) => backend.store(),
        }
    }

    pub fn model(&self) -> &ModelConfig {
        match self {
            Self::Server(backend) => backend.model(),
            #[cfg(feature = "llama-cpp")]
            Self::LlamaCpp(backend) => backend.model(),
        }
    }

    /// Whether the first load starts with a weights download.
    pub fn needs_download(&self) -> bool {
        match self {
            Self::Server(backend) => backend.needs_download(),
            #[cfg(feature = "llama-cpp")]
            Self::LlamaCpp(backend) => !backend.store().is_installed(backend.model()),
        }
    }
}

impl InferenceBackend for LocalBackend {
    type Engine = LocalEngine;

    async fn load(&self) -> Result<LocalEngine, ModelLoadError> {
        match self {
            Self::Server(backend) => backend.load().await.map(LocalEngine::Server),
            #[cfg(feature = "llama-cpp")]
            Self::LlamaCpp(backend) => backend.load().await.map(LocalEngine::LlamaCpp),
        }
    }
}

pub enum LocalEngine {
    Server(LlamaServerEngine),
    #[cfg(feature = "llama-cpp")]
    LlamaCpp(llama_cpp::LlamaCppEngine),
}

impl InferenceEngine for LocalEngine {
    fn device(&self) -> &ComputeDevice {
        match self {
            Self::Server(engine) => engine.device(),
            #[cfg(feature = "llama-cpp")]
            Self::LlamaCpp(engine) => engine.device(),
        }
    }

    async fn generate(
        &self,
        prompt: &str,
        max_new_tokens: u32,
    ) -> Result<RawGeneration, GenerationError> {
        match self {
            Self::Server(engine) => engine.generate(prompt, max_new_tokens).await,
            #[cfg(feature = "llama-cpp")]
            Self::LlamaCpp(engine) => engine.generate(prompt, max_new_tokens).await,
        }
    }
}
