//! In-process llama.cpp engine (feature `llama-cpp`).
//!
//! Weights are loaded through `llama-cpp-2` on a blocking thread. Every
//! generation creates a fresh context, prefills the prompt, and decodes
//! greedily up to the new-token bound. The returned text is the whole
//! sequence (detokenized prompt followed by the continuation), with the
//! detokenized prompt reported as the echo.

use std::num::NonZeroU32;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use conversary_types::config::ModelConfig;
use conversary_types::error::{GenerationError, ModelLoadError};
use conversary_types::model::{ComputeDevice, DevicePreference, RawGeneration};
use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;
use llama_cpp_2::{LlamaBackendDeviceType, list_llama_ggml_backend_devices};
use tracing::info;

use super::device::resolve_device;
use super::model_store::ModelStore;

/// llama.cpp may only be initialized once per process.
static BACKEND: OnceLock<LlamaBackend> = OnceLock::new();

fn backend() -> Result<&'static LlamaBackend, ModelLoadError> {
    if let Some(backend) = BACKEND.get() {
        return Ok(backend);
    }
    let backend = LlamaBackend::init()
        .map_err(|e| ModelLoadError::Backend(format!("failed to initialize llama.cpp: {e}")))?;
    Ok(BACKEND.get_or_init(|| backend))
}

/// First accelerator llama.cpp reports, if any.
fn detect_ggml_accelerator() -> Option<String> {
    list_llama_ggml_backend_devices()
        .into_iter()
        .find(|d| {
            matches!(
                d.device_type,
                LlamaBackendDeviceType::Gpu
                    | LlamaBackendDeviceType::IntegratedGpu
                    | LlamaBackendDeviceType::Accelerator
            )
        })
        .map(|d| d.name)
}

pub struct LlamaCppBackend {
    model: ModelConfig,
    store: ModelStore,
    show_progress: bool,
}

impl LlamaCppBackend {
    pub fn new(data_dir: &Path, model: ModelConfig) -> Self {
        Self {
            model,
            store: ModelStore::new(data_dir),
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    pub async fn load(&self) -> Result<LlamaCppEngine, ModelLoadError> {
        let model_path = self
            .store
            .ensure_available(&self.model, self.show_progress)
            .await?;
        let preference = self.model.device;
        let context_size = self.model.context_size;

        tokio::task::spawn_blocking(move || load_model_sync(&model_path, preference, context_size))
            .await
            .map_err(|e| ModelLoadError::Backend(format!("model load task failed: {e}")))?
    }
}

fn load_model_sync(
    model_path: &Path,
    preference: DevicePreference,
    context_size: u32,
) -> Result<LlamaCppEngine, ModelLoadError> {
    let backend = backend()?;
    let device = resolve_device(preference, detect_ggml_accelerator())?;

    info!(path = %model_path.display(), device = %device, "Loading GGUF model in-process");

    let params = LlamaModelParams::default().with_n_gpu_layers(device.gpu_layers());
    let model = LlamaModel::load_from_file(backend, model_path, &params).map_err(|e| {
        let message = e.to_string();
        if message.to_lowercase().contains("memory") {
            ModelLoadError::OutOfMemory(message)
        } else {
            ModelLoadError::IncompatibleFormat(message)
        }
    })?;

    Ok(LlamaCppEngine {
        model: Arc::new(model),
        device,
        context_size,
    })
}

pub struct LlamaCppEngine {
    model: Arc<LlamaModel>,
    device: ComputeDevice,
    context_size: u32,
}

impl LlamaCppEngine {
    pub fn device(&self) -> &ComputeDevice {
        &self.device
    }

    pub async fn generate(
        &self,
        prompt: &str,
        max_new_tokens: u32,
    ) -> Result<RawGeneration, GenerationError> {
        let model = Arc::clone(&self.model);
        let prompt = prompt.to_owned();
        let context_size = self.context_size;

        tokio::task::spawn_blocking(move || {
            generate_sync(&model, &prompt, max_new_tokens, context_size)
        })
        .await
        .map_err(|e| GenerationError::Backend(format!("generation task failed: {e}")))?
    }
}

fn backend_error(what: &str, e: impl std::fmt::Display) -> GenerationError {
    GenerationError::Backend(format!("{what}: {e}"))
}

fn generate_sync(
    model: &LlamaModel,
    prompt: &str,
    max_new_tokens: u32,
    context_size: u32,
) -> Result<RawGeneration, GenerationError> {
    let backend = BACKEND.get().ok_or(GenerationError::NotLoaded)?;

    let tokens = model
        .str_to_token(prompt, AddBos::Always)
        .map_err(|e| backend_error("tokenization failed", e))?;
    let prompt_tokens = u32::try_from(tokens.len()).unwrap_or(u32::MAX);

    if exceeds_context(prompt_tokens, max_new_tokens, context_size) {
        return Err(GenerationError::ContextOverflow {
            prompt_tokens,
            context_size,
        });
    }

    let ctx_params = LlamaContextParams::default().with_n_ctx(NonZeroU32::new(context_size));
    let mut ctx = model.new_context(backend, ctx_params).map_err(|e| {
        let message = e.to_string();
        if message.to_lowercase().contains("memory") {
            GenerationError::OutOfMemory(message)
        } else {
            backend_error("failed to create context", message)
        }
    })?;

    let mut batch = LlamaBatch::new(tokens.len().max(1), 1);
    let last = tokens.len().saturating_sub(1);
    for (pos, token) in tokens.iter().enumerate() {
        batch
            .add(*token, pos as i32, &[0], pos == last)
            .map_err(|e| backend_error("failed to add token to batch", e))?;
    }
    ctx.decode(&mut batch)
        .map_err(|e| backend_error("prompt decode failed", e))?;

    let mut sampler = LlamaSampler::greedy();
    let mut output_tokens = Vec::new();
    let mut position = tokens.len() as i32;

    for _ in 0..max_new_tokens {
        let token = sampler.sample(&ctx, -1);
        sampler.accept(token);
        if model.is_eog_token(token) {
            break;
        }
        output_tokens.push(token);

        batch.clear();
        batch
            .add(token, position, &[0], true)
            .map_err(|e| backend_error("failed to add token", e))?;
        ctx.decode(&mut batch)
            .map_err(|e| backend_error("decode failed", e))?;
        position += 1;
    }

    let prompt_echo = model
        .tokens_to_str(&tokens, Special::Plaintext)
        .map_err(|e| backend_error("failed to detokenize prompt", e))?;
    let continuation = model
        .tokens_to_str(&output_tokens, Special::Plaintext)
        .map_err(|e| backend_error("failed to detokenize output", e))?;

    Ok(RawGeneration {
        text: format!("{prompt_echo}{continuation}"),
        prompt_echo: Some(prompt_echo),
        prompt_tokens,
        completion_tokens: output_tokens.len() as u32,
    })
}

/// Whether the prompt plus the requested continuation overruns the context.
fn exceeds_context(prompt_tokens: u32, max_new_tokens: u32, context_size: u32) -> bool {
    prompt_tokens.saturating_add(max_new_tokens) > context_size
}
