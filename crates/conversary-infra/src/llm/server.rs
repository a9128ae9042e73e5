//! llama.cpp `llama-server` engine.
//!
//! The backend either spawns a private `llama-server` process bound to
//! localhost or attaches to an external one (`llama_server.external_url`).
//! Generation goes through the native `/completion` endpoint with
//! `n_predict` as the new-token bound. The endpoint returns only the
//! continuation, so there is no prompt echo to strip.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use conversary_types::config::{LlamaServerConfig, ModelConfig};
use conversary_types::error::{GenerationError, ModelLoadError};
use conversary_types::model::{ComputeDevice, RawGeneration};
use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::device::select_device;
use super::model_store::ModelStore;
use crate::config::resolve_path;

const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct LlamaServerBackend {
    data_dir: PathBuf,
    model: ModelConfig,
    server: LlamaServerConfig,
    store: ModelStore,
    client: reqwest::Client,
    show_progress: bool,
}

impl LlamaServerBackend {
    pub fn new(data_dir: &Path, model: ModelConfig, server: LlamaServerConfig) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            model,
            server,
            store: ModelStore::new(data_dir),
            client: reqwest::Client::new(),
            show_progress: false,
        }
    }

    /// Show a terminal progress bar when weights have to be downloaded.
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

    /// Whether `load` would fetch weights before starting. An external
    /// server brings its own model.
    pub fn needs_download(&self) -> bool {
        self.server.external_url.is_none() && !self.store.is_installed(&self.model)
    }

    /// The `llama-server` binary to spawn: the configured path, else
    /// `{data_dir}/bin/llama-server`, else the first match on `PATH`.
    pub fn binary_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.server.binary {
            return Some(resolve_path(&self.data_dir, path));
        }

        let name = if cfg!(target_os = "windows") {
            "llama-server.exe"
        } else {
            "llama-server"
        };
        let bundled = self.data_dir.join("bin").join(name);
        if bundled.is_file() {
            return Some(bundled);
        }

        std::env::var_os("PATH").and_then(|paths| {
            std::env::split_paths(&paths)
                .map(|dir| dir.join(name))
                .find(|candidate| candidate.is_file())
        })
    }

    pub async fn load(&self) -> Result<LlamaServerEngine, ModelLoadError> {
        let timeout = Duration::from_secs(self.server.startup_timeout_secs);

        if let Some(url) = &self.server.external_url {
            let base_url = url.trim_end_matches('/').to_string();
            let device = select_device(self.model.device)?;
            info!(url = %base_url, "Attaching to external llama-server");

            wait_ready(&self.client, &base_url, timeout, None)
                .await
                .map_err(|failure| failure.into_load_error(&base_url, "", timeout))?;

            return Ok(LlamaServerEngine {
                client: self.client.clone(),
                base_url,
                device,
                context_size: self.model.context_size,
                process: None,
            });
        }

        let model_path = self
            .store
            .ensure_available(&self.model, self.show_progress)
            .await?;
        let device = select_device(self.model.device)?;
        let binary = self.binary_path().ok_or_else(|| {
            ModelLoadError::Backend(
                "llama-server binary not found; install llama.cpp or set [llama_server].binary"
                    .to_string(),
            )
        })?;

        let log_dir = self.data_dir.join("logs");
        tokio::fs::create_dir_all(&log_dir)
            .await
            .map_err(|e| ModelLoadError::Backend(format!("{}: {e}", log_dir.display())))?;
        let log_path = log_dir.join("llama-server.log");
        let stdout_log = tokio::fs::File::create(&log_path)
            .await
            .map_err(|e| ModelLoadError::Backend(format!("{}: {e}", log_path.display())))?
            .into_std()
            .await;
        let stderr_log = stdout_log
            .try_clone()
            .map_err(|e| ModelLoadError::Backend(format!("{}: {e}", log_path.display())))?;

        let port = self.server.port;
        info!(
            binary = %binary.display(),
            model = %model_path.display(),
            port,
            device = %device,
            "Starting llama-server"
        );

        let mut child = Command::new(&binary)
            .arg("--model")
            .arg(&model_path)
            .arg("--host")
            .arg("127.0.0.1")
            .arg("--port")
            .arg(port.to_string())
            .arg("--ctx-size")
            .arg(self.model.context_size.to_string())
            .arg("--n-gpu-layers")
            .arg(device.gpu_layers().to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_log))
            .stderr(Stdio::from(stderr_log))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ModelLoadError::Backend(format!("failed to start {}: {e}", binary.display()))
            })?;
        debug!(pid = ?child.id(), "llama-server process spawned");

        let base_url = format!("http://127.0.0.1:{port}");
        if let Err(failure) = wait_ready(&self.client, &base_url, timeout, Some(&mut child)).await {
            if let Err(e) = child.start_kill() {
                debug!(error = %e, "llama-server already gone");
            }
            let log = tokio::fs::read_to_string(&log_path).await.unwrap_or_default();
            return Err(failure.into_load_error(&base_url, &log, timeout));
        }

        Ok(LlamaServerEngine {
            client: self.client.clone(),
            base_url,
            device,
            context_size: self.model.context_size,
            process: Some(Mutex::new(child)),
        })
    }
}

/// A ready `llama-server`. A spawned process is killed when the engine drops.
#[derive(Debug)]
pub struct LlamaServerEngine {
    client: reqwest::Client,
    base_url: String,
    device: ComputeDevice,
    context_size: u32,
    process: Option<Mutex<Child>>,
}

impl LlamaServerEngine {
    pub fn device(&self) -> &ComputeDevice {
        &self.device
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_managed(&self) -> bool {
        self.process.is_some()
    }

    pub async fn generate(
        &self,
        prompt: &str,
        max_new_tokens: u32,
    ) -> Result<RawGeneration, GenerationError> {
        let request = CompletionRequest {
            prompt,
            n_predict: max_new_tokens,
            cache_prompt: true,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/completion", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                GenerationError::Backend(format!("llama-server unreachable at {}: {e}", self.base_url))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_error_response(status.as_u16(), &body, self.context_size));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Backend(format!("invalid completion response: {e}")))?;

        if completion.truncated {
            warn!(
                prompt_tokens = completion.tokens_evaluated,
                context_size = self.context_size,
                "llama-server truncated the prompt"
            );
            return Err(GenerationError::ContextOverflow {
                prompt_tokens: completion.tokens_evaluated,
                context_size: self.context_size,
            });
        }

        Ok(RawGeneration {
            text: completion.content,
            prompt_echo: None,
            prompt_tokens: completion.tokens_evaluated,
            completion_tokens: completion.tokens_predicted,
        })
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    n_predict: u32,
    cache_prompt: bool,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    content: String,
    #[serde(default)]
    tokens_evaluated: u32,
    #[serde(default)]
    tokens_predicted: u32,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    n_prompt_tokens: Option<u32>,
    #[serde(default)]
    n_ctx: Option<u32>,
}

fn map_error_response(status: u16, body: &str, context_size: u32) -> GenerationError {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return GenerationError::Backend(format!("llama-server returned {status}: {body}"));
    };
    let error = envelope.error;

    if error.kind.as_deref() == Some("exceed_context_size_error") {
        return GenerationError::ContextOverflow {
            prompt_tokens: error.n_prompt_tokens.unwrap_or(0),
            context_size: error.n_ctx.unwrap_or(context_size),
        };
    }
    if is_out_of_memory(&error.message) {
        return GenerationError::OutOfMemory(error.message);
    }
    GenerationError::Backend(format!("llama-server returned {status}: {}", error.message))
}

fn is_out_of_memory(text: &str) -> bool {
    let text = text.to_lowercase();
    text.contains("out of memory") || text.contains("failed to allocate")
}

enum StartupFailure {
    Exited(String),
    TimedOut,
}

impl StartupFailure {
    fn into_load_error(self, base_url: &str, log: &str, timeout: Duration) -> ModelLoadError {
        match self {
            StartupFailure::TimedOut => ModelLoadError::Backend(format!(
                "llama-server at {base_url} not ready after {}s",
                timeout.as_secs()
            )),
            StartupFailure::Exited(status) => classify_startup_failure(&status, log),
        }
    }
}

/// Map a llama-server that exited during startup to a load error, using
/// what it wrote to its log.
fn classify_startup_failure(status: &str, log: &str) -> ModelLoadError {
    let last_line = log
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no output")
        .to_string();
    let lower = log.to_lowercase();

    if is_out_of_memory(&lower) {
        ModelLoadError::OutOfMemory(last_line)
    } else if lower.contains("invalid magic")
        || lower.contains("unknown model architecture")
        || lower.contains("failed to load model")
    {
        ModelLoadError::IncompatibleFormat(last_line)
    } else {
        ModelLoadError::Backend(format!("llama-server exited ({status}): {last_line}"))
    }
}

async fn wait_ready(
    client: &reqwest::Client,
    base_url: &str,
    timeout: Duration,
    mut child: Option<&mut Child>,
) -> Result<(), StartupFailure> {
    let start = Instant::now();
    debug!(url = %base_url, "Waiting for llama-server to become ready");

    loop {
        if let Some(child) = child.as_deref_mut() {
            if let Ok(Some(status)) = child.try_wait() {
                return Err(StartupFailure::Exited(status.to_string()));
            }
        }

        if check_health(client, base_url).await {
            info!(
                url = %base_url,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "llama-server is ready"
            );
            return Ok(());
        }

        if start.elapsed() >= timeout {
            return Err(StartupFailure::TimedOut);
        }
        tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
    }
}

/// `/health` answers 503 while the model is still loading.
async fn check_health(client: &reqwest::Client, base_url: &str) -> bool {
    client
        .get(format!("{base_url}/health"))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .map(|response| response.status().is_success())
        .unwrap_or(false)
}
