//! Configuration types for Conversary.
//!
//! `AppConfig` represents the top-level `config.toml`. Every field has a
//! default so an empty or partial file is valid.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::model::{DevicePreference, EngineKind};

pub const DEFAULT_MODEL_ID: &str = "phi-4-mini-instruct";
pub const DEFAULT_MODEL_FILENAME: &str = "microsoft_Phi-4-mini-instruct-Q4_K_M.gguf";
pub const DEFAULT_MODEL_URL: &str = "https://huggingface.co/bartowski/microsoft_Phi-4-mini-instruct-GGUF/resolve/main/microsoft_Phi-4-mini-instruct-Q4_K_M.gguf";
pub const DEFAULT_MAX_NEW_TOKENS: u32 = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub llama_server: LlamaServerConfig,

    #[serde(default)]
    pub prompts: PromptConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Static model configuration, fixed when the runtime is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Identifier reported in logs and health checks.
    #[serde(default = "default_model_id")]
    pub id: String,

    /// GGUF file name under `{data_dir}/models/`.
    #[serde(default = "default_model_filename")]
    pub filename: String,

    /// Where to fetch the weights from when they are missing.
    #[serde(default = "default_model_url")]
    pub url: String,

    /// Expected SHA-256 of the weights file (hex). Skipped when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,

    #[serde(default = "default_context_size")]
    pub context_size: u32,

    #[serde(default)]
    pub device: DevicePreference,

    #[serde(default)]
    pub engine: EngineKind,
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

fn default_model_filename() -> String {
    DEFAULT_MODEL_FILENAME.to_string()
}

fn default_model_url() -> String {
    DEFAULT_MODEL_URL.to_string()
}

fn default_max_new_tokens() -> u32 {
    DEFAULT_MAX_NEW_TOKENS
}

fn default_context_size() -> u32 {
    4096
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            id: default_model_id(),
            filename: default_model_filename(),
            url: default_model_url(),
            sha256: None,
            max_new_tokens: default_max_new_tokens(),
            context_size: default_context_size(),
            device: DevicePreference::default(),
            engine: EngineKind::default(),
        }
    }
}

/// Settings for the `llama-server` engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlamaServerConfig {
    /// Path to the `llama-server` binary. Defaults to `{data_dir}/bin/llama-server`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,

    #[serde(default = "default_llama_port")]
    pub port: u16,

    /// Attach to an already running server instead of spawning one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,

    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
}

fn default_llama_port() -> u16 {
    11435
}

fn default_startup_timeout_secs() -> u64 {
    120
}

impl Default for LlamaServerConfig {
    fn default() -> Self {
        Self {
            binary: None,
            port: default_llama_port(),
            external_url: None,
            startup_timeout_secs: default_startup_timeout_secs(),
        }
    }
}

/// Template overrides. Built-in templates are used when unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_path: Option<PathBuf>,
}

/// REST API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Deadline applied around each conversation request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Static frontend directory served as a SPA fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_dir: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
            web_dir: None,
        }
    }
}
