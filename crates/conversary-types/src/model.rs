//! Model runtime descriptors: device selection, engine kind, and the raw
//! output of a generation pass.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which compute device the operator wants inference to run on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// Fastest available accelerator, falling back to CPU.
    #[default]
    Auto,
    Cpu,
    Gpu,
}

impl fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DevicePreference::Auto => write!(f, "auto"),
            DevicePreference::Cpu => write!(f, "cpu"),
            DevicePreference::Gpu => write!(f, "gpu"),
        }
    }
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(DevicePreference::Auto),
            "cpu" => Ok(DevicePreference::Cpu),
            "gpu" => Ok(DevicePreference::Gpu),
            other => Err(format!("invalid device preference: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Cpu,
    Gpu,
}

/// The device a loaded model is running on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeDevice {
    pub kind: DeviceKind,
    /// Backend-reported device name (e.g. "Metal", "CUDA0", "CPU").
    pub name: String,
}

impl ComputeDevice {
    pub fn cpu() -> Self {
        Self {
            kind: DeviceKind::Cpu,
            name: "CPU".to_string(),
        }
    }

    pub fn gpu(name: impl Into<String>) -> Self {
        Self {
            kind: DeviceKind::Gpu,
            name: name.into(),
        }
    }

    pub fn is_accelerated(&self) -> bool {
        self.kind == DeviceKind::Gpu
    }

    /// Layers to offload: everything on an accelerator, nothing on CPU.
    pub fn gpu_layers(&self) -> u32 {
        match self.kind {
            DeviceKind::Gpu => 999,
            DeviceKind::Cpu => 0,
        }
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DeviceKind::Cpu => write!(f, "cpu ({})", self.name),
            DeviceKind::Gpu => write!(f, "gpu ({})", self.name),
        }
    }
}

/// Inference engine implementation backing the model runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    /// A managed (or attached) llama.cpp `llama-server` process.
    #[default]
    LlamaServer,
    /// In-process llama.cpp bindings (requires the `llama-cpp` feature).
    LlamaCpp,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::LlamaServer => write!(f, "llama-server"),
            EngineKind::LlamaCpp => write!(f, "llama-cpp"),
        }
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "llama-server" => Ok(EngineKind::LlamaServer),
            "llama-cpp" => Ok(EngineKind::LlamaCpp),
            other => Err(format!("invalid engine: '{other}'")),
        }
    }
}

/// Unprocessed output of one generation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGeneration {
    /// Decoded output. Engines that decode the whole sequence return the
    /// prompt followed by the continuation here.
    pub text: String,
    /// The engine's own detokenized rendering of the prompt, when it has
    /// one. May differ from the submitted prompt in whitespace.
    pub prompt_echo: Option<String>,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl RawGeneration {
    /// Output that carries no echo information.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            prompt_echo: None,
            prompt_tokens: 0,
            completion_tokens: 0,
        }
    }
}

/// Snapshot of runtime state for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub model: String,
    pub engine: EngineKind,
    pub loaded: bool,
    pub device: Option<ComputeDevice>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_preference_parse() {
        assert_eq!("GPU".parse::<DevicePreference>().unwrap(), DevicePreference::Gpu);
        assert!("tpu".parse::<DevicePreference>().is_err());
    }

    #[test]
    fn test_engine_kind_serde() {
        let json = serde_json::to_string(&EngineKind::LlamaServer).unwrap();
        assert_eq!(json, "\"llama-server\"");
        let parsed: EngineKind = serde_json::from_str("\"llama-cpp\"").unwrap();
        assert_eq!(parsed, EngineKind::LlamaCpp);
    }

    #[test]
    fn test_gpu_layers_follow_device() {
        assert_eq!(ComputeDevice::cpu().gpu_layers(), 0);
        assert_eq!(ComputeDevice::gpu("Metal").gpu_layers(), 999);
        assert!(ComputeDevice::gpu("CUDA0").is_accelerated());
    }
}
