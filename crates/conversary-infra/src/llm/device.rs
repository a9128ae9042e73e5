//! Compute device selection for the llama-server engine.
//!
//! llama.cpp picks its backend at build time, so detection here only has to
//! answer whether an accelerator is present for offloading layers.

use std::path::Path;

use conversary_types::error::ModelLoadError;
use conversary_types::model::{ComputeDevice, DevicePreference};

/// Name of the accelerator visible to this host, if any.
pub fn detect_accelerator() -> Option<String> {
    if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
        return Some("Metal".to_string());
    }
    if Path::new("/proc/driver/nvidia/version").exists() {
        return Some("CUDA".to_string());
    }
    None
}

/// Apply `preference` to what the host offers.
///
/// `Auto` prefers the accelerator and falls back to CPU. `Gpu` fails when
/// there is no accelerator instead of silently running on CPU.
pub fn resolve_device(
    preference: DevicePreference,
    accelerator: Option<String>,
) -> Result<ComputeDevice, ModelLoadError> {
    match (preference, accelerator) {
        (DevicePreference::Cpu, _) => Ok(ComputeDevice::cpu()),
        (DevicePreference::Auto, Some(name)) | (DevicePreference::Gpu, Some(name)) => {
            Ok(ComputeDevice::gpu(name))
        }
        (DevicePreference::Auto, None) => Ok(ComputeDevice::cpu()),
        (DevicePreference::Gpu, None) => Err(ModelLoadError::Device(
            "GPU requested but no accelerator was detected".to_string(),
        )),
    }
}

pub fn select_device(preference: DevicePreference) -> Result<ComputeDevice, ModelLoadError> {
    let device = resolve_device(preference, detect_accelerator())?;
    tracing::debug!(%preference, %device, "Compute device selected");
    Ok(device)
}
