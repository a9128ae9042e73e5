//! `conversary model`: download weights and inspect the model setup.

use anyhow::Result;
use console::style;
use serde::Serialize;

use conversary_infra::llm::device::detect_accelerator;
use conversary_types::model::{DevicePreference, EngineKind};

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct ModelInfo {
    id: String,
    engine: EngineKind,
    filename: String,
    path: String,
    installed: bool,
    size_bytes: Option<u64>,
    max_new_tokens: u32,
    context_size: u32,
    device_preference: DevicePreference,
    accelerator: Option<String>,
}

/// Download the configured weights. Already installed weights are kept
/// unless `force` is set.
pub async fn pull(state: &AppState, force: bool, json: bool, quiet: bool) -> Result<()> {
    let store = state.runtime.backend().store();
    let model = &state.config.model;
    let show_progress = !json && !quiet;

    let path = if force || !store.is_installed(model) {
        store.download(model, show_progress).await?
    } else {
        store.path_for(model)
    };

    if json {
        let out = serde_json::json!({
            "id": model.id,
            "path": path.display().to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if !quiet {
        println!();
        println!(
            "  {} {} ready at {}",
            style("✓").green().bold(),
            style(&model.id).cyan(),
            style(path.display()).dim()
        );
        println!();
    }
    Ok(())
}

pub async fn info(state: &AppState, json: bool) -> Result<()> {
    let store = state.runtime.backend().store();
    let model = &state.config.model;
    let path = store.path_for(model);

    let size_bytes = store
        .list_installed()
        .await?
        .into_iter()
        .find(|installed| installed.filename == model.filename)
        .map(|installed| installed.size_bytes);

    let info = ModelInfo {
        id: model.id.clone(),
        engine: model.engine,
        filename: model.filename.clone(),
        path: path.display().to_string(),
        installed: size_bytes.is_some(),
        size_bytes,
        max_new_tokens: model.max_new_tokens,
        context_size: model.context_size,
        device_preference: model.device,
        accelerator: detect_accelerator(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let check = |ok: bool| {
        if ok {
            format!("{}", style("✓").green())
        } else {
            format!("{}", style("✗").red())
        }
    };

    println!();
    println!("  {}  {}", style("Model:").bold(), style(&info.id).cyan());
    println!("  {}  {}", style("Engine:").bold(), info.engine);
    println!("  {}  {}", style("File:").bold(), style(&info.path).dim());
    match info.size_bytes {
        Some(bytes) => println!("  {} Installed ({})", check(true), format_size(bytes)),
        None => println!(
            "  {} Not installed (run {})",
            check(false),
            style("conversary model pull").yellow()
        ),
    }
    println!(
        "  {}  {} (max {} new tokens)",
        style("Context:").bold(),
        info.context_size,
        info.max_new_tokens
    );
    println!(
        "  {}  {} preference, accelerator: {}",
        style("Device:").bold(),
        info.device_preference,
        info.accelerator.as_deref().unwrap_or("none")
    );
    println!();
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    let bytes = bytes as f64;
    if bytes >= GIB {
        format!("{:.1} GiB", bytes / GIB)
    } else {
        format!("{:.1} MiB", bytes / MIB)
    }
}
