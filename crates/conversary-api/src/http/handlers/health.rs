//! Health endpoint.

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use conversary_types::model::{ComputeDevice, EngineKind};

use crate::http::response::{ApiResponse, new_request_id};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthView {
    pub status: &'static str,
    pub version: &'static str,
    pub model: String,
    pub engine: EngineKind,
    pub model_loaded: bool,
    pub device: Option<ComputeDevice>,
}

/// GET /api/health - Liveness plus model status. Never triggers a load.
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthView>> {
    let start = Instant::now();
    let status = state.runtime.status();

    let view = HealthView {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        model: status.model,
        engine: status.engine,
        model_loaded: status.loaded,
        device: status.device,
    };

    let elapsed = start.elapsed().as_millis() as u64;
    Json(ApiResponse::success(view, new_request_id(), elapsed))
}
