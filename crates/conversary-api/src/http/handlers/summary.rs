//! Daily summary handlers.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;

use conversary_types::conversation::DailySummary;

use crate::http::error::AppError;
use crate::http::handlers::parse_date;
use crate::http::response::{ApiResponse, new_request_id};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSummaryRequest {
    pub summary_text: String,
    #[serde(default)]
    pub sentiment_score: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// POST /api/summaries - Store today's summary.
pub async fn create_summary(
    State(state): State<AppState>,
    Json(body): Json<CreateSummaryRequest>,
) -> Result<Json<ApiResponse<DailySummary>>, AppError> {
    let start = Instant::now();
    let request_id = new_request_id();

    let summary = state
        .summary_service
        .create(&body.summary_text, body.sentiment_score, body.notes)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(summary, request_id, elapsed)))
}

/// GET /api/summaries/{date} - One day's summary.
pub async fn get_summary(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<ApiResponse<DailySummary>>, AppError> {
    let start = Instant::now();
    let request_id = new_request_id();

    let date = parse_date(&date)?;
    let summary = state.summary_service.for_date(date).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(summary, request_id, elapsed)))
}
