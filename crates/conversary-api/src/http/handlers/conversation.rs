//! Conversation handlers: send a message, list history.

use std::time::{Duration, Instant};

use axum::Json;
use axum::extract::{Path, State};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use conversary_types::conversation::ConversationEntry;

use crate::http::error::AppError;
use crate::http::handlers::parse_date;
use crate::http::response::{ApiResponse, new_request_id};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub user_message: String,
}

/// One stored exchange as returned by the API.
#[derive(Debug, Serialize)]
pub struct ConversationView {
    pub id: i64,
    pub user_message: String,
    pub ai_response: String,
    pub date: NaiveDate,
}

impl From<ConversationEntry> for ConversationView {
    fn from(entry: ConversationEntry) -> Self {
        Self {
            id: entry.id,
            user_message: entry.user_message,
            ai_response: entry.ai_response,
            date: entry.date,
        }
    }
}

/// POST /api/conversations - Generate a reply and store the exchange.
pub async fn create_conversation(
    State(state): State<AppState>,
    Json(body): Json<CreateConversationRequest>,
) -> Result<Json<ApiResponse<ConversationView>>, AppError> {
    let start = Instant::now();
    let request_id = new_request_id();

    let timeout_secs = state.config.server.request_timeout_secs;
    let entry = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        state.conversation_service.send(&body.user_message),
    )
    .await
    .map_err(|_| AppError::Timeout(timeout_secs))??;

    tracing::info!(%request_id, id = entry.id, "Conversation stored");
    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(entry.into(), request_id, elapsed)))
}

/// GET /api/conversations - Every stored exchange, oldest first.
pub async fn list_conversations(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ConversationView>>>, AppError> {
    let start = Instant::now();
    let request_id = new_request_id();

    let entries = state.conversation_service.all_entries().await?;
    let views = entries.into_iter().map(ConversationView::from).collect();

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(views, request_id, elapsed)))
}

/// GET /api/conversations/{date} - Exchanges stored on one day.
pub async fn list_conversations_for_date(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<ApiResponse<Vec<ConversationView>>>, AppError> {
    let start = Instant::now();
    let request_id = new_request_id();

    let date = parse_date(&date)?;
    let entries = state.conversation_service.entries_for_date(date).await?;
    let views = entries.into_iter().map(ConversationView::from).collect();

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(views, request_id, elapsed)))
}
