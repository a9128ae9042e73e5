//! Application error type mapping to HTTP status codes and envelope format.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use conversary_types::error::{
    ConversationError, GenerationError, ModelLoadError, PipelineError, RepositoryError,
};

use crate::http::response::{ApiResponse, new_request_id};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Conversation and summary service errors.
    Conversation(ConversationError),
    /// Storage errors from read-only queries.
    Repository(RepositoryError),
    /// Malformed path or body input.
    Validation(String),
    /// The request deadline expired before a reply was produced.
    Timeout(u64),
}

impl From<ConversationError> for AppError {
    fn from(e: ConversationError) -> Self {
        AppError::Conversation(e)
    }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        AppError::Repository(e)
    }
}

fn repository_status(e: &RepositoryError) -> (StatusCode, &'static str) {
    match e {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        RepositoryError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
        RepositoryError::Connection | RepositoryError::Query(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR")
        }
    }
}

fn pipeline_status(e: &PipelineError) -> (StatusCode, &'static str) {
    match e {
        PipelineError::ModelLoad(ModelLoadError::OutOfMemory(_)) => {
            (StatusCode::SERVICE_UNAVAILABLE, "OUT_OF_MEMORY")
        }
        PipelineError::ModelLoad(_) => (StatusCode::SERVICE_UNAVAILABLE, "MODEL_UNAVAILABLE"),
        PipelineError::Generation(GenerationError::ContextOverflow { .. }) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "CONTEXT_OVERFLOW")
        }
        PipelineError::Generation(GenerationError::OutOfMemory(_)) => {
            (StatusCode::SERVICE_UNAVAILABLE, "OUT_OF_MEMORY")
        }
        PipelineError::Generation(GenerationError::NotLoaded) => {
            (StatusCode::SERVICE_UNAVAILABLE, "MODEL_UNAVAILABLE")
        }
        PipelineError::Generation(GenerationError::Backend(_)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "GENERATION_FAILED")
        }
    }
}

impl AppError {
    /// Status and machine-readable code for this error.
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Conversation(ConversationError::EmptyMessage)
            | AppError::Conversation(ConversationError::InvalidInput(_))
            | AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Conversation(ConversationError::Pipeline(e)) => pipeline_status(e),
            AppError::Conversation(ConversationError::Repository(e)) | AppError::Repository(e) => {
                repository_status(e)
            }
            AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Conversation(e) => e.to_string(),
            AppError::Repository(RepositoryError::NotFound) => "not found".to_string(),
            AppError::Repository(e) => e.to_string(),
            AppError::Validation(msg) => msg.clone(),
            AppError::Timeout(secs) => format!("no reply within {secs}s"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        let message = self.message();
        let request_id = new_request_id();

        if status.is_server_error() {
            tracing::error!(%request_id, %status, code, error = %message, "Request failed");
        } else {
            tracing::debug!(%request_id, %status, code, error = %message, "Request rejected");
        }

        let body = ApiResponse::error(code, &message, request_id, 0);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_message_is_bad_request() {
        let err = AppError::from(ConversationError::EmptyMessage);
        assert_eq!(err.status(), (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"));
    }

    #[test]
    fn missing_weights_is_service_unavailable() {
        let err = AppError::from(ConversationError::from(PipelineError::from(
            ModelLoadError::WeightsUnavailable("gone".to_string()),
        )));
        assert_eq!(err.status().0, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn context_overflow_is_unprocessable() {
        let err = AppError::from(ConversationError::from(PipelineError::from(
            GenerationError::ContextOverflow {
                prompt_tokens: 5000,
                context_size: 4096,
            },
        )));
        assert_eq!(err.status(), (StatusCode::UNPROCESSABLE_ENTITY, "CONTEXT_OVERFLOW"));
    }

    #[test]
    fn repository_errors_map_to_http() {
        assert_eq!(
            AppError::from(RepositoryError::NotFound).status().0,
            StatusCode::NOT_FOUND
        );
        let conflict = ConversationError::from(RepositoryError::Conflict("dup".to_string()));
        assert_eq!(AppError::from(conflict).status().0, StatusCode::CONFLICT);
        assert_eq!(
            AppError::from(RepositoryError::Connection).status().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn timeout_is_gateway_timeout() {
        let err = AppError::Timeout(30);
        assert_eq!(err.status().0, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.message(), "no reply within 30s");
    }
}
