use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::chunking::ChunkError;
use crate::embeddings::EmbeddingError;
use crate::resume::ResumeError;
use crate::session::SessionError;
use crate::vector_index::IndexError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream gateway error: {0}")]
    Gateway(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ChunkError> for AppError {
    fn from(e: ChunkError) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl From<EmbeddingError> for AppError {
    fn from(e: EmbeddingError) -> Self {
        match e {
            EmbeddingError::InvalidInput(msg) => AppError::Validation(msg),
            other => AppError::Gateway(other.to_string()),
        }
    }
}

impl From<IndexError> for AppError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::DimensionMismatch(msg) | IndexError::InvalidVector(msg) => {
                AppError::UnprocessableEntity(msg)
            }
            other => AppError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl From<ResumeError> for AppError {
    fn from(e: ResumeError) -> Self {
        match e {
            ResumeError::Chunking(e) => e.into(),
            ResumeError::Embedding(e) => e.into(),
            ResumeError::Index(e) => e.into(),
            ResumeError::Extraction(msg) => {
                AppError::Validation(format!("Could not read PDF: {msg}"))
            }
            ResumeError::EmptyDocument(msg) => AppError::Validation(msg),
            ResumeError::Task(e) => AppError::Internal(anyhow::Error::new(e)),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(id) => AppError::NotFound(format!("Session {id} not found")),
            err @ SessionError::InvalidState { .. } => AppError::Conflict(err.to_string()),
            SessionError::Database(e) => AppError::Database(e),
            SessionError::Serialize(e) => AppError::Internal(anyhow::Error::new(e)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "INVALID_STATE", msg.clone()),
            AppError::Gateway(msg) => {
                tracing::error!("Gateway error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "GATEWAY_ERROR",
                    "An upstream AI service failed".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
