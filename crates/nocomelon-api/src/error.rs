//! API error types.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use nocomelon_firestore::FirestoreError;
use nocomelon_pipeline::PipelineError;
use nocomelon_storage::StorageError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// An AI provider failed or returned something unusable.
    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("S3 storage not configured")]
    StorageNotConfigured,

    /// FFmpeg or FFprobe failed.
    #[error("{message}")]
    ExternalTool {
        message: String,
        stderr: Option<String>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::StorageNotConfigured
            | ApiError::ExternalTool { .. }
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Validation(_) => "validation_error",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::BadGateway(_) => "provider_error",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
            ApiError::StorageNotConfigured => "storage_not_configured",
            ApiError::ExternalTool { .. } => "media_error",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn is_internal(&self) -> bool {
        matches!(self, ApiError::Internal(_) | ApiError::ExternalTool { .. })
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(msg) => ApiError::Validation(msg),
            e @ PipelineError::Collaborator { .. } => ApiError::BadGateway(e.to_string()),
            e @ PipelineError::ExternalTool { .. } => {
                let stderr = e.stderr().map(str::to_string);
                ApiError::ExternalTool {
                    message: e.to_string(),
                    stderr,
                }
            }
            PipelineError::NotFound(msg) => ApiError::NotFound(msg),
            PipelineError::Authorization(_) => {
                ApiError::Forbidden("Access denied: S3 key does not belong to this user".to_string())
            }
            PipelineError::StorageConfig(_) => ApiError::StorageNotConfigured,
            e @ PipelineError::Store(_) => ApiError::ServiceUnavailable(e.to_string()),
            e @ PipelineError::Conflict(_) => ApiError::Conflict(e.to_string()),
            e @ PipelineError::QueueFull => ApiError::ServiceUnavailable(e.to_string()),
            e @ (PipelineError::Storage(_) | PipelineError::Internal(_)) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        PipelineError::from(err).into()
    }
}

impl From<FirestoreError> for ApiError {
    fn from(err: FirestoreError) -> Self {
        PipelineError::from(err).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stderr: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let production = std::env::var("ENVIRONMENT")
            .map(|v| v.to_lowercase() == "production")
            .unwrap_or(false);

        if self.is_internal() {
            error!(code = self.code(), "Request failed: {}", self);
        }

        // Don't expose internal error details in production
        let (detail, stderr) = match &self {
            e if e.is_internal() && production => ("An internal error occurred".to_string(), None),
            ApiError::ExternalTool { stderr, .. } => (self.to_string(), stderr.clone()),
            _ => (self.to_string(), None),
        };

        let body = ErrorResponse {
            detail,
            code: self.code(),
            stderr,
        };
        (status, Json(body)).into_response()
    }
}
