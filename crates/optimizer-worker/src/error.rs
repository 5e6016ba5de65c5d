//! API error types and handling.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use optimizer::OptimizerError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::runner::JobError;

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// API error type.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Job timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid JSON: {0}")]
    JsonRejection(String),
}

impl ApiError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::JsonRejection(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code string.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Timeout(_) => "JOB_TIMEOUT",
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::JsonRejection(_) => "INVALID_JSON",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!(error = %rejection, "JSON parsing failed");
        ApiError::JsonRejection(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<campaign_core::Error> for ApiError {
    fn from(error: campaign_core::Error) -> Self {
        match error {
            campaign_core::Error::NotFound { .. } => ApiError::NotFound(error.to_string()),
            campaign_core::Error::Conflict { .. } => ApiError::Conflict(error.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<OptimizerError> for ApiError {
    fn from(error: OptimizerError) -> Self {
        match error {
            OptimizerError::Core(core) => core.into(),
            OptimizerError::CampaignNotFound(_) => ApiError::NotFound(error.to_string()),
            OptimizerError::LeaseHeld(_) => ApiError::Conflict(error.to_string()),
            OptimizerError::PassInterrupted { source, .. } => (*source).into(),
        }
    }
}

impl From<JobError> for ApiError {
    fn from(error: JobError) -> Self {
        match error {
            JobError::Optimizer(inner) => inner.into(),
            JobError::TimedOut { .. } => ApiError::Timeout(error.to_string()),
            JobError::ShuttingDown => ApiError::Internal(error.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(
                error_code = self.error_code(),
                error = %self,
                "Request failed"
            );
        }

        let body = ErrorResponse::new(self.error_code(), self.to_string());

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_optimizer_errors_map_to_status() {
        let busy: ApiError = OptimizerError::LeaseHeld(Uuid::nil()).into();
        assert_eq!(busy.status_code(), StatusCode::CONFLICT);

        let missing: ApiError = OptimizerError::CampaignNotFound(Uuid::nil()).into();
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let conflict: ApiError = OptimizerError::conflict("version moved").into();
        assert_eq!(conflict.error_code(), "CONFLICT");
    }

    #[test]
    fn test_timeout_maps_to_gateway_timeout() {
        let err: ApiError = JobError::TimedOut { secs: 5 }.into();
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }
}
