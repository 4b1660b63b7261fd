pub mod codes;

pub use codes::ErrorCode;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use job_broker::CoreError;
use serde::Serialize;
use thiserror::Error;

/// Standard error response structure.
///
/// - `code`: integer error code for logging/monitoring (e.g., 1003)
/// - `error`: machine-readable error identifier (e.g., "NOT_FOUND")
/// - `message`: human-readable error message
/// - `details`: optional additional error details
///
/// ```json
/// {
///   "code": 1003,
///   "error": "NOT_FOUND",
///   "message": "Resource not found",
///   "details": null
/// }
/// ```
#[derive(Serialize)]
pub struct ErrorResponse {
    pub code: i32,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application error type that can be converted to HTTP responses.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    #[error("JSON parsing error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("JSON extraction error: {0}")]
    JsonExtractorRejection(#[from] JsonRejection),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::SerdeJson(e) => {
                tracing::warn!("json parsing error: {:?}", e);
                (StatusCode::BAD_REQUEST, ErrorCode::InvalidJson)
            }
            AppError::JsonExtractorRejection(e) => {
                tracing::warn!("json extraction error: {:?}", e);
                (StatusCode::BAD_REQUEST, ErrorCode::InvalidJson)
            }
            AppError::Core(core_err) => map_core_error(core_err),
            AppError::BadRequest(msg) => {
                tracing::warn!("bad request: {}", msg);
                (StatusCode::BAD_REQUEST, ErrorCode::InvalidArgument)
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("service unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::ServiceUnavailable)
            }
        };

        let body = ErrorResponse {
            code: code.code(),
            error: code.as_str().to_string(),
            message: self.to_string(),
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

/// `CoreError` carries the job manager's internal retry-decision kinds
/// (`NoRetryOption`, `RetryLimitExceeded`, `ConnectionError`, `BrokerStopped`)
/// that never reach a client as such — they only ever manifest as job-state
/// transitions. If one of them does surface here it's a bug upstream, not a
/// client-facing condition, so it maps to 500 rather than leaking internals.
fn map_core_error(err: &CoreError) -> (StatusCode, ErrorCode) {
    match err {
        CoreError::JobNotFound(_) | CoreError::CallbackNotFound(_) | CoreError::WorkerNotFound(_) => {
            tracing::info!(error = %err, "not found");
            (StatusCode::NOT_FOUND, ErrorCode::NotFound)
        }
        CoreError::InvalidArgument(_) => {
            tracing::warn!(error = %err, "invalid argument");
            (StatusCode::BAD_REQUEST, ErrorCode::InvalidArgument)
        }
        CoreError::UnknownStatusCode(_) => {
            tracing::warn!(error = %err, "unknown callback status code");
            (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::UnknownStatus)
        }
        CoreError::NoRetryOption { .. }
        | CoreError::RetryLimitExceeded { .. }
        | CoreError::ConnectionError(_)
        | CoreError::BrokerStopped => {
            tracing::error!(error = %err, "internal-only error reached the HTTP boundary");
            (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use uuid::Uuid;

    #[tokio::test]
    async fn job_not_found_maps_to_404() {
        let response = AppError::Core(CoreError::JobNotFound(Uuid::nil())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "NOT_FOUND");
    }

    #[tokio::test]
    async fn unknown_status_code_maps_to_500() {
        let response = AppError::Core(CoreError::UnknownStatusCode(999)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn invalid_argument_maps_to_400() {
        let response = AppError::Core(CoreError::InvalidArgument("bad".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn connection_error_never_leaks_as_such_maps_to_500() {
        let response = AppError::Core(CoreError::ConnectionError("refused".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
