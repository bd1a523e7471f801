//! # Web API Error Types
//!
//! Error types specific to the web API and their HTTP response conversions.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::error::VigilError;

/// Web API specific errors with HTTP status code mappings
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    /// Load shedding or unhealthy dependencies; carries a Retry-After hint
    #[error("Service unavailable: {reason}")]
    ServiceUnavailable {
        reason: String,
        retry_after_seconds: u64,
    },

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn service_unavailable(reason: impl Into<String>, retry_after_seconds: u64) -> Self {
        Self::ServiceUnavailable {
            reason: reason.into(),
            retry_after_seconds,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::ServiceUnavailable {
            reason,
            retry_after_seconds,
        } = &self
        {
            let error_response = json!({
                "error": {
                    "code": "SERVICE_UNAVAILABLE",
                    "message": format!("Service unavailable: {reason}"),
                    "retry_after_seconds": retry_after_seconds
                }
            });

            return (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::RETRY_AFTER, retry_after_seconds.to_string())],
                Json(error_response),
            )
                .into_response();
        }

        let (status_code, error_code, message) = match &self {
            ApiError::NotFound { message } => (StatusCode::NOT_FOUND, "NOT_FOUND", message.as_str()),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required",
            ),
            ApiError::BadRequest { message } => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", message.as_str())
            }
            ApiError::Internal | ApiError::ServiceUnavailable { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error",
            ),
        };

        let error_response = json!({
            "error": {
                "code": error_code,
                "message": message
            }
        });

        (status_code, Json(error_response)).into_response()
    }
}

/// Operator errors are rejected as bad requests; everything else is internal
impl From<VigilError> for ApiError {
    fn from(err: VigilError) -> Self {
        match err {
            VigilError::Validation(message) => ApiError::BadRequest { message },
            VigilError::Recovery(message) => ApiError::BadRequest { message },
            other => {
                tracing::error!(error = %other, "Unhandled error in web handler");
                ApiError::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_unavailable_sets_retry_after() {
        let response = ApiError::service_unavailable("health status error", 30).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok()),
            Some("30")
        );
    }

    #[test]
    fn test_validation_error_maps_to_bad_request() {
        let api: ApiError = VigilError::validation("cpu_percent out of range").into();
        assert_eq!(api.into_response().status(), StatusCode::BAD_REQUEST);

        let api: ApiError = VigilError::Internal("boom".to_string()).into();
        assert_eq!(api.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
