//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden - webhook handshake or auth check failed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Internal server error - unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Service unavailable - required service is not configured or available
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Pipeline error - error from the detection pipeline
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] challan_core::ChallanError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Pipeline(ref e) => match e {
                // Upstream model/service failures → 503
                challan_core::ChallanError::Classification(_)
                | challan_core::ChallanError::CatalogUnavailable(_)
                | challan_core::ChallanError::Embedding(_)
                | challan_core::ChallanError::Validation(_)
                | challan_core::ChallanError::Narration(_)
                | challan_core::ChallanError::Http(_) => StatusCode::SERVICE_UNAVAILABLE,

                // Delivery problems are server-side plumbing → 500
                challan_core::ChallanError::Delivery(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for programmatic error handling
    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Pipeline(ref e) => match e {
                challan_core::ChallanError::Classification(_) => "CLASSIFIER_UNAVAILABLE",
                challan_core::ChallanError::CatalogUnavailable(_) => "CATALOG_UNAVAILABLE",
                challan_core::ChallanError::Embedding(_) => "EMBEDDING_UNAVAILABLE",
                challan_core::ChallanError::Validation(_) => "VALIDATOR_UNAVAILABLE",
                challan_core::ChallanError::Narration(_) => "NARRATOR_UNAVAILABLE",
                challan_core::ChallanError::Delivery(_) => "DELIVERY_FAILED",
                challan_core::ChallanError::Http(_) => "UPSTREAM_ERROR",
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            // For pipeline errors, sanitize internal details
            Self::Pipeline(ref e) => match e {
                challan_core::ChallanError::Classification(_) => {
                    "Image classification service unavailable".to_string()
                }
                challan_core::ChallanError::CatalogUnavailable(_) => {
                    "Violation catalog unavailable".to_string()
                }
                challan_core::ChallanError::Embedding(_) => {
                    "Embedding service unavailable".to_string()
                }
                challan_core::ChallanError::Validation(_) => {
                    "Violation validator unavailable".to_string()
                }
                challan_core::ChallanError::Narration(_) => {
                    "Summary generation unavailable".to_string()
                }
                challan_core::ChallanError::Delivery(_) => "Message delivery failed".to_string(),
                challan_core::ChallanError::Http(_) => "Upstream service error".to_string(),
            },
            // For other errors, use the Display message
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Forbidden(_) => "forbidden",
            Self::Internal(_) => "internal",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Pipeline(_) => "pipeline",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        match &self {
            Self::BadRequest(_) | Self::Forbidden(_) => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Client error"
                );
            }
            Self::ServiceUnavailable(_) => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Service unavailable"
                );
            }
            Self::Internal(_) => {
                tracing::error!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Server error"
                );
            }
            Self::Pipeline(_) => {
                tracing::error!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    client_message = %client_message,
                    "Pipeline error (internal details logged)"
                );
            }
        }

        // All error responses include a `code` field for programmatic error handling
        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use challan_core::ChallanError;

    #[test]
    fn test_pipeline_error_maps_to_service_unavailable() {
        let err = ApiError::from(ChallanError::Classification("model down".into()));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.error_code(), "CLASSIFIER_UNAVAILABLE");
    }

    #[test]
    fn test_client_message_hides_internal_details() {
        let err = ApiError::from(ChallanError::Embedding("key abc123 invalid".into()));
        assert!(!err.client_message().contains("abc123"));
    }

    #[test]
    fn test_bad_request_status() {
        assert_eq!(
            ApiError::bad_request("nope").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::forbidden("nope").status_code(),
            StatusCode::FORBIDDEN
        );
    }
}
