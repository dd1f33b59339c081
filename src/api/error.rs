//! Unified API error handling
//!
//! This module provides a consistent error response format across all API endpoints.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::service::session::SessionError;

/// Standard error response format
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type/code
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Unique request ID for tracing
    pub request_id: String,
}

/// Unified API error type
///
/// All API endpoints should return `Result<T, ApiError>` for consistent error handling.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Session unknown or expired (404)
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    /// Resource inside a session not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request / validation error (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// No API key selected (401)
    #[error("API key selection required")]
    CredentialRequired,

    /// Analysis already running (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// External service error (502)
    #[error("External service error: {0}")]
    ExternalService(String),
}

impl ApiError {
    fn error_type(&self) -> &'static str {
        match self {
            ApiError::SessionNotFound(_) => "session_not_found",
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::CredentialRequired => "credential_required",
            ApiError::Conflict(_) => "conflict",
            ApiError::Internal(_) => "internal_error",
            ApiError::ExternalService(_) => "external_service_error",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::SessionNotFound(_) | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::CredentialRequired => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_type = self.error_type();

        if status.is_server_error() {
            tracing::error!(
                error_type = error_type,
                status = status.as_u16(),
                message = %self,
                "API error"
            );
        } else {
            tracing::debug!(
                error_type = error_type,
                status = status.as_u16(),
                message = %self,
                "API error"
            );
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            request_id: Uuid::new_v4().to_string(),
        })
    }
}

// ============================================================================
// From conversions for service errors
// ============================================================================

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => ApiError::SessionNotFound(id),
            SessionError::Busy => ApiError::Conflict(err.to_string()),
            SessionError::CredentialRequired => ApiError::CredentialRequired,
            SessionError::InvalidInput(msg) => ApiError::BadRequest(msg),
            SessionError::NothingToRetry | SessionError::SuggestionOutOfRange(_) => {
                ApiError::BadRequest(err.to_string())
            }
            SessionError::NoResult | SessionError::UnknownZone(_) => {
                ApiError::NotFound(err.to_string())
            }
            SessionError::Credential(e) => ApiError::ExternalService(e.to_string()),
            SessionError::TaskFailed(msg) => ApiError::Internal(msg),
        }
    }
}
