//! Error handling utilities for API responses.
//!
//! Provides structured error responses and conversion between service-layer errors
//! and HTTP responses. Includes:
//! - Standard response envelope
//! - ServiceError to HTTP status code mapping
//! - Validation error formatting helpers
//!
//! # Response Format
//! All errors return consistent JSON responses containing:
//! - `message`: Human-readable message
//! - `error.error_type`: Machine-readable error category
//! - `error.details`: Optional field-specific validation errors
//! - `error.request_id`: Id of the failed request, matching `X-Request-ID`
//!
//! # Error Handling Flow
//! 1. Service layer returns domain-specific `ServiceError`
//! 2. `service_error_to_http` converts to appropriate HTTP response
//! 3. Authentication failures collapse into one generic response; the real
//!    cause only reaches the logs

use crate::api::middleware::current_request_id;
use crate::errors::{AuthError, ServiceError};
use axum::{Json, http::StatusCode};
use serde::{Deserialize, Serialize};

/// Message for every token or credential failure.
pub const AUTH_FAILED_MESSAGE: &str = "Invalid or expired credentials";
pub const FORBIDDEN_MESSAGE: &str = "Insufficient permissions";
pub const INVALID_CODE_MESSAGE: &str = "Invalid or expired verification code";

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<ApiResponse<()>>);

/// Standard API response wrapper for all endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Indicates if the request was successful
    pub success: bool,
    /// Response data (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Human-readable message
    pub message: String,
    /// Error details (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
    /// Request timestamp
    pub timestamp: String,
}

/// Error details for failed requests
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Machine-readable error type identifier
    pub error_type: String,
    /// Field-specific validation errors when applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Field-specific validation error details
#[derive(Debug, Serialize, Deserialize)]
pub struct FieldError {
    /// Name of the field with validation error
    pub field: String,
    /// Description of the validation failure
    pub message: String,
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: message.into(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Create an error response
    pub fn error(
        message: impl Into<String>,
        error_type: impl Into<String>,
        details: Option<Vec<FieldError>>,
    ) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            message: message.into(),
            error: Some(ErrorDetails {
                error_type: error_type.into(),
                details,
                request_id: current_request_id(),
            }),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Builds an error response without going through `ServiceError`.
pub fn error_response(
    status: StatusCode,
    error_type: &str,
    message: impl Into<String>,
) -> ApiError {
    (status, Json(ApiResponse::<()>::error(message, error_type, None)))
}

pub fn unauthorized() -> ApiError {
    error_response(StatusCode::UNAUTHORIZED, "unauthorized", AUTH_FAILED_MESSAGE)
}

pub fn forbidden() -> ApiError {
    error_response(StatusCode::FORBIDDEN, "forbidden", FORBIDDEN_MESSAGE)
}

fn auth_error_to_http(error: AuthError) -> ApiError {
    match error {
        AuthError::InvalidCredentials
        | AuthError::TokenExpired
        | AuthError::TokenType { .. }
        | AuthError::TokenInvalid { .. }
        | AuthError::TokenRevoked => {
            tracing::warn!("Authentication rejected: {}", error);
            unauthorized()
        }
        AuthError::RateLimited => error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "Too many attempts. Request a new code.",
        ),
        AuthError::InvalidOtp | AuthError::OtpExpired => {
            tracing::warn!("Verification code rejected: {}", error);
            error_response(StatusCode::BAD_REQUEST, "invalid_code", INVALID_CODE_MESSAGE)
        }
        AuthError::PartialRevocation { revoked, failed } => {
            tracing::error!("Partial revocation: revoked {:?}, failed {}", revoked, failed);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "partial_revocation",
                format!(
                    "Logout incomplete: revoked {} but not {} token",
                    revoked.join(", "),
                    failed
                ),
            )
        }
    }
}

/// Converts ServiceError to appropriate HTTP response with standard format
pub fn service_error_to_http(error: ServiceError) -> ApiError {
    let (status, error_type, message, details) = match error {
        ServiceError::Auth { source } => return auth_error_to_http(source),
        ServiceError::Validation { message, details } => {
            let details = (!details.is_empty()).then(|| {
                details
                    .into_iter()
                    .map(|(field, message)| FieldError { field, message })
                    .collect()
            });
            (StatusCode::BAD_REQUEST, "validation_error", message, details)
        }
        ServiceError::NotFound { entity, identifier } => (
            StatusCode::NOT_FOUND,
            "not_found",
            format!("{} '{}' not found", entity, identifier),
            None,
        ),
        ServiceError::AlreadyExists { entity, .. } => (
            StatusCode::CONFLICT,
            "already_exists",
            format!("{} already exists", entity),
            None,
        ),
        ServiceError::InvalidOperation { message } => {
            (StatusCode::BAD_REQUEST, "invalid_operation", message, None)
        }
        ServiceError::Database { source } => {
            tracing::error!("Database error: {:#}", source);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "database_error",
                "Internal server error".to_string(),
                None,
            )
        }
        ServiceError::ExternalService { message } => {
            tracing::error!("External service error: {}", message);
            (
                StatusCode::BAD_GATEWAY,
                "external_service_error",
                "Upstream service unavailable".to_string(),
                None,
            )
        }
        ServiceError::InternalError { message } => {
            tracing::error!("Internal error: {}", message);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
                None,
            )
        }
    };

    (
        status,
        Json(ApiResponse::<()>::error(message, error_type, details)),
    )
}
