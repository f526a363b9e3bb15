//! Global application error types and handlers.
//!
//! This module defines custom error types that are used across the entire
//! backend application and provides mechanisms for consistent error handling
//! and response formatting.

use thiserror::Error;

/// Failures of the authentication and session subsystem.
///
/// The token variants are kept apart for logging only; every one of them is
/// reported to the client with the same generic 401 response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown email, wrong password or inactive account.
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Token has expired")]
    TokenExpired,
    /// An access token was presented where a refresh token was expected, or
    /// the other way round.
    #[error("Unexpected token type: expected {expected}, found {found}")]
    TokenType { expected: String, found: String },
    /// Bad signature, wrong algorithm or malformed payload.
    #[error("Invalid token: {reason}")]
    TokenInvalid { reason: String },
    #[error("Token has been revoked")]
    TokenRevoked,
    #[error("Too many verification attempts")]
    RateLimited,
    #[error("Invalid verification code")]
    InvalidOtp,
    #[error("Verification code expired or not found")]
    OtpExpired,
    /// Logout managed to revoke only part of the presented tokens.
    #[error("Revoked {revoked:?} but failed to revoke {failed}")]
    PartialRevocation { revoked: Vec<String>, failed: String },
}

impl AuthError {
    pub fn token_invalid(reason: impl Into<String>) -> Self {
        Self::TokenInvalid {
            reason: reason.into(),
        }
    }
}

/// Generic service error that can be used across all entities
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Vec<(String, String)>,
    },

    #[error("{entity} not found: {identifier}")]
    NotFound { entity: String, identifier: String },

    #[error("{entity} already exists: {identifier}")]
    AlreadyExists { entity: String, identifier: String },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Authentication error: {source}")]
    Auth {
        #[from]
        source: AuthError,
    },

    #[error("Database error: {source}")]
    Database {
        #[from]
        source: anyhow::Error,
    },
    #[error("External service error: {message}")]
    ExternalService { message: String },
    #[error("Internal error: {message}")]
    InternalError { message: String },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    // Helper constructors for common patterns

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Builds a validation error carrying per-field messages.
    pub fn from_validation_errors(errors: &validator::ValidationErrors) -> Self {
        let details: Vec<(String, String)> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    (
                        field.to_string(),
                        error
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| "Invalid value".to_string()),
                    )
                })
            })
            .collect();

        let message = details
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect::<Vec<_>>()
            .join(", ");

        Self::Validation { message, details }
    }

    pub fn not_found(entity: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            identifier: identifier.into(),
        }
    }

    pub fn already_exists(entity: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity: entity.into(),
            identifier: identifier.into(),
        }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    pub fn external_service(message: impl Into<String>) -> Self {
        Self::ExternalService {
            message: message.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Returns the wrapped authentication error, if any.
    pub fn as_auth(&self) -> Option<&AuthError> {
        match self {
            Self::Auth { source } => Some(source),
            _ => None,
        }
    }
}
