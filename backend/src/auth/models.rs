//! Data structures for authentication-related entities.
//!
//! This module defines the request and response payloads of the
//! authentication endpoints and the verified identity that middleware attaches
//! to each authenticated request.

use crate::database::models::{Role, UserProfile};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// bcrypt ignores everything past this many bytes of input.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Registration request payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        email(message = "Must be a valid email"),
        length(max = 255, message = "Email too long")
    )]
    pub email: String,

    #[validate(length(
        min = 3,
        max = 50,
        message = "Username must be between 3-50 characters"
    ))]
    pub username: String,

    #[validate(
        length(min = 8, max = 72, message = "Password must be between 8-72 characters"),
        custom(function = "validate_password_bytes")
    )]
    pub password: String,

    pub role: Role,
}

/// Login request payload
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Login response containing tokens and user info
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64, // Access token expiration in seconds
    pub user: UserProfile,
}

/// Token refresh request
#[derive(Debug, Deserialize, Validate)]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Token refresh response
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Logout body; the access token comes from the Authorization header
#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Which of the presented tokens were revoked
#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub revoked: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Must be a valid email"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(email(message = "Must be a valid email"))]
    pub email: String,

    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub otp: String,

    #[validate(
        length(min = 8, max = 72, message = "Password must be between 8-72 characters"),
        custom(function = "validate_password_bytes")
    )]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyEmailRequest {
    #[validate(email(message = "Must be a valid email"))]
    pub email: String,

    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub otp: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResendVerificationRequest {
    #[validate(email(message = "Must be a valid email"))]
    pub email: String,
}

/// Verified caller, resolved from an access token by `jwt_auth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub role: Role,
}

/// Rejects passwords bcrypt would silently truncate. Character length alone
/// is not enough once multibyte input is involved.
pub fn validate_password_bytes(password: &str) -> Result<(), ValidationError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ValidationError::new("password_too_long")
            .with_message("Password must be at most 72 bytes".into()));
    }
    Ok(())
}

/// Normalizes an email for lookups and cache keys.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_byte_limit() {
        assert!(validate_password_bytes(&"a".repeat(MAX_PASSWORD_BYTES)).is_ok());
        assert!(validate_password_bytes(&"a".repeat(MAX_PASSWORD_BYTES + 1)).is_err());
        // 40 characters, 80 bytes
        assert!(validate_password_bytes(&"é".repeat(40)).is_err());
    }

    #[test]
    fn test_reset_request_rejects_truncated_password() {
        let request = ResetPasswordRequest {
            email: "a@x.com".to_string(),
            otp: "123456".to_string(),
            new_password: "ü".repeat(50),
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("new_password"));
    }
}
