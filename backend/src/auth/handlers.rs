//! Handler functions for authentication-related API endpoints.
//!
//! These functions process incoming HTTP requests for registration, login,
//! token refresh, logout and account recovery, and delegate to
//! `auth::service` for the business logic.

use crate::api::common::{ApiError, ApiResponse, error_response, service_error_to_http};
use crate::auth::models::*;
use crate::auth::service::AuthService;
use crate::database::models::UserProfile;
use crate::state::AppState;
use crate::utils::jwt::Claims;
use axum::{
    body::Bytes,
    extract::{Extension, Json},
    http::StatusCode,
    response::Json as ResponseJson,
};

const CODE_SENT_MESSAGE: &str = "If the account exists, a verification code has been sent";

/// Handle user registration request
#[axum::debug_handler]
pub async fn register(
    Extension(state): Extension<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<UserProfile>>), ApiError> {
    let profile = AuthService::new(&state)
        .register(payload)
        .await
        .map_err(service_error_to_http)?;

    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(
            profile,
            "Registration successful. Check your email for a verification code.",
        )),
    ))
}

/// Handle user login request
#[axum::debug_handler]
pub async fn login(
    Extension(state): Extension<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<ResponseJson<LoginResponse>, ApiError> {
    match AuthService::new(&state).login(payload).await {
        Ok(response) => Ok(ResponseJson(response)),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle token refresh request
#[axum::debug_handler]
pub async fn refresh_token(
    Extension(state): Extension<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<ResponseJson<RefreshTokenResponse>, ApiError> {
    match AuthService::new(&state).refresh_token(payload).await {
        Ok(response) => Ok(ResponseJson(response)),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle logout request
///
/// The body is optional; when present it may carry the refresh token to
/// revoke alongside the access token.
#[axum::debug_handler]
pub async fn logout(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    body: Bytes,
) -> Result<ResponseJson<ApiResponse<LogoutResponse>>, ApiError> {
    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        LogoutRequest::default()
    } else {
        serde_json::from_slice::<LogoutRequest>(&body).map_err(|e| {
            error_response(
                StatusCode::BAD_REQUEST,
                "invalid_body",
                format!("Invalid logout body: {e}"),
            )
        })?
    };

    let response = AuthService::new(&state)
        .logout(&claims, payload)
        .await
        .map_err(service_error_to_http)?;

    Ok(ResponseJson(ApiResponse::success(
        response,
        "Logged out successfully",
    )))
}

#[axum::debug_handler]
pub async fn forgot_password(
    Extension(state): Extension<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    AuthService::new(&state)
        .forgot_password(payload)
        .await
        .map_err(service_error_to_http)?;

    Ok(ResponseJson(ApiResponse::success((), CODE_SENT_MESSAGE)))
}

#[axum::debug_handler]
pub async fn reset_password(
    Extension(state): Extension<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    AuthService::new(&state)
        .reset_password(payload)
        .await
        .map_err(service_error_to_http)?;

    Ok(ResponseJson(ApiResponse::success(
        (),
        "Password has been reset",
    )))
}

#[axum::debug_handler]
pub async fn verify_email(
    Extension(state): Extension<AppState>,
    Json(payload): Json<VerifyEmailRequest>,
) -> Result<ResponseJson<ApiResponse<UserProfile>>, ApiError> {
    let profile = AuthService::new(&state)
        .verify_email(payload)
        .await
        .map_err(service_error_to_http)?;

    Ok(ResponseJson(ApiResponse::success(profile, "Email verified")))
}

#[axum::debug_handler]
pub async fn resend_verification(
    Extension(state): Extension<AppState>,
    Json(payload): Json<ResendVerificationRequest>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    AuthService::new(&state)
        .resend_verification(payload)
        .await
        .map_err(service_error_to_http)?;

    Ok(ResponseJson(ApiResponse::success((), CODE_SENT_MESSAGE)))
}

/// Get current user information from token
#[axum::debug_handler]
pub async fn me(
    Extension(state): Extension<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<ResponseJson<UserProfile>, ApiError> {
    match AuthService::new(&state).me(&identity).await {
        Ok(profile) => Ok(ResponseJson(profile)),
        Err(error) => Err(service_error_to_http(error)),
    }
}
