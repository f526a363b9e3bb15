//! Handler functions for user management API endpoints.
//!
//! Role checks happen in the route layer; by the time these run the caller is
//! authenticated and holds one of the roles the route allows.

use crate::api::common::{ApiError, ApiResponse, service_error_to_http};
use crate::auth::models::Identity;
use crate::database::models::{Role, UserProfile};
use crate::services::user_service::UserService;
use crate::state::AppState;
use axum::extract::{Extension, Json, Path};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

/// Retrieves a user by its ID.
#[axum::debug_handler]
pub async fn get_user_by_id(
    Extension(state): Extension<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    tracing::info!("Getting user by ID: {} for user: {}", id, identity.user_id);

    let user = UserService::new(&state)
        .get_user_required(id)
        .await
        .map_err(service_error_to_http)?;

    Ok(Json(ApiResponse::success(
        user,
        "User retrieved successfully",
    )))
}

/// Changes a user's role.
#[axum::debug_handler]
pub async fn change_user_role(
    Extension(state): Extension<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(payload): Json<ChangeRoleRequest>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    let user = UserService::new(&state)
        .change_role(&identity, id, payload.role)
        .await
        .map_err(|e| {
            tracing::error!("Failed to change role for ID {}: {}", id, e);
            service_error_to_http(e)
        })?;

    Ok(Json(ApiResponse::success(
        user,
        "Role updated successfully",
    )))
}

/// Soft-deactivates a user.
#[axum::debug_handler]
pub async fn deactivate_user(
    Extension(state): Extension<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    let user = UserService::new(&state)
        .deactivate(&identity, id)
        .await
        .map_err(service_error_to_http)?;

    Ok(Json(ApiResponse::success(user, "User deactivated")))
}
