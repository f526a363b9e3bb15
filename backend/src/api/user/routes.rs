//! Defines the HTTP routes for user management.
//!
//! Layers run bottom-up: `jwt_auth` verifies the token before
//! `require_roles` checks the route's role list.

use super::handlers::{change_user_role, deactivate_user, get_user_by_id};
use crate::auth::middleware::{jwt_auth, require_roles};
use crate::database::models::Role;
use axum::{
    Router, middleware,
    routing::{get, post},
};

const ADMIN_ONLY: &[Role] = &[Role::Admin];
const ADMIN_OR_STAFF: &[Role] = &[Role::Admin, Role::Staff];

pub fn user_router() -> Router {
    Router::new()
        .route(
            "/{id}",
            get(get_user_by_id)
                .layer(middleware::from_fn_with_state(ADMIN_OR_STAFF, require_roles))
                .layer(middleware::from_fn(jwt_auth)),
        )
        .route(
            "/{id}/role",
            post(change_user_role)
                .layer(middleware::from_fn_with_state(ADMIN_ONLY, require_roles))
                .layer(middleware::from_fn(jwt_auth)),
        )
        .route(
            "/{id}/deactivate",
            post(deactivate_user)
                .layer(middleware::from_fn_with_state(ADMIN_ONLY, require_roles))
                .layer(middleware::from_fn(jwt_auth)),
        )
}
