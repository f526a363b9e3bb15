//! Middleware for protecting authenticated routes and handling authorization.
//!
//! `jwt_auth` verifies the bearer token and attaches its [`Claims`] and the
//! derived [`Identity`] to the request. `require_roles` runs after it,
//! reloads the caller so a deactivated account loses access at once, and
//! consults [`authorize`] for the route's role list.

use crate::api::common::{ApiError, forbidden, service_error_to_http, unauthorized};
use crate::auth::models::Identity;
use crate::auth::role_gate::authorize;
use crate::database::models::Role;
use crate::errors::AuthError;
use crate::repositories::user_repository::UserRepository;
use crate::state::AppState;
use crate::utils::jwt::{Claims, TokenType};
use axum::{
    extract::{Extension, Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

pub(crate) fn bearer_token(request: &Request) -> Option<&str> {
    let header = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// JWT authentication middleware
pub async fn jwt_auth(
    Extension(state): Extension<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(&request).map(str::to_owned) else {
        tracing::warn!("Missing or malformed Authorization header");
        return Err(unauthorized());
    };

    let claims = state
        .tokens
        .verify(&token, TokenType::Access)
        .await
        .map_err(service_error_to_http)?;

    let identity = identity_from(&claims).map_err(|e| service_error_to_http(e.into()))?;

    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

fn identity_from(claims: &Claims) -> Result<Identity, AuthError> {
    Ok(Identity {
        user_id: claims.user_id()?,
        role: claims
            .role()
            .ok_or_else(|| AuthError::token_invalid("access token without role"))?,
    })
}

/// Role authorization middleware; must be layered inside `jwt_auth`.
pub async fn require_roles(
    State(required_roles): State<&'static [Role]>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (Some(identity), Some(state)) = (
        request.extensions().get::<Identity>().copied(),
        request.extensions().get::<AppState>().cloned(),
    ) else {
        return Err(unauthorized());
    };

    let active = UserRepository::new(&state.pool)
        .get_user_by_id(identity.user_id)
        .await
        .map_err(|e| service_error_to_http(e.into()))?
        .is_some_and(|user| user.is_active);
    if !active {
        tracing::warn!("Token for missing or inactive user {} rejected", identity.user_id);
        return Err(unauthorized());
    }

    if !authorize(&identity, required_roles) {
        tracing::warn!(
            "User {} with role {} denied, requires one of {:?}",
            identity.user_id,
            identity.role,
            required_roles
        );
        return Err(forbidden());
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    fn request_with(header: &str) -> Request {
        HttpRequest::builder()
            .header(AUTHORIZATION, header)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&request_with("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&request_with("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&request_with("Basic abc")), None);
        assert_eq!(bearer_token(&request_with("Bearer ")), None);
        assert_eq!(bearer_token(&request_with("abc")), None);
    }
}
