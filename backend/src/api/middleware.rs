//! Cross-cutting middleware applied to every route.
//!
//! - `request_id` tags each request with an id (the caller's `X-Request-ID`
//!   when it sends a usable one), echoes it on the response and exposes it to
//!   error bodies through [`current_request_id`]
//! - `process_time` reports handler latency in `X-Process-Time`
//! - `rate_limit` spends one unit of the caller's budget, keyed by user id
//!   for a valid access token and by peer address otherwise

use crate::api::common::error_response;
use crate::auth::middleware::bearer_token;
use crate::services::rate_limit_service::RateDecision;
use crate::state::AppState;
use axum::{
    extract::{ConnectInfo, Extension, Request},
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::time::Instant;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const PROCESS_TIME_HEADER: &str = "x-process-time";
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests. Please try again later.";

const MAX_REQUEST_ID_LEN: usize = 128;

tokio::task_local! {
    static REQUEST_ID: String;
}

/// Request id attached to the request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Id of the request being served on this task, if any.
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|id| id.clone()).ok()
}

fn incoming_request_id(request: &Request) -> Option<String> {
    let value = request
        .headers()
        .get(REQUEST_ID_HEADER)?
        .to_str()
        .ok()?
        .trim();
    (!value.is_empty() && value.len() <= MAX_REQUEST_ID_LEN).then(|| value.to_string())
}

pub async fn request_id(mut request: Request, next: Next) -> Response {
    let id = incoming_request_id(&request).unwrap_or_else(|| Uuid::new_v4().to_string());
    request.extensions_mut().insert(RequestId(id.clone()));

    let mut response = REQUEST_ID
        .scope(id.clone(), async move { next.run(request).await })
        .await;

    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

pub async fn process_time(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let mut response = next.run(request).await;

    let elapsed = format!("{:.4}", started.elapsed().as_secs_f64());
    if let Ok(value) = HeaderValue::from_str(&elapsed) {
        response.headers_mut().insert(PROCESS_TIME_HEADER, value);
    }
    response
}

fn client_key(state: &AppState, request: &Request) -> String {
    if let Some(user_id) = bearer_token(request).and_then(|token| state.tokens.subject_of(token)) {
        return format!("user:{user_id}");
    }

    match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => format!("ip:{}", addr.ip()),
        None => "ip:unknown".to_string(),
    }
}

/// Rejects callers over budget with `429` and `Retry-After`.
///
/// A cache failure lets the request through; the outage is logged.
pub async fn rate_limit(
    Extension(state): Extension<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&state, &request);

    match state.rate_limiter.check(&client).await {
        Ok(RateDecision::Allowed) => next.run(request).await,
        Ok(RateDecision::Limited { retry_after }) => {
            tracing::warn!("Rate limit exceeded for {}", client);
            let mut response = error_response(
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                RATE_LIMITED_MESSAGE,
            )
            .into_response();
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after));
            response
        }
        Err(e) => {
            tracing::error!("Rate limiter unavailable, allowing request: {}", e);
            next.run(request).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    fn request_with_id(id: &str) -> Request {
        HttpRequest::builder()
            .header(REQUEST_ID_HEADER, id)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_incoming_request_id_accepted_when_usable() {
        assert_eq!(
            incoming_request_id(&request_with_id(" trace-42 ")).as_deref(),
            Some("trace-42")
        );
        assert_eq!(incoming_request_id(&request_with_id("")), None);
        assert_eq!(
            incoming_request_id(&request_with_id(&"x".repeat(MAX_REQUEST_ID_LEN + 1))),
            None
        );
    }

    #[tokio::test]
    async fn test_current_request_id_scoped_to_task() {
        assert_eq!(current_request_id(), None);
        let seen = REQUEST_ID
            .scope("abc".to_string(), async { current_request_id() })
            .await;
        assert_eq!(seen.as_deref(), Some("abc"));
    }
}
