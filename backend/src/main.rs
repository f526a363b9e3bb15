//! Main entry point for the student management backend.
//!
//! This file initializes the Axum web server, sets up database and cache
//! connections, and registers all API routes and middleware.
//! It orchestrates the application's startup and defines its overall structure.

mod api;
mod auth;
mod cache;
mod config;
mod database;
mod errors;
mod repositories;
mod services;
mod state;
mod utils;

use crate::api::common::ApiResponse;
use anyhow::Context;
use axum::{Extension, Router, middleware::from_fn, response::Json, routing::get};
use config::Config;
use state::AppState;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let port = config.server_port;
    let state = AppState::initialize(config).await?;

    let bind_address = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;

    let pool = state.pool.clone();

    info!("Starting student backend on port {}", port);
    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    pool.close().await;
    info!("Database connection pool closed.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(api::health::health_check))
        .nest("/auth", auth::routes::auth_router())
        .nest("/api/users", api::user::routes::user_router())
        .layer(from_fn(api::middleware::rate_limit))
        .layer(Extension(state))
        .layer(from_fn(api::middleware::process_time))
        .layer(from_fn(api::middleware::request_id))
        .layer(TraceLayer::new_for_http())
}

async fn root_handler() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(
        serde_json::json!({
            "service": "Student Backend",
            "version": env!("CARGO_PKG_VERSION")
        }),
        "Welcome to the Student Management API",
    ))
}
