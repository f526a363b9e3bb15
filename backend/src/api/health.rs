//! Liveness report for the database and the cache.

use crate::state::AppState;
use axum::{extract::Extension, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthChecks {
    pub database: String,
    pub cache: String,
}

fn check_status(name: &str, result: anyhow::Result<()>) -> (bool, String) {
    match result {
        Ok(()) => (true, "healthy".to_string()),
        Err(e) => {
            tracing::error!("Health check for {} failed: {:#}", name, e);
            (false, "unhealthy".to_string())
        }
    }
}

/// `200` when every dependency answers, `503` otherwise.
#[axum::debug_handler]
pub async fn health_check(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<HealthReport>) {
    let database = sqlx::query("SELECT 1")
        .execute(&state.pool)
        .await
        .map(|_| ())
        .map_err(anyhow::Error::from);
    let (database_ok, database) = check_status("database", database);
    let (cache_ok, cache) = check_status("cache", state.cache.ping().await);

    let healthy = database_ok && cache_ok;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthReport {
            status: if healthy { "healthy" } else { "degraded" }.to_string(),
            checks: HealthChecks { database, cache },
        }),
    )
}
