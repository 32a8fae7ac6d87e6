//! Health check routes.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde::Serialize;

use crate::api::server::AppState;

/// Create the health router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/live", get(liveness_check))
}

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Fallback checks not yet acknowledged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_fallbacks: Option<i64>,
    pub components: Vec<ComponentHealth>,
}

/// Health check endpoint. `503` when the database is unreachable.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();
    let mut healthy = true;

    let database = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => ComponentHealth {
            name: "database".to_string(),
            status: "healthy".to_string(),
            message: None,
        },
        Err(e) => {
            healthy = false;
            ComponentHealth {
                name: "database".to_string(),
                status: "unhealthy".to_string(),
                message: Some(e.to_string()),
            }
        }
    };
    let components = vec![database];

    let pending_fallbacks = if healthy {
        state.fallback_queue.pending_count().await.ok()
    } else {
        None
    };

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: uptime,
        pending_fallbacks,
        components,
    };
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(response))
}

/// Liveness check - is the service alive?
async fn liveness_check(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "alive",
            "uptime_secs": uptime
        })),
    )
}
