use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::metrics;
use crate::runtime::RuntimeState;

/// Static liveness body served at `/`
pub async fn index_handler() -> &'static str {
    "OK"
}

/// Liveness probe - returns 200 if the process is serving HTTP
pub async fn health_live_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

/// Readiness probe - 200 only while the bot runtime accepts updates and the
/// database answers
pub async fn health_ready_handler(State(state): State<AppState>) -> Response {
    let runtime_state = state.runtime.state();
    let stats = if state.db.ping().await {
        state.db.get_stats().await.ok()
    } else {
        None
    };
    let snapshot = state.metrics.snapshot();

    let ready = runtime_state == RuntimeState::Running && stats.is_some();
    let body = metrics::HealthStatus {
        status: if ready { "ready" } else { "not_ready" }.to_string(),
        runtime: runtime_state.to_string(),
        database: if stats.is_some() {
            "connected"
        } else {
            "disconnected"
        }
        .to_string(),
        records: stats.as_ref().map(|s| s.records).unwrap_or(0),
        owners: stats.as_ref().map(|s| s.owners).unwrap_or(0),
        uptime_secs: snapshot.uptime_secs,
        errors: snapshot.errors.total(),
    };

    if ready {
        Json(body).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

/// Metrics endpoint - returns detailed pipeline counters
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}
