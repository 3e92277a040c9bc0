use axum::{extract::State, Json};
use serde::Serialize;

use crate::shared::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub connections: usize,
}

/// Liveness probe reporting the current number of live connections
/// GET /health
pub async fn health_check(State(app_state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        connections: app_state.hub.live_connections(),
    })
}
