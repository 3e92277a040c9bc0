use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::event::publish_event;
use crate::health::health_check;
use crate::shared::AppState;
use crate::websockets::websocket_handler;

/// Builds the application router
///
/// The forum front-end is served from another origin, hence the permissive CORS layer.
pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/events", post(publish_event))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
