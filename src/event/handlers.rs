use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::events::DomainEvent;
use crate::shared::{AppError, AppState};

/// Body of `POST /events`
#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

/// HTTP handler for services that publish domain events from another process
///
/// POST /events
/// Returns 202 once the event is handed to the bus; delivery stays best effort.
#[instrument(name = "publish_event", skip(state, headers, request))]
pub async fn publish_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PublishRequest>,
) -> Result<StatusCode, AppError> {
    if let Some(expected) = state.config.events_token.as_deref() {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .and_then(|header| header.strip_prefix("Bearer "));

        if token != Some(expected) {
            warn!("Missing or wrong bearer token on event publish");
            return Err(AppError::Unauthorized("invalid events token".to_string()));
        }
    }

    let event = DomainEvent::from_parts(&request.event, request.payload).map_err(|e| {
        warn!(event = %request.event, error = %e, "Rejected malformed event");
        AppError::BadRequest(e.to_string())
    })?;

    info!(event = %event.kind(), "Publishing event");
    state.event_bus.publish(event);

    Ok(StatusCode::ACCEPTED)
}
