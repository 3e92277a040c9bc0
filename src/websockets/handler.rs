use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::Utc;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::session::SessionIdentity;
use crate::shared::{AppError, AppState};

use super::registry::{Connection, ConnectionId};
use super::router::cooldown_notice;
use super::socket::{ChannelEndpoint, Endpoint};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub session_key: Option<String>,
}

/// WebSocket endpoint authenticated by a session key
/// GET /ws?session_key=<key>
///
/// The key is checked before upgrading, so a bad key gets a plain HTTP error.
pub async fn websocket_handler(
    Query(query): Query<WsQuery>,
    State(app_state): State<AppState>,
    ws: Option<WebSocketUpgrade>,
) -> Result<Response, AppError> {
    let session_key = query
        .session_key
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            warn!("WebSocket connection requested without a session key");
            AppError::BadRequest("session_key is required".to_string())
        })?;

    let identity = app_state.session_service.resolve(&session_key).await?;

    let ws = ws.ok_or_else(|| {
        warn!(user_id = identity.user_id, "Session resolved but request is not an upgrade");
        AppError::BadRequest("websocket upgrade required".to_string())
    })?;

    info!(
        user_id = identity.user_id,
        session_id = identity.session_id,
        "WebSocket authentication successful"
    );

    Ok(ws.on_upgrade(move |socket| run_connection(socket, identity, app_state)))
}

/// Drives one upgraded connection from registration to unregistration
///
/// The writer task owns the socket sink; this task only watches the read side
/// for the client going away.
pub async fn run_connection(socket: WebSocket, identity: SessionIdentity, app_state: AppState) {
    let (sink, mut stream) = socket.split();
    let (endpoint, outbound) = ChannelEndpoint::new(app_state.config.outbound_buffer);
    let endpoint: Arc<dyn Endpoint> = Arc::new(endpoint);
    let mut writer = tokio::spawn(outbound.drain_into(sink));

    let connection = Connection::new(identity.user_id, identity.session_id, endpoint.clone());
    let client_id = connection.id().clone();

    if let Err(e) = app_state.hub.register(connection) {
        warn!(client_id = %client_id, error = %e, "Could not register connection");
        endpoint.close();
        return;
    }

    // Point-to-point, so a busy hub cannot hold it up
    if let Some(notice) = cooldown_notice(
        &identity,
        Utc::now(),
        app_state.config.nickname_cooldown,
    ) {
        match notice.to_json() {
            Ok(text) => {
                if let Err(e) = endpoint.send(&text) {
                    warn!(client_id = %client_id, error = %e, "Failed to send cooldown notice");
                } else {
                    debug!(client_id = %client_id, "Sent nickname cooldown notice");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize cooldown notice"),
        }
    }

    tokio::select! {
        _ = read_until_closed(&mut stream, &client_id) => {}
        _ = &mut writer => {
            debug!(client_id = %client_id, "Writer finished before the client left");
        }
    }

    endpoint.close();
    if let Err(e) = app_state.hub.unregister(client_id.clone()) {
        debug!(client_id = %client_id, error = %e, "Hub gone before unregister");
    }

    info!(
        client_id = %client_id,
        user_id = identity.user_id,
        "WebSocket connection closed"
    );
}

/// Reads until the client closes, the stream ends or a read fails
///
/// Inbound frames carry no meaning; the loop exists to notice disconnects.
async fn read_until_closed<S, E>(stream: &mut S, client_id: &ConnectionId)
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Close(_)) => {
                debug!(client_id = %client_id, "Client sent close frame");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                debug!(client_id = %client_id, error = %e, "WebSocket read failed");
                return;
            }
        }
    }
    debug!(client_id = %client_id, "WebSocket stream ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn test_read_loop_ignores_data_until_close() {
        let frames = vec![
            Ok::<_, String>(Message::Text("hello".to_string())),
            Ok(Message::Ping(vec![1])),
            Ok(Message::Close(None)),
            Ok(Message::Text("after close".to_string())),
        ];
        let mut frames = stream::iter(frames);

        read_until_closed(&mut frames, &ConnectionId::new()).await;

        // The frame after the close is left unread
        assert_eq!(
            frames.next().await,
            Some(Ok(Message::Text("after close".to_string())))
        );
    }

    #[tokio::test]
    async fn test_read_loop_stops_on_error() {
        let frames = vec![
            Err("reset".to_string()),
            Ok(Message::Text("never read".to_string())),
        ];
        let mut frames = stream::iter(frames);

        read_until_closed(&mut frames, &ConnectionId::new()).await;

        assert!(frames.next().await.is_some());
    }

    #[tokio::test]
    async fn test_read_loop_stops_at_end_of_stream() {
        let mut frames = stream::iter(Vec::<Result<Message, String>>::new());
        read_until_closed(&mut frames, &ConnectionId::new()).await;
    }
}
