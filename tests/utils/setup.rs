#![allow(dead_code)] // Test utilities may not all be used in every test

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use boardcast::{
    session::{SessionModel, UserModel},
    websockets::{Connection, ConnectionId},
    AppConfig, AppState, DisconnectEffects, EventBus, Hub, HubHandle, SessionService,
};

use super::mocks::{CountingSessionRepository, MockEndpoint, RecordingCacheProvider};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub event_bus: EventBus,
    pub hub: HubHandle,
    pub sessions: Arc<CountingSessionRepository>,
    pub cache: Arc<RecordingCacheProvider>,
    pub app_state: AppState,
    pub hub_task: JoinHandle<()>,
}

/// A client attached to the hub through a mock endpoint
pub struct TestClient {
    pub id: ConnectionId,
    pub user_id: u64,
    pub session_id: u64,
    pub endpoint: Arc<MockEndpoint>,
    pub inbox: mpsc::UnboundedReceiver<String>,
}

pub struct TestSetupBuilder {
    users: Vec<UserModel>,
    sessions: Vec<SessionModel>,
    queue_capacity: usize,
    events_token: Option<String>,
}

impl TestSetupBuilder {
    /// Users 1 (Fox), 2 (Owl) and 3 (Cat) with sessions 10, 20 and 30
    pub fn new() -> Self {
        Self {
            users: vec![
                UserModel::new(1, "Fox"),
                UserModel::new(2, "Owl"),
                UserModel::new(3, "Cat"),
            ],
            sessions: vec![
                SessionModel::new(10, "key-fox", 1),
                SessionModel::new(20, "key-owl", 2),
                SessionModel::new(30, "key-cat", 3),
            ],
            queue_capacity: 100,
            events_token: None,
        }
    }

    /// Marks a user's nickname as changed `secs_ago` seconds ago
    pub fn with_nickname_changed(mut self, user_id: u64, secs_ago: i64) -> Self {
        for user in self.users.iter_mut().filter(|u| u.id == user_id) {
            user.last_nickname_change = Some(Utc::now() - ChronoDuration::seconds(secs_ago));
        }
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Requires `Authorization: Bearer <token>` on `POST /events`
    pub fn with_events_token(mut self, token: &str) -> Self {
        self.events_token = Some(token.to_string());
        self
    }

    /// Builds the collaborators and spawns the hub; needs a tokio runtime
    pub fn build(self) -> TestSetup {
        let sessions = Arc::new(CountingSessionRepository::new(self.users, self.sessions));
        let cache = Arc::new(RecordingCacheProvider::new());
        let session_service = Arc::new(SessionService::new(sessions.clone()));

        let config = AppConfig {
            event_queue_capacity: self.queue_capacity,
            shutdown_grace: Duration::from_secs(1),
            events_token: self.events_token,
            ..AppConfig::default()
        };

        let event_bus = EventBus::new(config.event_queue_capacity);
        let effects = DisconnectEffects::new(
            session_service.clone(),
            cache.clone(),
            config.cache_timeout,
        );
        let (hub, hub_handle) = Hub::new(&event_bus, effects).unwrap();
        let hub_task = hub.spawn();

        let app_state = AppState::new(
            session_service,
            event_bus.clone(),
            hub_handle.clone(),
            config,
        );

        TestSetup {
            event_bus,
            hub: hub_handle,
            sessions,
            cache,
            app_state,
            hub_task,
        }
    }
}

impl TestSetup {
    /// Registers a client and waits until the hub has it in the live set
    pub async fn connect(&self, user_id: u64, session_id: u64) -> TestClient {
        let (endpoint, inbox) = MockEndpoint::new();
        let connection = Connection::new(user_id, session_id, endpoint.clone());
        let id = connection.id().clone();
        let expected = self.hub.live_connections() + 1;

        self.hub.register(connection).unwrap();
        self.hub.wait_for_count(expected).await.unwrap();

        TestClient {
            id,
            user_id,
            session_id,
            endpoint,
            inbox,
        }
    }

    /// Submits the unregister request a client's read loop would send on exit
    pub fn disconnect(&self, client: &TestClient) {
        self.hub.unregister(client.id.clone()).unwrap();
    }
}
