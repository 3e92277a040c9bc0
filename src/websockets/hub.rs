use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::{session_cache_key, CacheProvider};
use crate::event::{DomainEvent, EventBus, EventStream};
use crate::session::SessionService;

use super::registry::{Connection, ConnectionId, ConnectionRegistry};
use super::router::route;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("hub is no longer running")]
    Closed,

    #[error("event stream already has a consumer")]
    StreamTaken,
}

/// Best-effort cleanup run after a connection is removed
///
/// Both calls run on their own tasks so a slow store never stalls the hub.
/// Failures are logged and not retried.
#[derive(Clone)]
pub struct DisconnectEffects {
    sessions: Arc<SessionService>,
    cache: Arc<dyn CacheProvider>,
    cache_timeout: Duration,
}

impl DisconnectEffects {
    pub fn new(
        sessions: Arc<SessionService>,
        cache: Arc<dyn CacheProvider>,
        cache_timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            cache,
            cache_timeout,
        }
    }

    pub fn schedule(&self, user_id: u64, session_id: u64) {
        let sessions = self.sessions.clone();
        tokio::spawn(async move {
            if let Err(e) = sessions.end_session(session_id).await {
                error!(session_id = session_id, error = %e, "Failed to end session");
            }
        });

        let cache = self.cache.clone();
        let key = session_cache_key(user_id, session_id);
        let timeout = self.cache_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, cache.delete(&key)).await {
                Ok(Ok(removed)) => {
                    debug!(key = %key, removed = removed, "Session cache invalidated")
                }
                Ok(Err(e)) => error!(key = %key, error = %e, "Failed to invalidate session cache"),
                Err(_) => error!(key = %key, "Session cache invalidation timed out"),
            }
        });
    }
}

/// Live-set changes, queued in the order their senders issued them
///
/// One queue for both kinds keeps a connection's register ahead of its own
/// unregister.
#[derive(Debug)]
pub enum HubCommand {
    Register(Connection),
    Unregister(ConnectionId),
}

/// Cloneable front door to the hub
///
/// Everything that wants the live set changed goes through the command queue;
/// only the hub task touches the registry.
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
    shutdown: Arc<Notify>,
    live: watch::Receiver<usize>,
}

impl HubHandle {
    pub fn register(&self, connection: Connection) -> Result<(), HubError> {
        self.commands
            .send(HubCommand::Register(connection))
            .map_err(|_| HubError::Closed)
    }

    /// Asks for a connection's removal; unknown or already removed ids are ignored
    pub fn unregister(&self, id: ConnectionId) -> Result<(), HubError> {
        self.commands
            .send(HubCommand::Unregister(id))
            .map_err(|_| HubError::Closed)
    }

    /// Closes every live endpoint; the hub exits once they have all unregistered
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    pub fn live_connections(&self) -> usize {
        *self.live.borrow()
    }

    /// Resolves once the live count equals `count`
    pub async fn wait_for_count(&self, count: usize) -> Result<(), HubError> {
        let mut live = self.live.clone();
        let reached = live.wait_for(|current| *current == count).await.is_ok();

        if reached {
            Ok(())
        } else {
            Err(HubError::Closed)
        }
    }
}

/// The coordinator: sole owner of the live-connection set
pub struct Hub {
    registry: ConnectionRegistry,
    commands: mpsc::UnboundedReceiver<HubCommand>,
    events: EventStream,
    shutdown: Arc<Notify>,
    live: watch::Sender<usize>,
    effects: DisconnectEffects,
    draining: bool,
}

impl Hub {
    /// Creates the hub as the bus's queue consumer
    pub fn new(bus: &EventBus, effects: DisconnectEffects) -> Result<(Self, HubHandle), HubError> {
        let events = bus.take_stream().ok_or(HubError::StreamTaken)?;
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (live_tx, live_rx) = watch::channel(0);
        let shutdown = Arc::new(Notify::new());

        let hub = Self {
            registry: ConnectionRegistry::new(),
            commands: command_rx,
            events,
            shutdown: shutdown.clone(),
            live: live_tx,
            effects,
            draining: false,
        };
        let handle = HubHandle {
            commands: command_tx,
            shutdown,
            live: live_rx,
        };

        Ok((hub, handle))
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        info!("Hub started");

        loop {
            tokio::select! {
                Some(command) = self.commands.recv() => match command {
                    HubCommand::Register(connection) => self.register(connection),
                    HubCommand::Unregister(id) => self.remove(&id, "unregistered"),
                },
                Some(event) = self.events.recv() => {
                    if self.draining {
                        debug!(event = %event.kind(), "Dropping event while draining");
                    } else {
                        self.dispatch(&event);
                    }
                }
                _ = self.shutdown.notified(), if !self.draining => self.begin_drain(),
                else => break,
            }

            if self.draining && self.registry.is_empty() {
                break;
            }
        }

        info!(clients_count = self.registry.len(), "Hub stopped");
    }

    fn register(&mut self, connection: Connection) {
        let client_id = connection.id().clone();
        let user_id = connection.user_id;

        if self.draining {
            // Keep it until its adapter unregisters, so the drain still waits for it
            connection.close();
        }

        if !self.registry.insert(connection) {
            warn!(client_id = %client_id, "Connection already registered");
            return;
        }
        self.publish_count();

        info!(
            client_id = %client_id,
            user_id = user_id,
            clients_count = self.registry.len(),
            "Client connected"
        );
    }

    /// Removes a connection, closes it and schedules its cleanup; no-op when absent
    fn remove(&mut self, id: &ConnectionId, reason: &'static str) {
        let Some(connection) = self.registry.remove(id) else {
            debug!(client_id = %id, "Connection already removed");
            return;
        };

        connection.close();
        self.publish_count();

        info!(
            client_id = %id,
            user_id = connection.user_id,
            session_id = connection.session_id,
            reason = reason,
            clients_count = self.registry.len(),
            "Client disconnected"
        );

        self.effects
            .schedule(connection.user_id, connection.session_id);
    }

    fn dispatch(&mut self, event: &DomainEvent) {
        let routed = route(event);
        let payload = match routed.message.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                error!(event = %event.kind(), error = %e, "Failed to serialize event");
                return;
            }
        };

        let mut sent = 0;
        let mut failed = Vec::new();
        for connection in self.registry.recipients(&routed.rule) {
            match connection.send(&payload) {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!(client_id = %connection.id(), error = %e, "Send failed");
                    failed.push(connection.id().clone());
                }
            }
        }

        // Applied after the walk; queueing these to ourselves could deadlock
        for id in &failed {
            self.remove(id, "send failed");
        }

        debug!(
            event = %event.kind(),
            sent_to_clients = sent,
            failed = failed.len(),
            "broadcast completed"
        );
    }

    fn begin_drain(&mut self) {
        info!(
            clients_count = self.registry.len(),
            "Hub shutting down, closing connections"
        );
        self.draining = true;

        for connection in self.registry.iter() {
            connection.close();
        }
    }

    fn publish_count(&self) {
        self.live.send_replace(self.registry.len());
    }
}
