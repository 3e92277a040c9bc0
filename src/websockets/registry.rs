use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::router::RecipientRule;
use super::socket::{Endpoint, SocketError};

/// Unique identifier for a connection (server-generated, never reused)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One live, authenticated client
///
/// Once registered the hub owns it; the adapter only keeps the id around to
/// ask for its removal.
pub struct Connection {
    id: ConnectionId,
    pub user_id: u64,
    pub session_id: u64,
    endpoint: Arc<dyn Endpoint>,
}

impl Connection {
    pub fn new(user_id: u64, session_id: u64, endpoint: Arc<dyn Endpoint>) -> Self {
        Self {
            id: ConnectionId::new(),
            user_id,
            session_id,
            endpoint,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn send(&self, message: &str) -> Result<(), SocketError> {
        self.endpoint.send(message)
    }

    pub fn close(&self) {
        self.endpoint.close();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("session_id", &self.session_id)
            .finish()
    }
}

/// The live-connection set, with a secondary index by user for targeted delivery
///
/// Not synchronized: the hub's coordinator task is its only owner.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
    user_index: HashMap<u64, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a connection; returns false if its id is already present
    pub fn insert(&mut self, connection: Connection) -> bool {
        if self.connections.contains_key(connection.id()) {
            return false;
        }

        self.user_index
            .entry(connection.user_id)
            .or_default()
            .insert(connection.id().clone());
        self.connections.insert(connection.id().clone(), connection);
        true
    }

    /// Removes a connection; absent ids are a no-op
    pub fn remove(&mut self, id: &ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(id)?;

        if let Some(ids) = self.user_index.get_mut(&connection.user_id) {
            ids.remove(id);
            if ids.is_empty() {
                self.user_index.remove(&connection.user_id);
            }
        }

        Some(connection)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Connections a message with this rule goes to
    pub fn recipients(&self, rule: &RecipientRule) -> Vec<&Connection> {
        match rule {
            RecipientRule::Broadcast => self.connections.values().collect(),
            RecipientRule::User(user_id) => self
                .user_index
                .get(user_id)
                .into_iter()
                .flatten()
                .filter_map(|id| self.connections.get(id))
                .collect(),
        }
    }

    /// Number of live connections owned by a user
    pub fn user_connection_count(&self, user_id: u64) -> usize {
        self.user_index.get(&user_id).map_or(0, HashSet::len)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }
}
