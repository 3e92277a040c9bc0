#![allow(dead_code)] // Test utilities may not all be used in every test

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use boardcast::{
    cache::CacheProvider,
    session::{InMemorySessionRepository, SessionModel, SessionRepository, UserModel},
    websockets::{Endpoint, SocketError},
    AppError,
};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Endpoint standing in for a client socket; sent messages land in a channel
pub struct MockEndpoint {
    messages: mpsc::UnboundedSender<String>,
    failing: AtomicBool,
    closes: AtomicUsize,
}

impl MockEndpoint {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (messages, inbox) = mpsc::unbounded_channel();
        let endpoint = Arc::new(Self {
            messages,
            failing: AtomicBool::new(false),
            closes: AtomicUsize::new(0),
        });
        (endpoint, inbox)
    }

    /// Makes every later send fail, as a dead socket would
    pub fn break_connection(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Endpoint for MockEndpoint {
    fn send(&self, message: &str) -> Result<(), SocketError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SocketError::SendFailed("broken pipe".to_string()));
        }
        self.messages
            .send(message.to_string())
            .map_err(|_| SocketError::ConnectionClosed)
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Session store that counts how often each session is ended
#[derive(Default)]
pub struct CountingSessionRepository {
    inner: InMemorySessionRepository,
    ended: Mutex<HashMap<u64, usize>>,
}

impl CountingSessionRepository {
    pub fn new(users: Vec<UserModel>, sessions: Vec<SessionModel>) -> Self {
        Self {
            inner: InMemorySessionRepository::with_data(users, sessions),
            ended: Mutex::new(HashMap::new()),
        }
    }

    pub fn end_calls(&self, session_id: u64) -> usize {
        self.ended
            .lock()
            .unwrap()
            .get(&session_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl SessionRepository for CountingSessionRepository {
    async fn get_session_by_key(
        &self,
        session_key: &str,
    ) -> Result<Option<SessionModel>, AppError> {
        self.inner.get_session_by_key(session_key).await
    }

    async fn get_user(&self, user_id: u64) -> Result<Option<UserModel>, AppError> {
        self.inner.get_user(user_id).await
    }

    async fn mark_session_ended(&self, session_id: u64) -> Result<(), AppError> {
        *self.ended.lock().unwrap().entry(session_id).or_default() += 1;
        self.inner.mark_session_ended(session_id).await
    }
}

/// Cache that records every invalidation instead of storing anything
#[derive(Default)]
pub struct RecordingCacheProvider {
    deleted: Mutex<Vec<String>>,
}

impl RecordingCacheProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deletions_of(&self, key: &str) -> usize {
        self.deleted
            .lock()
            .unwrap()
            .iter()
            .filter(|deleted| deleted.as_str() == key)
            .count()
    }

    pub fn total_deletions(&self) -> usize {
        self.deleted.lock().unwrap().len()
    }
}

#[async_trait]
impl CacheProvider for RecordingCacheProvider {
    async fn delete(&self, key: &str) -> Result<u64, AppError> {
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(1)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, AppError> {
        self.deleted.lock().unwrap().push(pattern.to_string());
        Ok(0)
    }
}
