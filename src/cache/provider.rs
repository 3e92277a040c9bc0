use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, instrument, warn};

use crate::shared::AppError;

/// Trait for the key/value cache sitting in front of the forum's database
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Deletes one key, returning how many entries were removed
    async fn delete(&self, key: &str) -> Result<u64, AppError>;

    /// Deletes every key matching a glob pattern (`*`, `?` and `[...]` classes)
    async fn delete_pattern(&self, pattern: &str) -> Result<u64, AppError>;
}

/// In-memory implementation of CacheProvider for development and testing
pub struct InMemoryCacheProvider {
    entries: Mutex<HashMap<String, String>>,
}

impl Default for InMemoryCacheProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCacheProvider {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheProvider for InMemoryCacheProvider {
    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<u64, AppError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = u64::from(entries.remove(key).is_some());
        debug!(removed = removed, "Deleted cache key from memory");
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn delete_pattern(&self, pattern: &str) -> Result<u64, AppError> {
        let matcher = glob::Pattern::new(pattern).map_err(|e| {
            warn!(error = %e, "Invalid cache key pattern");
            AppError::CacheError(e.to_string())
        })?;

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|key, _| !matcher.matches(key));
        let removed = (before - entries.len()) as u64;
        debug!(removed = removed, "Deleted cache keys by pattern from memory");
        Ok(removed)
    }
}

/// Redis-backed cache provider
///
/// The connection manager reconnects on its own, so one instance is shared
/// for the lifetime of the process.
#[derive(Clone)]
pub struct RedisCacheProvider {
    connection: ConnectionManager,
}

impl RedisCacheProvider {
    /// Connects to the Redis instance at `url` (`redis://host:port/db`)
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(url).map_err(|e| {
            warn!(error = %e, "Invalid Redis URL");
            AppError::CacheError(e.to_string())
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            warn!(error = %e, "Redis connection failed at startup");
            AppError::CacheError(e.to_string())
        })?;

        info!("Redis connected");
        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheProvider for RedisCacheProvider {
    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<u64, AppError> {
        let mut connection = self.connection.clone();
        let removed: u64 = connection
            .del(key)
            .await
            .map_err(|e| AppError::CacheError(e.to_string()))?;

        debug!(removed = removed, "Redis DEL executed");
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn delete_pattern(&self, pattern: &str) -> Result<u64, AppError> {
        let mut connection = self.connection.clone();
        let keys: Vec<String> = connection
            .keys(pattern)
            .await
            .map_err(|e| AppError::CacheError(e.to_string()))?;

        if keys.is_empty() {
            return Ok(0);
        }

        let removed: u64 = connection
            .del(&keys)
            .await
            .map_err(|e| AppError::CacheError(e.to_string()))?;

        debug!(removed = removed, "Redis pattern delete executed");
        Ok(removed)
    }
}
