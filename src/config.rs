use std::str::FromStr;
use std::time::Duration;

use crate::event::DEFAULT_QUEUE_CAPACITY;

/// Runtime configuration, read from the environment at start-up
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_port: u16,
    /// Postgres connection string; the in-memory session store is used when unset
    pub database_url: Option<String>,
    /// Redis URL; the in-memory cache is used when unset
    pub redis_url: Option<String>,
    /// JSON users and sessions for the in-memory store; a bundled set is used when unset
    pub seed_file: Option<String>,
    /// Bearer token required by `POST /events`; the route is open when unset
    pub events_token: Option<String>,
    pub event_queue_capacity: usize,
    /// How long after a nickname change a new connection is reminded of it
    pub nickname_cooldown: Duration,
    pub shutdown_grace: Duration,
    pub cache_timeout: Duration,
    /// Per-connection outbound buffer; a full buffer counts as a dead client
    pub outbound_buffer: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: 8080,
            database_url: None,
            redis_url: None,
            seed_file: None,
            events_token: None,
            event_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            nickname_cooldown: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(5),
            cache_timeout: Duration::from_millis(1000),
            outbound_buffer: 64,
        }
    }
}

impl AppConfig {
    /// Reads the configuration from environment variables
    ///
    /// Missing or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            server_port: parsed(&lookup, "SERVER_PORT").unwrap_or(defaults.server_port),
            database_url: non_empty("DATABASE_URL"),
            redis_url: non_empty("REDIS_URL"),
            seed_file: non_empty("SEED_FILE"),
            events_token: non_empty("EVENTS_TOKEN"),
            event_queue_capacity: parsed::<usize>(&lookup, "EVENT_QUEUE_CAPACITY")
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.event_queue_capacity),
            nickname_cooldown: parsed(&lookup, "NICKNAME_COOLDOWN_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.nickname_cooldown),
            shutdown_grace: parsed(&lookup, "SHUTDOWN_GRACE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_grace),
            cache_timeout: parsed(&lookup, "CACHE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.cache_timeout),
            outbound_buffer: parsed::<usize>(&lookup, "OUTBOUND_BUFFER")
                .filter(|size| *size > 0)
                .unwrap_or(defaults.outbound_buffer),
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse().ok())
}
