// Library crate for the boardcast real-time server
// This file exposes the public API for the binary and integration tests

pub mod cache;
pub mod config;
pub mod event;
pub mod health;
pub mod routes;
pub mod session;
pub mod shared;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use cache::{CacheProvider, InMemoryCacheProvider};
pub use config::AppConfig;
pub use event::{DomainEvent, EventBus, EventKind};
pub use routes::build_router;
pub use session::{InMemorySessionRepository, SessionService};
pub use shared::{AppError, AppState};
pub use websockets::{DisconnectEffects, Hub, HubHandle, OutboundMessage};
