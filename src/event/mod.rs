// Event-driven architecture components
//
// The forum's services publish domain events here after their own writes
// succeed; the websocket hub consumes them and fans them out to clients.

// Public API - what other modules can use
pub use bus::{EventBus, EventStream, DEFAULT_QUEUE_CAPACITY};
pub use events::{
    DomainEvent, EventKind, MessageCreated, NicknameUpdated, StatsUpdated, ThreadCreated,
};
pub use handler::{EventError, EventHandler};
pub use handlers::{publish_event, PublishRequest};

// Internal modules
mod bus;
mod events;
mod handler;
mod handlers;
