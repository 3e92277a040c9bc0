use thiserror::Error;

use super::events::{DomainEvent, EventKind};

/// Errors raised while turning a producer's payload into a domain event
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Unknown event kind: {0}")]
    UnknownKind(String),

    #[error("{kind} event is missing required field {field}")]
    MissingField {
        kind: EventKind,
        field: &'static str,
    },

    #[error("{kind} event has an invalid payload: {reason}")]
    InvalidPayload { kind: EventKind, reason: String },
}

/// Trait for components that react to domain events through a direct callback
///
/// Callbacks run synchronously on the publisher's code path, so they must be
/// quick and must not block. The coordinator never registers one of these:
/// it reads the bus's queue instead, which keeps each event from being
/// dispatched to clients twice.
///
/// Examples:
/// - AuditLogHandler: records every published event
/// - CacheWarmHandler: refreshes a read model after a write
pub trait EventHandler: Send + Sync {
    /// Handle a published event
    fn handle(&self, event: &DomainEvent);

    /// Get a human-readable name for this handler (for logging/debugging)
    fn name(&self) -> &'static str;
}

