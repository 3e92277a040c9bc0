use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use super::events::{DomainEvent, EventKind};
use super::handler::EventHandler;

/// Default number of events the queue holds before publishers start dropping
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Queue-mode view of the bus, consumed by exactly one task
pub type EventStream = mpsc::Receiver<DomainEvent>;

type HandlerMap = HashMap<EventKind, Vec<Arc<dyn EventHandler>>>;

/// Process-wide publish point between the forum's services and its listeners
///
/// Two delivery modes coexist:
/// - callbacks registered with [`EventBus::subscribe`], invoked synchronously
///   by `publish`
/// - a bounded queue handed out once by [`EventBus::take_stream`]
///
/// Publishing never blocks: when the queue is full the event is dropped.
#[derive(Clone)]
pub struct EventBus {
    sender: mpsc::Sender<DomainEvent>,
    stream: Arc<Mutex<Option<EventStream>>>,
    handlers: Arc<RwLock<HandlerMap>>,
}

impl EventBus {
    /// Creates a new event bus whose queue holds `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));

        Self {
            sender,
            stream: Arc::new(Mutex::new(Some(receiver))),
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Publishes an event to every callback for its kind and to the queue
    pub fn publish(&self, event: DomainEvent) {
        let kind = event.kind();

        // Clone the list so a callback may subscribe without deadlocking
        let handlers = {
            let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
            handlers.get(&kind).cloned().unwrap_or_default()
        };

        for handler in &handlers {
            debug!(event = %kind, handler = handler.name(), "Invoking event callback");
            handler.handle(&event);
        }

        match self.sender.try_send(event) {
            Ok(()) => {
                debug!(event = %kind, "Event queued");
            }
            Err(TrySendError::Full(_)) => {
                warn!(event = %kind, "Event queue full - dropping event");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(event = %kind, "Event queue has no consumer - dropping event");
            }
        }
    }

    /// Publishes an untyped `(kind, payload)` pair, dropping it if malformed
    pub fn publish_raw(&self, kind: &str, payload: Value) {
        match DomainEvent::from_parts(kind, payload) {
            Ok(event) => self.publish(event),
            Err(e) => {
                warn!(event = %kind, error = %e, "Rejected malformed event");
            }
        }
    }

    /// Registers a callback for one event kind
    ///
    /// Earlier handlers for the same kind stay registered.
    pub fn subscribe(&self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        debug!(event = %kind, handler = handler.name(), "Registering event callback");

        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers.entry(kind).or_default().push(handler);
    }

    /// Hands out the queue receiver; only the first caller gets it
    pub fn take_stream(&self) -> Option<EventStream> {
        self.stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Number of callbacks registered for a kind
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
