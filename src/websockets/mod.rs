// Real-time fan-out of domain events to connected browsers
//
// The hub task owns the live-connection set; adapters and the event bus only
// talk to it through queues.

// Public API
pub use handler::{run_connection, websocket_handler, WsQuery};
pub use hub::{DisconnectEffects, Hub, HubError, HubHandle};
pub use messages::OutboundMessage;
pub use registry::{Connection, ConnectionId, ConnectionRegistry};
pub use router::{cooldown_notice, route, RecipientRule, RoutedEvent};
pub use socket::{ChannelEndpoint, Endpoint, OutboundQueue, SocketError};

// Internal modules
mod handler;
mod hub;
mod messages;
mod registry;
mod router;
mod socket;
