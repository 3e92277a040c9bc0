use axum::extract::ws::Message;
use futures::{Sink, SinkExt};
use std::fmt::Display;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    Notify,
};
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("connection closed")]
    ConnectionClosed,

    #[error("outbound buffer full")]
    BufferFull,

    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Outbound half of a live client connection
///
/// Sending must not wait on the network: the hub calls this for every
/// recipient of a broadcast on its own task. Any error means the client is
/// gone and the connection has to be dropped.
pub trait Endpoint: Send + Sync {
    /// Queue a text message for the client
    fn send(&self, message: &str) -> Result<(), SocketError>;

    /// Ask the transport to close; idempotent
    fn close(&self);
}

/// Endpoint backed by a bounded channel that a writer task drains into the socket
pub struct ChannelEndpoint {
    sender: mpsc::Sender<String>,
    closed: Arc<Notify>,
}

/// Receiving side of a [`ChannelEndpoint`], owned by the writer task
pub struct OutboundQueue {
    receiver: mpsc::Receiver<String>,
    closed: Arc<Notify>,
}

impl ChannelEndpoint {
    pub fn new(capacity: usize) -> (Self, OutboundQueue) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let closed = Arc::new(Notify::new());

        (
            Self {
                sender,
                closed: closed.clone(),
            },
            OutboundQueue { receiver, closed },
        )
    }
}

impl Endpoint for ChannelEndpoint {
    fn send(&self, message: &str) -> Result<(), SocketError> {
        self.sender
            .try_send(message.to_string())
            .map_err(|e| match e {
                TrySendError::Full(_) => SocketError::BufferFull,
                TrySendError::Closed(_) => SocketError::ConnectionClosed,
            })
    }

    fn close(&self) {
        // notify_one keeps a permit, so a close issued before the writer
        // starts waiting is not lost
        self.closed.notify_one();
    }
}

impl OutboundQueue {
    /// Forwards queued messages into `sink` until closed or the sink fails
    ///
    /// On close the queue stops accepting sends, whatever is already queued is
    /// written, and a close frame goes out last. Later sends on the endpoint
    /// fail with `ConnectionClosed`.
    pub async fn drain_into<S>(mut self, mut sink: S)
    where
        S: Sink<Message> + Unpin,
        S::Error: Display,
    {
        loop {
            tokio::select! {
                _ = self.closed.notified() => {
                    self.receiver.close();
                    while let Ok(text) = self.receiver.try_recv() {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            warn!(error = %e, "WebSocket write failed");
                            return;
                        }
                    }
                    break;
                }
                message = self.receiver.recv() => match message {
                    Some(text) => {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            warn!(error = %e, "WebSocket write failed");
                            return;
                        }
                    }
                    None => break,
                },
            }
        }

        if let Err(e) = sink.send(Message::Close(None)).await {
            debug!(error = %e, "Close frame not delivered");
        }
        let _ = sink.close().await;
    }
}
