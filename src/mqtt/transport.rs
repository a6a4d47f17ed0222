use super::config::ConnectRequest;
use super::message_manager::EventSink;

/// Failure to queue a request on a link. Handshake and connection failures
/// are reported as [`TransportEvent`](super::TransportEvent)s instead.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request rejected: {0}")]
    Request(String),
}

/// Factory for broker connections.
///
/// `open` starts a handshake and returns right away. The outcome, inbound
/// publishes and a later loss of the connection all arrive through `sink`.
pub trait Transport: Send + 'static {
    type Link: TransportLink;

    fn open(&mut self, request: ConnectRequest, sink: EventSink)
        -> Result<Self::Link, TransportError>;
}

/// Handle to one connection attempt. Requests are queued, not awaited.
pub trait TransportLink: Send + 'static {
    fn subscribe(&self, topic: &str) -> Result<(), TransportError>;

    fn unsubscribe(&self, topic: &str) -> Result<(), TransportError>;

    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Disconnects and stops the link.
    fn close(self);
}
