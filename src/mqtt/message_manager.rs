use std::fmt;
use tokio::sync::mpsc;
use tracing::trace;

/// Raw publish received from the broker.
#[derive(Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

impl fmt::Debug for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let preview: String = String::from_utf8_lossy(&self.payload).chars().take(64).collect();
        write!(f, "{} ({} bytes): {}", self.topic, self.payload.len(), preview)
    }
}

/// What a live link reports back to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake accepted by the broker
    Connected,
    /// Handshake rejected or broker unreachable
    ConnectFailed(String),
    /// Established connection dropped
    ConnectionLost(String),
    Message(InboundMessage),
}

/// A [`TransportEvent`] tagged with the link that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEvent {
    pub link: u64,
    pub event: TransportEvent,
}

/// Channel end handed to a transport for one link.
///
/// Every event is tagged with the link ID so the owner can drop events from
/// links it already replaced.
#[derive(Debug, Clone)]
pub struct EventSink {
    link: u64,
    tx: mpsc::Sender<LinkEvent>,
}

impl EventSink {
    pub fn new(link: u64, tx: mpsc::Sender<LinkEvent>) -> Self {
        Self { link, tx }
    }

    pub fn link(&self) -> u64 {
        self.link
    }

    /// Forwards an event; `false` once the owner is gone.
    pub async fn send(&self, event: TransportEvent) -> bool {
        let event = LinkEvent {
            link: self.link,
            event,
        };
        if self.tx.send(event).await.is_err() {
            trace!("Link {} has no receiver anymore", self.link);
            return false;
        }
        true
    }
}
