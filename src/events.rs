//! Notifications published by the session to its consumers.

use crate::cache::CachedMessage;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// Everything a consumer can observe without polling.
#[derive(Debug, Clone, PartialEq)]
pub enum SnifferEvent {
    /// Handshake completed and subscriptions were issued
    Connected,
    /// The broker connection dropped or a handshake failed, with the transport's reason
    Disconnected(String),
    Error(String),
    NewTopic(String),
    TopicRemoved(String),
    MessageAdded(Arc<CachedMessage>),
    /// Oldest message of a full topic, removed to make room
    MessageEvicted(Arc<CachedMessage>),
}

/// Cloneable fan-out point for [`SnifferEvent`]s.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<SnifferEvent>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SnifferEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: SnifferEvent) {
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            trace!("No listeners for {:?}", event);
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(1024)
    }
}
