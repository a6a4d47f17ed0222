//! # Session Manager
//!
//! Owns the broker connection, the known topics and the message cache.
//!
//! All state lives in one task, the session actor. Transport events,
//! reconnect ticks and consumer commands reach it over channels, so messages
//! are cached in the order the transport delivered them and nothing else ever
//! touches the cache. Consumers talk to it through a cloneable
//! [`SessionHandle`] and observe it through [`SnifferEvent`]s.
//!
//! ```text
//!                 connect              handshake ok
//!  Disconnected ───────────► Connecting ───────────► Connected
//!       ▲                       ▲   │ handshake failed    │ connection lost
//!       │ disconnect            │   ▼                     ▼
//!       └──────────────────  Reconnecting ◄───────────────┘
//!                              (retry every 2 s)
//! ```

mod actor;
mod reconnect;

pub use reconnect::ReconnectTimer;

use crate::cache::CachedMessage;
use crate::config::SnifferConfig;
use crate::credentials::{ClientId, Decrypt};
use crate::diagnostic::DiagnosticError;
use crate::events::{Notifier, SnifferEvent};
use crate::mqtt::{BrokerEndpoint, Transport, TransportError};
use actor::SessionActor;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(label)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session task is no longer running")]
    Closed,

    #[error("Diagnostic requests need the diagnostic topic mode")]
    DiagnosticsDisabled,

    #[error("Not connected to a broker")]
    NotConnected,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Diagnostic(#[from] DiagnosticError),
}

type Reply<T> = oneshot::Sender<T>;

#[derive(Debug)]
pub(crate) enum Command {
    Connect {
        address: BrokerEndpoint,
        config: Box<SnifferConfig>,
        reply: Reply<()>,
    },
    Disconnect {
        reply: Reply<()>,
    },
    Messages {
        topic: String,
        reply: Reply<Vec<Arc<CachedMessage>>>,
    },
    ClearMessages {
        topic: String,
        reply: Reply<()>,
    },
    Topics {
        reply: Reply<Vec<String>>,
    },
    RemoveTopic {
        topic: String,
        reply: Reply<bool>,
    },
    RequestKnownTopics {
        reply: Reply<Result<(), SessionError>>,
    },
    RequestHistory {
        topic: String,
        reply: Reply<Result<(), SessionError>>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

/// Cloneable front end of a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    notifier: Notifier,
    state: watch::Receiver<ConnectionState>,
}

impl SessionHandle {
    async fn call<R>(&self, command: impl FnOnce(Reply<R>) -> Command) -> Result<R, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)
    }

    /// Connects to `address`. Returns once the handshake was started; the
    /// outcome is reported through [`SnifferEvent::Connected`] or
    /// [`SnifferEvent::Disconnected`].
    ///
    /// A second call for the address already in use does nothing. A call for a
    /// different address tears the current connection down first.
    pub async fn connect(
        &self,
        address: BrokerEndpoint,
        config: SnifferConfig,
    ) -> Result<(), SessionError> {
        self.call(|reply| Command::Connect {
            address,
            config: Box::new(config),
            reply,
        })
        .await
    }

    /// Closes the connection and stops any pending reconnect.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.call(|reply| Command::Disconnect { reply }).await
    }

    /// Cached messages of `topic`, oldest first.
    pub async fn messages(&self, topic: &str) -> Result<Vec<Arc<CachedMessage>>, SessionError> {
        let topic = topic.to_string();
        self.call(|reply| Command::Messages { topic, reply }).await
    }

    pub async fn clear_messages(&self, topic: &str) -> Result<(), SessionError> {
        let topic = topic.to_string();
        self.call(|reply| Command::ClearMessages { topic, reply })
            .await
    }

    /// Known topics in the order they were discovered.
    pub async fn topics(&self) -> Result<Vec<String>, SessionError> {
        self.call(|reply| Command::Topics { reply }).await
    }

    /// Forgets a topic and its messages and unsubscribes from it.
    pub async fn remove_topic(&self, topic: &str) -> Result<bool, SessionError> {
        let topic = topic.to_string();
        self.call(|reply| Command::RemoveTopic { topic, reply })
            .await
    }

    pub async fn request_known_topics(&self) -> Result<(), SessionError> {
        self.call(|reply| Command::RequestKnownTopics { reply })
            .await?
    }

    pub async fn request_history(&self, topic: &str) -> Result<(), SessionError> {
        let topic = topic.to_string();
        self.call(|reply| Command::RequestHistory { topic, reply })
            .await?
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SnifferEvent> {
        self.notifier.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Disconnects and stops the session task.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.call(|reply| Command::Shutdown { reply }).await
    }
}

pub struct Session;

impl Session {
    /// Starts the session task. Nothing connects until [`SessionHandle::connect`].
    pub fn spawn<T: Transport>(
        transport: T,
        decryptor: Box<dyn Decrypt>,
        client_id: ClientId,
        config: &SnifferConfig,
    ) -> (SessionHandle, JoinHandle<()>) {
        let notifier = Notifier::default();
        let (command_tx, command_rx) = mpsc::channel(64);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        info!("Starting session as {}", client_id);
        let actor = SessionActor::new(
            transport,
            decryptor,
            client_id,
            config.clone(),
            notifier.clone(),
            state_tx,
        );
        let task = tokio::spawn(actor.run(command_rx));

        let handle = SessionHandle {
            commands: command_tx,
            notifier,
            state: state_rx,
        };
        (handle, task)
    }
}
