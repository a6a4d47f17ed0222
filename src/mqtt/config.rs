use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Framing used to reach the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// MQTT over a WebSocket, as exposed by the RabbitMQ web-mqtt plugin
    #[default]
    #[serde(rename = "websocket", alias = "ws")]
    WebSocket,
    Tcp,
}

/// Where the broker lives. Two endpoints are the same address when all fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    /// Only used for WebSocket endpoints
    pub path: String,
    pub kind: TransportKind,
}

impl BrokerEndpoint {
    pub fn websocket(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            path: path.into(),
            kind: TransportKind::WebSocket,
        }
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            path: String::new(),
            kind: TransportKind::Tcp,
        }
    }

    /// Broker address in the form the MQTT client expects.
    pub fn url(&self) -> String {
        match self.kind {
            TransportKind::WebSocket => {
                let path = self.path.trim_start_matches('/');
                format!("ws://{}:{}/{}", self.host, self.port, path)
            }
            TransportKind::Tcp => self.host.clone(),
        }
    }
}

impl fmt::Display for BrokerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            TransportKind::WebSocket => f.write_str(&self.url()),
            TransportKind::Tcp => write!(f, "tcp://{}:{}", self.host, self.port),
        }
    }
}

/// Everything a transport needs for one handshake attempt.
///
/// The password is already decrypted and is dropped together with the request.
#[derive(Clone)]
pub struct ConnectRequest {
    pub client_id: String,
    pub endpoint: BrokerEndpoint,
    pub username: String,
    pub password: String,
    pub keep_alive: Duration,
    pub clean_session: bool,
}

impl fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("client_id", &self.client_id)
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("keep_alive", &self.keep_alive)
            .field("clean_session", &self.clean_session)
            .finish()
    }
}
