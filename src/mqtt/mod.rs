//! # MQTT Transport
//!
//! Seam between the session and the broker connection.
//!
//! ```text
//! mqtt/
//! ├── config.rs           - Broker endpoint and per-attempt connect request
//! ├── message_manager.rs  - Inbound messages and link-tagged transport events
//! ├── transport.rs        - Transport / TransportLink traits
//! └── mqtt_handler.rs     - rumqttc implementation
//! ```
//!
//! A [`Transport`] opens one [`TransportLink`] per handshake attempt. The link
//! never blocks: subscribe, unsubscribe and publish are queued on the client,
//! and everything the broker says comes back as a [`LinkEvent`] on the
//! session's channel. Each link has its own ID, so events from a link that was
//! already replaced by a reconnect can be recognised and ignored.

pub mod config;
pub mod message_manager;
pub mod mqtt_handler;
pub mod transport;

pub use config::{BrokerEndpoint, ConnectRequest, TransportKind};
pub use message_manager::{EventSink, InboundMessage, LinkEvent, TransportEvent};
pub use mqtt_handler::{RumqttLink, RumqttTransport};
pub use transport::{Transport, TransportError, TransportLink};
