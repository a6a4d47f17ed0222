//! # NCHS Sniffer
//!
//! Passive observer for the NCHS device network. Connects to the message
//! broker, decodes ICD envelopes from every relevant topic and keeps a bounded
//! per-topic history for display.
//!
//! ```text
//! mqtt ──LinkEvent──► session ──► icd::decode ──► cache ──SnifferEvent──► consumers
//!                        │                                                   │
//!                        └── diagnostic (topic / history discovery)          └── view::project
//! ```

pub mod cache;
pub mod config;
pub mod credentials;
pub mod diagnostic;
pub mod events;
pub mod icd;
pub mod mqtt;
pub mod session;
pub mod view;

pub use config::SnifferConfig;
pub use events::SnifferEvent;
pub use session::{ConnectionState, Session, SessionError, SessionHandle};
