//! # ICD Envelope Codec
//!
//! Wire types of the NCHS interface control document. Every broker message is an
//! [`Envelope`] whose `payload` string holds a second JSON document selected by
//! `msg_type`.
//!
//! Decoding happens in two steps:
//!
//! ```text
//! raw bytes ──decode()──► Envelope ──decode_payload()──► DeviceMessage
//!              (ingest)                 (on demand, view layer)
//! ```
//!
//! Ingestion only needs the header, so a malformed *envelope* drops the message
//! while a malformed *payload* is only reported when someone asks for the typed
//! message.

mod air_cleaning_type;
mod ammo_type;
mod device_message;
mod envelope;
mod message_type;

pub use air_cleaning_type::AirCleaningType;
pub use ammo_type::AmmoType;
pub use device_message::{
    decode_payload, AirCleanLens, Configuration, DeviceMessage, Disconnect, HealthResponse,
    HitDetection, Sleep,
};
pub use envelope::{decode, DecodeError, Envelope};
pub use message_type::MessageType;
