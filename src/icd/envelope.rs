use super::MessageType;
use serde::{Deserialize, Serialize};

/// Outer wrapper around every message published on the broker.
///
/// `payload` is itself a JSON document whose shape depends on `msg_type`. It is
/// kept as an opaque string here and only parsed on demand by
/// [`decode_payload`](super::decode_payload).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event code selecting the payload shape. Missing codes decode as unrecognized.
    #[serde(default)]
    pub msg_type: MessageType,

    /// ICD revision the sender was built against
    pub icd_version: i64,

    /// Assigned by the back-end, monotonic per device. Not used for ordering.
    pub seq_num: i64,

    /// ISO 8601 timestamp (YYYY-MM-DDTHH:mm:ss.sssZ)
    pub timestamp: String,

    /// Sending device, 0 for messages addressed to all devices
    pub device_id: u64,

    #[serde(default)]
    pub payload: String,
}

/// Errors raised while decoding envelopes or their typed payloads.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("Malformed {kind} payload: {source}")]
    Payload {
        kind: MessageType,
        #[source]
        source: serde_json::Error,
    },
}

impl Envelope {
    pub fn is_broadcast(&self) -> bool {
        self.device_id == 0
    }

    /// Serializes the envelope back into its wire form.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Parses a raw transport payload into an [`Envelope`].
///
/// Only the header is validated; the inner payload stays untouched until a
/// consumer asks for the typed message.
pub fn decode(raw: &[u8]) -> Result<Envelope, DecodeError> {
    serde_json::from_slice(raw).map_err(DecodeError::Envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn hit_envelope() -> Value {
        json!({
            "msg_type": 0,
            "icd_version": 3,
            "seq_num": 118,
            "timestamp": "2024-05-01T12:30:00.250Z",
            "device_id": 42,
            "payload": "{\"shot_num\":7}"
        })
    }

    #[test]
    fn decodes_well_formed_envelope() {
        let raw = hit_envelope().to_string();
        let envelope = decode(raw.as_bytes()).unwrap();

        assert_eq!(envelope.msg_type, MessageType::HitDetection);
        assert_eq!(envelope.icd_version, 3);
        assert_eq!(envelope.seq_num, 118);
        assert_eq!(envelope.device_id, 42);
        assert_eq!(envelope.payload, "{\"shot_num\":7}");
    }

    #[test]
    fn encode_preserves_every_header_field() {
        let original = hit_envelope();
        let envelope = decode(original.to_string().as_bytes()).unwrap();
        let encoded: Value = serde_json::from_str(&envelope.encode().unwrap()).unwrap();

        assert_eq!(encoded, original);
    }

    #[test]
    fn missing_or_unknown_msg_type_is_kept() {
        let missing = json!({
            "icd_version": 1,
            "seq_num": 1,
            "timestamp": "2024-05-01T12:30:00Z",
            "device_id": 5,
            "payload": "{}"
        });
        let envelope = decode(missing.to_string().as_bytes()).unwrap();
        assert_eq!(envelope.msg_type, MessageType::Unrecognized(None));

        let mut unknown = missing.clone();
        unknown["msg_type"] = json!(77);
        let envelope = decode(unknown.to_string().as_bytes()).unwrap();
        assert_eq!(envelope.msg_type, MessageType::Unrecognized(Some(77)));

        for code in [json!("Sleep"), json!(1.0)] {
            let mut odd = missing.clone();
            odd["msg_type"] = code;
            let envelope = decode(odd.to_string().as_bytes()).unwrap();
            assert_eq!(envelope.msg_type, MessageType::Unrecognized(None));
        }
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(
            decode(b"not json at all"),
            Err(DecodeError::Envelope(_))
        ));

        let mut wrong_type = hit_envelope();
        wrong_type["device_id"] = json!("forty-two");
        assert!(decode(wrong_type.to_string().as_bytes()).is_err());

        let mut missing_field = hit_envelope();
        missing_field.as_object_mut().unwrap().remove("timestamp");
        assert!(decode(missing_field.to_string().as_bytes()).is_err());
    }
}
