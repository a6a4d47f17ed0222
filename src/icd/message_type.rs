use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Event code carried in every envelope's `msg_type` field.
///
/// The nine ICD message types are numbered in declaration order starting at 0.
/// Anything else (a missing code, an out of range number, a string or a float)
/// is kept as `Unrecognized` so the envelope can still be cached and shown in
/// raw form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "Option<i64>")]
pub enum MessageType {
    HitDetection,
    Sleep,
    HealthRequest,
    HealthResponse,
    Configuration,
    AirCleanLens,
    Disconnect,
    ResetShotNumber,
    PowerOff,
    Unrecognized(Option<i64>),
}

const KNOWN: [MessageType; 9] = [
    MessageType::HitDetection,
    MessageType::Sleep,
    MessageType::HealthRequest,
    MessageType::HealthResponse,
    MessageType::Configuration,
    MessageType::AirCleanLens,
    MessageType::Disconnect,
    MessageType::ResetShotNumber,
    MessageType::PowerOff,
];

impl MessageType {
    /// All recognized message types in ICD order.
    pub fn known() -> &'static [MessageType] {
        &KNOWN
    }

    pub fn from_code(code: i64) -> Self {
        usize::try_from(code)
            .ok()
            .and_then(|index| KNOWN.get(index).copied())
            .unwrap_or(MessageType::Unrecognized(Some(code)))
    }

    /// Numeric wire code, `None` only for an envelope that carried no code at all.
    pub fn code(&self) -> Option<i64> {
        match self {
            MessageType::Unrecognized(code) => *code,
            known => KNOWN
                .iter()
                .position(|candidate| candidate == known)
                .map(|index| index as i64),
        }
    }

    /// Human readable label used by the view layer.
    pub fn label(&self) -> &'static str {
        match self {
            MessageType::HitDetection => "Hit Detection",
            MessageType::Sleep => "Sleep",
            MessageType::HealthRequest => "Health Request",
            MessageType::HealthResponse => "Health Response",
            MessageType::Configuration => "Configuration",
            MessageType::AirCleanLens => "Air Clean Lens",
            MessageType::Disconnect => "Disconnected",
            MessageType::ResetShotNumber => "Reset Shot Number",
            MessageType::PowerOff => "Power Off",
            MessageType::Unrecognized(_) => "Unknown",
        }
    }

    /// Reverse lookup of [`MessageType::label`]. Only recognized types have a label.
    pub fn from_label(label: &str) -> Option<Self> {
        KNOWN.iter().copied().find(|kind| kind.label() == label)
    }
}

impl Default for MessageType {
    fn default() -> Self {
        MessageType::Unrecognized(None)
    }
}

impl From<Option<i64>> for MessageType {
    fn from(code: Option<i64>) -> Self {
        match code {
            Some(code) => MessageType::from_code(code),
            None => MessageType::Unrecognized(None),
        }
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = match Value::deserialize(deserializer)? {
            Value::Number(number) => number.as_i64(),
            _ => None,
        };
        Ok(MessageType::from(code))
    }
}

impl From<MessageType> for Option<i64> {
    fn from(kind: MessageType) -> Self {
        kind.code()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Unrecognized(Some(code)) => write!(f, "Unknown ({})", code),
            other => f.write_str(other.label()),
        }
    }
}
