use serde::{Deserialize, Serialize};

/// Lens air cleaning mode. Unknown codes fall back to the `Off` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum AirCleaningType {
    On,
    #[default]
    Off,
    Pulse,
    Other(i64),
}

impl AirCleaningType {
    pub fn display_string(&self) -> &'static str {
        match self {
            AirCleaningType::On => "On",
            AirCleaningType::Pulse => "Pulse",
            AirCleaningType::Off | AirCleaningType::Other(_) => "Off",
        }
    }

    pub fn from_display_string(label: &str) -> Option<Self> {
        match label {
            "On" => Some(AirCleaningType::On),
            "Off" => Some(AirCleaningType::Off),
            "Pulse" => Some(AirCleaningType::Pulse),
            _ => None,
        }
    }
}

impl From<i64> for AirCleaningType {
    fn from(code: i64) -> Self {
        match code {
            0 => AirCleaningType::On,
            1 => AirCleaningType::Off,
            2 => AirCleaningType::Pulse,
            other => AirCleaningType::Other(other),
        }
    }
}

impl From<AirCleaningType> for i64 {
    fn from(kind: AirCleaningType) -> Self {
        match kind {
            AirCleaningType::On => 0,
            AirCleaningType::Off => 1,
            AirCleaningType::Pulse => 2,
            AirCleaningType::Other(code) => code,
        }
    }
}
