use super::{AirCleaningType, AmmoType, DecodeError, Envelope, MessageType};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Shot reported by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitDetection {
    pub shot_num: u32,
    /// X coordinate in millimeters
    #[serde(default)]
    pub x_mm: f64,
    /// Y coordinate in millimeters
    #[serde(default)]
    pub y_mm: f64,
    /// Elevation in degrees
    #[serde(default)]
    pub el_deg: f64,
    /// Azimuth in degrees
    #[serde(default)]
    pub az_deg: f64,
    /// Terminal velocity in meters per second
    #[serde(default)]
    pub term_vel_mps: f64,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub error_msg: Option<String>,
    /// Set when the shot came from a different lane
    #[serde(default)]
    pub crossfire: bool,
    #[serde(default)]
    pub crossfire_lane: u32,
    #[serde(default)]
    pub ammo: AmmoType,
    /// Lane assigned by the last Configuration message, 0 when none was assigned
    #[serde(default)]
    pub lane: u32,
    #[serde(default)]
    pub laser_code: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sleep {
    pub sleep_on: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirCleanLens {
    pub air_type: AirCleaningType,
}

/// Last-will message the broker publishes when a device drops off unexpectedly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disconnect {
    pub message: String,
}

/// Device tasking sent by the control system.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Degrees Fahrenheit
    pub temperature: f64,
    pub ammo: AmmoType,
    pub distance_m: f64,
    pub shooter_sep_m: f64,
    pub sleep_on: bool,
    pub air_type: AirCleaningType,
    pub reset_shot_num: bool,
    pub lanes: Vec<u32>,
    // laser sensors only
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub orientation: Option<f64>,
}

/// Device health and status snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthResponse {
    /// Battery level in percent, 0..=100
    pub battery: f64,
    pub cameras_ops: bool,
    pub radars_ops: bool,
    pub solar_blocks_ops: bool,
    /// True if messages were dropped or left unsent
    pub comms_status: bool,
    pub air_ops: bool,
    pub sleep_on: bool,
    pub air_type: AirCleaningType,
    pub ammo: AmmoType,
    pub distance_m: f64,
    pub shooter_sep_m: f64,
    pub temperature: f64,
    pub shot_number: u32,
    pub lanes: Vec<u32>,
    /// Decimal degrees, -90..=90
    pub latitude: f64,
    /// Decimal degrees, -180..=180
    pub longitude: f64,
    /// Degrees from true north, 0..360
    pub orientation: f64,
}

/// Typed payload of an envelope, selected by its `msg_type`.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceMessage {
    HitDetection(HitDetection),
    Sleep(Sleep),
    HealthRequest,
    HealthResponse(HealthResponse),
    Configuration(Configuration),
    AirCleanLens(AirCleanLens),
    Disconnect(Disconnect),
    ResetShotNumber,
    PowerOff,
    /// Envelope whose type code is missing or outside the ICD. The payload is kept verbatim.
    Unrecognized {
        msg_type: Option<i64>,
        payload: String,
    },
}

impl DeviceMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            DeviceMessage::HitDetection(_) => MessageType::HitDetection,
            DeviceMessage::Sleep(_) => MessageType::Sleep,
            DeviceMessage::HealthRequest => MessageType::HealthRequest,
            DeviceMessage::HealthResponse(_) => MessageType::HealthResponse,
            DeviceMessage::Configuration(_) => MessageType::Configuration,
            DeviceMessage::AirCleanLens(_) => MessageType::AirCleanLens,
            DeviceMessage::Disconnect(_) => MessageType::Disconnect,
            DeviceMessage::ResetShotNumber => MessageType::ResetShotNumber,
            DeviceMessage::PowerOff => MessageType::PowerOff,
            DeviceMessage::Unrecognized { msg_type, .. } => MessageType::Unrecognized(*msg_type),
        }
    }
}

/// Decodes the typed payload of an envelope.
///
/// Dispatch is a total match on `msg_type`. Types without payload fields never
/// look at the payload string, and unrecognized types are passed through raw.
pub fn decode_payload(envelope: &Envelope) -> Result<DeviceMessage, DecodeError> {
    let kind = envelope.msg_type;
    let payload = envelope.payload.as_str();

    let message = match kind {
        MessageType::HitDetection => DeviceMessage::HitDetection(parse(kind, payload)?),
        MessageType::Sleep => DeviceMessage::Sleep(parse(kind, payload)?),
        MessageType::HealthRequest => DeviceMessage::HealthRequest,
        MessageType::HealthResponse => DeviceMessage::HealthResponse(parse(kind, payload)?),
        MessageType::Configuration => DeviceMessage::Configuration(parse(kind, payload)?),
        MessageType::AirCleanLens => DeviceMessage::AirCleanLens(parse(kind, payload)?),
        MessageType::Disconnect => DeviceMessage::Disconnect(parse(kind, payload)?),
        MessageType::ResetShotNumber => DeviceMessage::ResetShotNumber,
        MessageType::PowerOff => DeviceMessage::PowerOff,
        MessageType::Unrecognized(code) => DeviceMessage::Unrecognized {
            msg_type: code,
            payload: envelope.payload.clone(),
        },
    };

    Ok(message)
}

fn parse<T: DeserializeOwned>(kind: MessageType, payload: &str) -> Result<T, DecodeError> {
    serde_json::from_str(payload).map_err(|source| DecodeError::Payload { kind, source })
}
