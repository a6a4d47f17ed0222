//! # View Projection
//!
//! Flattens a cached message into a display record: enum codes become labels,
//! the device ID becomes a MAC string and the typed payload is spread into
//! named fields. The mapping is total. Unrecognized types and payloads that fail
//! to decode are rendered with the raw envelope instead.

mod device_id;

pub use device_id::{format_device_id, parse_device_mac};

use crate::cache::CachedMessage;
use crate::icd::{decode_payload, DeviceMessage, Envelope};
use serde::Serialize;
use std::fmt;

/// Flat, human readable rendering of a [`CachedMessage`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewMessage {
    pub id: u64,
    pub topic: String,
    pub message_type: &'static str,
    pub icd_version: i64,
    pub sequence_number: i64,
    pub device_id: u64,
    pub device_id_as_mac: String,
    pub timestamp: String,
    pub body: ViewBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ViewBody {
    Hit(ViewHit),
    #[serde(rename_all = "camelCase")]
    Sleep {
        sleep_on: bool,
    },
    HealthRequest,
    HealthResponse(ViewHealthResponse),
    Configuration(ViewConfiguration),
    #[serde(rename_all = "camelCase")]
    AirCleaning {
        air_type: &'static str,
    },
    Disconnect {
        message: String,
    },
    ResetShotNumber,
    PowerOff,
    /// Unknown type or undecodable payload; `reason` is set for the latter
    Raw {
        reason: Option<String>,
        envelope: Envelope,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewHit {
    pub shot_number: u32,
    pub x: f64,
    pub y: f64,
    pub elevation: f64,
    pub azimuth: f64,
    pub terminal_velocity: f64,
    pub error: bool,
    pub error_message: Option<String>,
    pub crossfire: bool,
    pub crossfire_lane: u32,
    pub ammo: &'static str,
    pub lane: u32,
    pub laser_code: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewConfiguration {
    pub temperature: f64,
    pub ammo: &'static str,
    pub distance: f64,
    pub shooter_separation: f64,
    pub sleep_on: bool,
    pub air_type: &'static str,
    pub reset_shot_number: bool,
    pub lanes: Vec<u32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub orientation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewHealthResponse {
    pub battery: f64,
    pub cameras_operational: bool,
    pub radars_operational: bool,
    pub solar_blocks_operational: bool,
    pub comm_status: bool,
    pub air_operational: bool,
    pub sleep_on: bool,
    pub air_type: &'static str,
    pub ammo: &'static str,
    pub distance: f64,
    pub shooter_separation: f64,
    pub temperature: f64,
    pub shot_number: u32,
    pub lanes: Vec<u32>,
    pub latitude: f64,
    pub longitude: f64,
    pub orientation: f64,
}

/// Renders a cached message for display. Never fails.
pub fn project(message: &CachedMessage) -> ViewMessage {
    let envelope = &message.envelope;

    let body = match decode_payload(envelope) {
        Ok(device_message) => project_device_message(envelope, device_message),
        Err(e) => ViewBody::Raw {
            reason: Some(e.to_string()),
            envelope: envelope.clone(),
        },
    };

    ViewMessage {
        id: message.id,
        topic: message.topic.clone(),
        message_type: envelope.msg_type.label(),
        icd_version: envelope.icd_version,
        sequence_number: envelope.seq_num,
        device_id: envelope.device_id,
        device_id_as_mac: message.device_mac.clone(),
        timestamp: envelope.timestamp.clone(),
        body,
    }
}

fn project_device_message(envelope: &Envelope, message: DeviceMessage) -> ViewBody {
    match message {
        DeviceMessage::HitDetection(hit) => ViewBody::Hit(ViewHit {
            shot_number: hit.shot_num,
            x: hit.x_mm,
            y: hit.y_mm,
            elevation: hit.el_deg,
            azimuth: hit.az_deg,
            terminal_velocity: hit.term_vel_mps,
            error: hit.error,
            error_message: hit.error_msg,
            crossfire: hit.crossfire,
            crossfire_lane: hit.crossfire_lane,
            ammo: hit.ammo.display_string(),
            lane: hit.lane,
            laser_code: hit.laser_code,
        }),
        DeviceMessage::Sleep(sleep) => ViewBody::Sleep {
            sleep_on: sleep.sleep_on,
        },
        DeviceMessage::HealthRequest => ViewBody::HealthRequest,
        DeviceMessage::HealthResponse(health) => ViewBody::HealthResponse(ViewHealthResponse {
            battery: health.battery,
            cameras_operational: health.cameras_ops,
            radars_operational: health.radars_ops,
            solar_blocks_operational: health.solar_blocks_ops,
            comm_status: health.comms_status,
            air_operational: health.air_ops,
            sleep_on: health.sleep_on,
            air_type: health.air_type.display_string(),
            ammo: health.ammo.display_string(),
            distance: health.distance_m,
            shooter_separation: health.shooter_sep_m,
            temperature: health.temperature,
            shot_number: health.shot_number,
            lanes: health.lanes,
            latitude: health.latitude,
            longitude: health.longitude,
            orientation: health.orientation,
        }),
        DeviceMessage::Configuration(config) => ViewBody::Configuration(ViewConfiguration {
            temperature: config.temperature,
            ammo: config.ammo.display_string(),
            distance: config.distance_m,
            shooter_separation: config.shooter_sep_m,
            sleep_on: config.sleep_on,
            air_type: config.air_type.display_string(),
            reset_shot_number: config.reset_shot_num,
            lanes: config.lanes,
            latitude: config.latitude,
            longitude: config.longitude,
            orientation: config.orientation,
        }),
        DeviceMessage::AirCleanLens(air) => ViewBody::AirCleaning {
            air_type: air.air_type.display_string(),
        },
        DeviceMessage::Disconnect(disconnect) => ViewBody::Disconnect {
            message: disconnect.message,
        },
        DeviceMessage::ResetShotNumber => ViewBody::ResetShotNumber,
        DeviceMessage::PowerOff => ViewBody::PowerOff,
        DeviceMessage::Unrecognized { .. } => ViewBody::Raw {
            reason: None,
            envelope: envelope.clone(),
        },
    }
}

impl fmt::Display for ViewMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = serde_json::to_string(&self.body).map_err(|_| fmt::Error)?;
        write!(
            f,
            "#{} [{}] {} from {} at {}: {}",
            self.id, self.topic, self.message_type, self.device_id_as_mac, self.timestamp, body
        )
    }
}
