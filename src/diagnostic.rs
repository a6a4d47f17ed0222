//! Diagnostic protocol client.
//!
//! Topics and stored history are not known up front in diagnostic mode. They
//! are discovered by publishing a request on the request topic and waiting for
//! the backend's answer on the response topic:
//!
//! ```text
//! QUEUES   -> payload: ["queue/a", "queue/b", ...]
//! MESSAGES -> payload: ["<envelope json>", "<envelope json>", ...]
//! ```
//!
//! There is no request ID. The response type tag alone says what an answer is,
//! and history for a topic nobody asked for is still handed back as a backfill.
//! The client only builds requests and interprets responses; publishing and
//! ingesting is up to the session.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiagnosticMessageType {
    /// List of known topics
    Queues,
    /// Stored messages of one topic
    Messages,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticRequest {
    pub diagnostic_message_type: DiagnosticMessageType,
    pub queue_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResponse {
    diagnostic_message_type: String,
    #[serde(default)]
    queue_name: String,
    #[serde(default)]
    payload: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DiagnosticError {
    #[error("Malformed diagnostic response: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Malformed {kind:?} payload: {source}")]
    Payload {
        kind: DiagnosticMessageType,
        #[source]
        source: serde_json::Error,
    },

    #[error("History response names no topic")]
    MissingQueueName,

    #[error("Unknown diagnostic message type {0:?}")]
    UnknownType(String),

    #[error("Failed to encode diagnostic request: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Interpreted diagnostic response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticReply {
    Topics(Vec<String>),
    History {
        topic: String,
        /// Raw envelope documents in the order the backend sent them
        envelopes: Vec<String>,
        /// `false` when no request for this topic was outstanding
        solicited: bool,
    },
}

/// Request ready to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Where an inbound message on a `#` subscription belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Echo of our own request
    OwnRequest,
    Response,
    Traffic,
}

#[derive(Debug, Clone)]
pub struct DiagnosticClient {
    request_topic: String,
    response_topic: String,
    pending_history: HashSet<String>,
}

impl DiagnosticClient {
    pub fn new(request_topic: impl Into<String>, response_topic: impl Into<String>) -> Self {
        Self {
            request_topic: request_topic.into(),
            response_topic: response_topic.into(),
            pending_history: HashSet::new(),
        }
    }

    // Matches on the topic name only; any other traffic on the request topic is dropped too.
    pub fn route(&self, topic: &str) -> Route {
        if topic == self.request_topic {
            Route::OwnRequest
        } else if topic == self.response_topic {
            Route::Response
        } else {
            Route::Traffic
        }
    }

    pub fn known_topics_request(&self) -> Result<Outbound, DiagnosticError> {
        self.request(DiagnosticMessageType::Queues, String::new())
    }

    /// Builds a history request and remembers the topic as outstanding.
    pub fn history_request(&mut self, topic: &str) -> Result<Outbound, DiagnosticError> {
        let outbound = self.request(DiagnosticMessageType::Messages, topic.to_string())?;
        self.pending_history.insert(topic.to_string());
        Ok(outbound)
    }

    pub fn is_pending(&self, topic: &str) -> bool {
        self.pending_history.contains(topic)
    }

    /// Forgets all outstanding history requests.
    pub fn reset(&mut self) {
        self.pending_history.clear();
    }

    pub fn handle_response(&mut self, raw: &[u8]) -> Result<DiagnosticReply, DiagnosticError> {
        let response: RawResponse =
            serde_json::from_slice(raw).map_err(DiagnosticError::Malformed)?;

        let kind = match response.diagnostic_message_type.as_str() {
            "QUEUES" => DiagnosticMessageType::Queues,
            "MESSAGES" => DiagnosticMessageType::Messages,
            _ => {
                return Err(DiagnosticError::UnknownType(
                    response.diagnostic_message_type,
                ))
            }
        };

        let entries: Vec<Value> = serde_json::from_str(&response.payload)
            .map_err(|source| DiagnosticError::Payload { kind, source })?;

        match kind {
            DiagnosticMessageType::Queues => {
                let topics: Vec<String> = entries
                    .into_iter()
                    .filter_map(|entry| match entry {
                        Value::String(topic) if !topic.is_empty() => Some(topic),
                        _ => None,
                    })
                    .collect();
                debug!("Backend knows {} topics", topics.len());
                Ok(DiagnosticReply::Topics(topics))
            }
            DiagnosticMessageType::Messages => {
                let topic = response.queue_name;
                if topic.is_empty() {
                    return Err(DiagnosticError::MissingQueueName);
                }
                let solicited = self.pending_history.remove(&topic);

                let envelopes = entries
                    .into_iter()
                    .map(|entry| match entry {
                        Value::String(raw) => raw,
                        other => other.to_string(),
                    })
                    .collect();

                Ok(DiagnosticReply::History {
                    topic,
                    envelopes,
                    solicited,
                })
            }
        }
    }

    fn request(
        &self,
        kind: DiagnosticMessageType,
        queue_name: String,
    ) -> Result<Outbound, DiagnosticError> {
        let request = DiagnosticRequest {
            diagnostic_message_type: kind,
            queue_name,
        };
        let payload = serde_json::to_vec(&request).map_err(DiagnosticError::Encode)?;
        Ok(Outbound {
            topic: self.request_topic.clone(),
            payload,
        })
    }
}
