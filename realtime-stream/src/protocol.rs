//! Wire protocol for the real-time update channel.
//!
//! Every frame is a JSON text envelope `{"event": "<name>", "data": ...}`.
//! Outbound frames are built from [`ClientMessage`]. Inbound frames are
//! decoded by [`decode_frame`], which validates the payload against one of
//! the known shapes and normalizes timestamps before anything leaves this
//! module. Loosely typed data never travels further in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RealtimeError, Result};
use crate::event::{parse_timestamp, IncidentRecord, PhaseRecord, RecordPayload, UpdateEvent};
use crate::types::{ConnectionStatus, Topic};

/// Control messages sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Start receiving updates for a location
    SubscribeLocation(Topic),
    /// Stop receiving updates for a location
    UnsubscribeLocation(Topic),
    /// Ask the server to re-send a time window
    RequestDataRefresh(RefreshRequest),
}

/// Payload of a `request-data-refresh` message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    /// Location to refresh
    pub location: Topic,
    /// Start of the window, inclusive
    pub start_date: DateTime<Utc>,
    /// End of the window, inclusive
    pub end_date: DateTime<Utc>,
}

impl ClientMessage {
    /// Short operation name used in logs and disconnected warnings.
    pub fn operation(&self) -> &'static str {
        match self {
            ClientMessage::SubscribeLocation(_) => "subscribe",
            ClientMessage::UnsubscribeLocation(_) => "unsubscribe",
            ClientMessage::RequestDataRefresh(_) => "request refresh",
        }
    }

    /// Encode as a text frame.
    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Validated messages sent by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// `data-update` or `bulk-data-update`
    Update(UpdateEvent),
    /// Server's view of the connection
    ConnectionStatus(ConnectionStatus),
    /// A previously requested refresh has been delivered
    DataRefreshComplete,
    /// Server-side failure report
    Error {
        /// Message from the server
        message: String,
        /// Optional code, stringified
        code: Option<String>,
    },
}

/// Result of decoding one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// A frame with a known discriminant and a valid payload
    Message(ServerMessage),
    /// A well-formed envelope with a discriminant nobody handles
    Unrecognized(String),
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePhase {
    location: String,
    timestamp: String,
    phase: String,
    #[serde(default)]
    illumination: Option<f64>,
}

impl WirePhase {
    fn normalize(self) -> Result<PhaseRecord> {
        Ok(PhaseRecord {
            timestamp: parse_timestamp(&self.timestamp)?,
            location: self.location,
            phase: self.phase,
            illumination: self.illumination,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireIncident {
    id: String,
    location: String,
    timestamp: String,
    category: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl WireIncident {
    fn normalize(self) -> Result<IncidentRecord> {
        Ok(IncidentRecord {
            timestamp: parse_timestamp(&self.timestamp)?,
            id: self.id,
            location: self.location,
            category: self.category,
            severity: self.severity,
            description: self.description,
        })
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
enum WireSingle {
    Phase(WirePhase),
    Incident(WireIncident),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBulk {
    #[serde(default)]
    phase_updates: Vec<WirePhase>,
    #[serde(default)]
    incident_updates: Vec<WireIncident>,
}

#[derive(Deserialize)]
struct WireError {
    message: String,
    #[serde(default)]
    code: Option<Value>,
}

fn payload<T: for<'de> Deserialize<'de>>(event: &str, data: Value) -> Result<T> {
    serde_json::from_value(data)
        .map_err(|e| RealtimeError::malformed(format!("{event}: {e}")))
}

/// Decode and validate one inbound text frame.
///
/// # Errors
///
/// Returns [`RealtimeError::MalformedPayload`] if the frame is not a JSON
/// envelope, or if a known event carries a payload that does not match its
/// shape. A bulk update is rejected as a whole when any record is invalid.
pub fn decode_frame(text: &str) -> Result<InboundFrame> {
    let envelope: Envelope = serde_json::from_str(text)
        .map_err(|e| RealtimeError::malformed(format!("invalid envelope: {e}")))?;

    let message = match envelope.event.as_str() {
        "data-update" => {
            let record = match payload::<WireSingle>("data-update", envelope.data)? {
                WireSingle::Phase(p) => RecordPayload::Phase(p.normalize()?),
                WireSingle::Incident(i) => RecordPayload::Incident(i.normalize()?),
            };
            ServerMessage::Update(UpdateEvent::Single(record))
        }
        "bulk-data-update" => {
            let bulk: WireBulk = payload("bulk-data-update", envelope.data)?;
            ServerMessage::Update(UpdateEvent::Bulk {
                phase_updates: bulk
                    .phase_updates
                    .into_iter()
                    .map(WirePhase::normalize)
                    .collect::<Result<_>>()?,
                incident_updates: bulk
                    .incident_updates
                    .into_iter()
                    .map(WireIncident::normalize)
                    .collect::<Result<_>>()?,
            })
        }
        "connection-status" => {
            let raw: String = payload("connection-status", envelope.data)?;
            let status = match raw.to_ascii_lowercase().as_str() {
                "connected" => ConnectionStatus::Connected,
                "connecting" => ConnectionStatus::Connecting,
                "disconnected" => ConnectionStatus::Disconnected,
                "error" => ConnectionStatus::Error,
                other => {
                    return Err(RealtimeError::malformed(format!(
                        "connection-status: unknown status '{other}'"
                    )))
                }
            };
            ServerMessage::ConnectionStatus(status)
        }
        "data-refresh-complete" => ServerMessage::DataRefreshComplete,
        "error" => {
            let error: WireError = payload("error", envelope.data)?;
            ServerMessage::Error {
                message: error.message,
                code: error.code.map(|code| match code {
                    Value::String(s) => s,
                    other => other.to_string(),
                }),
            }
        }
        _ => return Ok(InboundFrame::Unrecognized(envelope.event)),
    };

    Ok(InboundFrame::Message(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn decode_message(value: Value) -> ServerMessage {
        match decode_frame(&value.to_string()).unwrap() {
            InboundFrame::Message(message) => message,
            other => panic!("Expected message, got {other:?}"),
        }
    }

    #[test]
    fn test_client_messages_encode_as_envelopes() {
        let frame = ClientMessage::SubscribeLocation(Topic::new("tokyo"))
            .to_frame()
            .unwrap();
        assert_eq!(frame, r#"{"event":"subscribe-location","data":"tokyo"}"#);

        let frame = ClientMessage::UnsubscribeLocation(Topic::new("tokyo"))
            .to_frame()
            .unwrap();
        assert_eq!(frame, r#"{"event":"unsubscribe-location","data":"tokyo"}"#);

        let message = ClientMessage::RequestDataRefresh(RefreshRequest {
            location: Topic::new("oslo"),
            start_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end_date: Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap(),
        });
        let value: Value = serde_json::from_str(&message.to_frame().unwrap()).unwrap();
        assert_eq!(value["event"], "request-data-refresh");
        assert_eq!(value["data"]["location"], "oslo");
        assert_eq!(value["data"]["startDate"], "2024-01-01T00:00:00Z");
        assert_eq!(value["data"]["endDate"], "2024-01-31T23:59:59Z");
        assert_eq!(message.operation(), "request refresh");
    }

    #[test]
    fn test_decode_single_phase_update() {
        let message = decode_message(json!({
            "event": "data-update",
            "data": {
                "type": "phase",
                "payload": {
                    "location": "tokyo",
                    "timestamp": "2024-03-25T07:00:00Z",
                    "phase": "full_moon",
                    "illumination": 0.99
                }
            }
        }));

        match message {
            ServerMessage::Update(UpdateEvent::Single(RecordPayload::Phase(record))) => {
                assert_eq!(record.location, "tokyo");
                assert_eq!(record.phase, "full_moon");
                assert_eq!(record.illumination, Some(0.99));
                assert_eq!(
                    record.timestamp,
                    Utc.with_ymd_and_hms(2024, 3, 25, 7, 0, 0).unwrap()
                );
            }
            other => panic!("Expected phase update, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_single_incident_update() {
        let message = decode_message(json!({
            "event": "data-update",
            "data": {
                "type": "incident",
                "payload": {
                    "id": "inc-7",
                    "location": "tokyo",
                    "timestamp": "2024-03-25",
                    "category": "traffic",
                    "severity": "high"
                }
            }
        }));

        match message {
            ServerMessage::Update(UpdateEvent::Single(RecordPayload::Incident(record))) => {
                assert_eq!(record.id, "inc-7");
                assert_eq!(record.severity.as_deref(), Some("high"));
                assert_eq!(record.description, None);
            }
            other => panic!("Expected incident update, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_bulk_update_with_missing_side() {
        let message = decode_message(json!({
            "event": "bulk-data-update",
            "data": {
                "phaseUpdates": [
                    {"location": "a", "timestamp": "2024-03-01T00:00:00Z", "phase": "new_moon"},
                    {"location": "b", "timestamp": "2024-03-08T00:00:00Z", "phase": "first_quarter"}
                ]
            }
        }));

        match message {
            ServerMessage::Update(UpdateEvent::Bulk {
                phase_updates,
                incident_updates,
            }) => {
                assert_eq!(phase_updates.len(), 2);
                assert!(incident_updates.is_empty());
            }
            other => panic!("Expected bulk update, got {other:?}"),
        }
    }

    #[test]
    fn test_bulk_update_rejected_as_a_whole() {
        let frame = json!({
            "event": "bulk-data-update",
            "data": {
                "phaseUpdates": [
                    {"location": "a", "timestamp": "2024-03-01T00:00:00Z", "phase": "new_moon"},
                    {"location": "b", "timestamp": "not-a-date", "phase": "first_quarter"}
                ]
            }
        });
        let err = decode_frame(&frame.to_string()).unwrap_err();
        assert_eq!(err.code(), "MALFORMED_PAYLOAD");
    }

    #[test]
    fn test_missing_required_field_is_malformed() {
        let frame = json!({
            "event": "data-update",
            "data": {"type": "incident", "payload": {"location": "x", "timestamp": "2024-01-01"}}
        });
        let err = decode_frame(&frame.to_string()).unwrap_err();
        assert!(err.to_string().contains("data-update"));
    }

    #[test]
    fn test_unknown_type_tag_is_malformed() {
        let frame = json!({
            "event": "data-update",
            "data": {"type": "weather", "payload": {}}
        });
        assert!(decode_frame(&frame.to_string()).is_err());
    }

    #[test]
    fn test_status_refresh_and_error_frames() {
        assert_eq!(
            decode_message(json!({"event": "connection-status", "data": "Connected"})),
            ServerMessage::ConnectionStatus(ConnectionStatus::Connected)
        );
        assert_eq!(
            decode_message(json!({"event": "data-refresh-complete"})),
            ServerMessage::DataRefreshComplete
        );
        assert_eq!(
            decode_message(json!({"event": "error", "data": {"message": "rate limited", "code": 429}})),
            ServerMessage::Error {
                message: "rate limited".to_string(),
                code: Some("429".to_string()),
            }
        );
        assert_eq!(
            decode_message(json!({"event": "error", "data": {"message": "boom"}})),
            ServerMessage::Error {
                message: "boom".to_string(),
                code: None,
            }
        );
    }

    #[test]
    fn test_unrecognized_and_garbage_frames() {
        assert_eq!(
            decode_frame(r#"{"event":"presence","data":{}}"#).unwrap(),
            InboundFrame::Unrecognized("presence".to_string())
        );
        assert!(decode_frame("not json").is_err());
        assert!(decode_frame(r#"{"data":1}"#).is_err());
        assert!(decode_frame(r#"{"event":"connection-status","data":"sleeping"}"#).is_err());
    }
}
