//! Typed push-channel events.
//!
//! The wire unit is `{"type": <kind>, "data": <payload>}`. Decoding maps the
//! kind onto a closed set of variants, each with a known payload shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{Alert, Log, Metric};

/// Kind of a push event, used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Alert,
    Metric,
    Log,
    Connected,
    Pong,
}

impl EventKind {
    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alert => "alert",
            Self::Metric => "metric",
            Self::Log => "log",
            Self::Connected => "connected",
            Self::Pong => "pong",
        }
    }

    /// Look up a wire name.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "alert" => Some(Self::Alert),
            "metric" => Some(Self::Metric),
            "log" => Some(Self::Log),
            "connected" => Some(Self::Connected),
            "pong" => Some(Self::Pong),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded push event.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// A new or changed alert.
    Alert(Alert),
    /// A new metric sample.
    Metric(Metric),
    /// A new log entry.
    Log(Log),
    /// Server greeting after the channel opens.
    Connected { message: String },
    /// Keepalive reply.
    Pong,
}

impl PushEvent {
    /// Subscription key of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Alert(_) => EventKind::Alert,
            Self::Metric(_) => EventKind::Metric,
            Self::Log(_) => EventKind::Log,
            Self::Connected { .. } => EventKind::Connected,
            Self::Pong => EventKind::Pong,
        }
    }
}

/// Raw wire frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

/// Frame decode error. Such frames are dropped by the receiver.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Unknown event type: {0}")]
    UnknownKind(String),
    #[error("Invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: EventKind,
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct ConnectedPayload {
    #[serde(default)]
    message: String,
}

impl TryFrom<RawFrame> for PushEvent {
    type Error = FrameError;

    fn try_from(frame: RawFrame) -> Result<Self, Self::Error> {
        let kind = EventKind::from_wire(&frame.kind).ok_or(FrameError::UnknownKind(frame.kind))?;
        let invalid = |source| FrameError::InvalidPayload { kind, source };

        let event = match kind {
            EventKind::Alert => Self::Alert(serde_json::from_value(frame.data).map_err(invalid)?),
            EventKind::Metric => Self::Metric(serde_json::from_value(frame.data).map_err(invalid)?),
            EventKind::Log => Self::Log(serde_json::from_value(frame.data).map_err(invalid)?),
            EventKind::Connected => {
                let payload: ConnectedPayload =
                    serde_json::from_value(frame.data).map_err(invalid)?;
                Self::Connected {
                    message: payload.message,
                }
            }
            EventKind::Pong => Self::Pong,
        };
        Ok(event)
    }
}

/// Decode a text frame into a typed event.
///
/// # Errors
/// Returns error if the frame is not `{type, data}` JSON, the type is not
/// recognised, or the payload does not fit the type.
pub fn decode_frame(text: &str) -> Result<PushEvent, FrameError> {
    let frame: RawFrame = serde_json::from_str(text)?;
    PushEvent::try_from(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_alert_frame() {
        let text = r#"{"type":"alert","data":{"id":"x","title":"Disk full","severity":"error",
            "status":"active","source":"node-3","created_at":"2024-05-01T12:00:00"}}"#;
        let event = decode_frame(text).unwrap();
        assert_eq!(event.kind(), EventKind::Alert);
        match event {
            PushEvent::Alert(alert) => assert_eq!(alert.id, "x"),
            other => panic!("Wrong event: {other:?}"),
        }
    }

    #[test]
    fn test_decode_connected_and_pong() {
        let connected = decode_frame(r#"{"type":"connected","data":{"message":"hi"}}"#).unwrap();
        assert_eq!(
            connected,
            PushEvent::Connected {
                message: "hi".into()
            }
        );
        assert_eq!(decode_frame(r#"{"type":"pong","data":{}}"#).unwrap(), PushEvent::Pong);
    }

    #[test]
    fn test_decode_rejects_bad_frames() {
        assert!(matches!(decode_frame("not json"), Err(FrameError::Malformed(_))));
        assert!(matches!(
            decode_frame(r#"{"data":{}}"#),
            Err(FrameError::Malformed(_))
        ));
        assert!(matches!(
            decode_frame(r#"{"type":"deploy","data":{}}"#),
            Err(FrameError::UnknownKind(kind)) if kind == "deploy"
        ));
        assert!(matches!(
            decode_frame(r#"{"type":"metric","data":{"id":"m"}}"#),
            Err(FrameError::InvalidPayload { kind: EventKind::Metric, .. })
        ));
    }
}
