//! Wire protocol for the push channel.
//!
//! Inbound frames are `{"type": .., "data": ..}` JSON text decoded by
//! [`infrawatch_core::decode_frame`]; the only outbound message is the
//! keepalive ping.

use infrawatch_core::{PushEvent, decode_frame, event::FrameError};
use serde::{Deserialize, Serialize};

/// Message from client to server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ping for keepalive. The server answers with a `pong` frame.
    Ping,
}

impl ClientMessage {
    /// Serialize to a text frame.
    #[must_use]
    pub fn to_text(self) -> String {
        match self {
            Self::Ping => r#"{"type":"ping"}"#.to_string(),
        }
    }
}

/// Outcome of reading one inbound text frame.
#[derive(Debug)]
pub enum Inbound {
    Event(PushEvent),
    /// Larger than the configured limit.
    Oversized(usize),
    Invalid(FrameError),
}

/// Decode an inbound text frame, enforcing the size limit first.
#[must_use]
pub fn read_frame(text: &str, max_bytes: usize) -> Inbound {
    if text.len() > max_bytes {
        return Inbound::Oversized(text.len());
    }
    match decode_frame(text) {
        Ok(event) => Inbound::Event(event),
        Err(e) => Inbound::Invalid(e),
    }
}
