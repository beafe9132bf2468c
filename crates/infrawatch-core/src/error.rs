//! Error taxonomy shared by the REST and push paths.

use serde_json::Value;
use thiserror::Error;

/// Failure below the HTTP/WebSocket protocol level.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Connection closed")]
    Closed,
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Error surfaced to callers of REST operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Not authenticated")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Invalid response body: {0}")]
    Decode(String),
    #[error("Failed to encode request body: {0}")]
    Encode(String),
}

impl ApiError {
    /// Classify a non-success response.
    #[must_use]
    pub fn from_status(status: u16, body: &Value) -> Self {
        let message = error_message(body).unwrap_or_else(|| format!("status {status}"));
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            400 | 422 => Self::Validation(message),
            500..=599 => Self::Server { status, message },
            _ => Self::Http { status, message },
        }
    }

    /// Whether this is an authorization failure.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

/// Extract a human-readable message from a backend error body.
///
/// Handles `{"message": ..}`, `{"detail": ".."}` and FastAPI validation
/// lists `{"detail": [{"msg": ..}, ..]}`.
fn error_message(body: &Value) -> Option<String> {
    if let Some(message) = body.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    match body.get("detail")? {
        Value::String(detail) => Some(detail.clone()),
        Value::Array(items) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!msgs.is_empty()).then(|| msgs.join("; "))
        }
        _ => None,
    }
}
