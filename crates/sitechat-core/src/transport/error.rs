use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Categories of transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// Non-success HTTP status (4xx, 5xx)
    HttpStatus,
    /// Connection refused, reset, DNS failure
    Network,
    /// Connect or read timeout
    Timeout,
    /// Body bytes could not be turned into text deltas
    Decode,
    /// Error reported by the chat backend inside the stream
    Api,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::HttpStatus => write!(f, "http_status"),
            TransportErrorKind::Network => write!(f, "network"),
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Decode => write!(f, "decode"),
            TransportErrorKind::Api => write!(f, "api"),
        }
    }
}

/// Structured error from the chat transport with kind and details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error, preferring `error.message` from JSON bodies.
    pub fn http_status(status: u16, body: &str) -> Self {
        if let Ok(json) = serde_json::from_str::<Value>(body)
            && let Some(msg) = json
                .get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(Value::as_str)
        {
            return Self {
                kind: TransportErrorKind::HttpStatus,
                message: format!("HTTP {status}: {msg}"),
                details: Some(body.to_string()),
            };
        }

        Self {
            kind: TransportErrorKind::HttpStatus,
            message: format!("HTTP {status}"),
            details: (!body.is_empty()).then(|| body.to_string()),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Decode, message)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Api, message)
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransportError {}

/// Maps a reqwest failure onto the transport taxonomy.
pub fn classify_reqwest_error(e: &reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::timeout(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        TransportError::network(format!("Connection failed: {e}"))
    } else if e.is_decode() || e.is_body() {
        TransportError::decode(format!("Failed to read response body: {e}"))
    } else {
        TransportError::network(format!("Network error: {e}"))
    }
}
