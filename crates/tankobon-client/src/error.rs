//! Error types for client operations.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Failure to obtain any response at all.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP stack failed (connection refused, timeout, TLS, ...).
    #[error("network request failed")]
    Network {
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// The request queue went away before settling the request.
    #[error("request queue closed before the request settled")]
    QueueClosed,
}

/// Primary error type for authenticated and collection operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No token is present; callers must sign in first.
    #[error("not authenticated")]
    Unauthenticated,
    /// The server rejected the token; the session has already been cleared.
    #[error("session expired")]
    SessionExpired,
    /// No response was obtained.
    #[error("request transport failed")]
    Transport {
        /// Underlying transport failure.
        #[from]
        source: TransportError,
    },
    /// The server answered with a non-success status.
    #[error("{operation} failed with status {status}")]
    Api {
        /// Operation identifier.
        operation: &'static str,
        /// Status returned by the server.
        status: StatusCode,
        /// Raw response body for diagnostics.
        body: String,
    },
    /// A success response carried a body that could not be decoded.
    #[error("failed to decode {operation} response")]
    Decode {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying decode error.
        source: reqwest::Error,
    },
    /// A request body could not be encoded.
    #[error("failed to encode {operation} request")]
    Encode {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying serde error.
        source: serde_json::Error,
    },
    /// The configured API base URL cannot carry path segments.
    #[error("invalid API base URL")]
    InvalidBaseUrl {
        /// Offending URL.
        url: String,
    },
}

impl ClientError {
    /// Whether this failure means no response was obtained.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// HTTP status attached to an API failure.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable message extracted from the server payload of an API failure.
    ///
    /// JSON bodies are searched for `detail`, `message` and `error`; other bodies
    /// are returned trimmed.
    #[must_use]
    pub fn server_message(&self) -> Option<String> {
        let Self::Api { body, .. } = self else {
            return None;
        };
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
            let field = ["detail", "message", "error"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str));
            if let Some(text) = field {
                return Some(text.to_string());
            }
        }
        Some(trimmed.to_string())
    }
}
