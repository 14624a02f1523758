//! Outbound platform errors

use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    /// Client-credentials exchange failed (non-2xx or undecodable)
    #[error("token exchange failed: {0}")]
    Auth(String),

    /// Connection, TLS or timeout failure before a status was received
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// 429 or 5xx, retryable
    #[error("transient upstream status {status}")]
    Transient { status: StatusCode },

    /// Any other non-success status; never retried
    #[error("unexpected upstream status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<PlatformError>,
    },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("failed to encode request body: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("request cancelled")]
    Cancelled,
}

impl PlatformError {
    /// Whether the executor should try again
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Transient { .. })
    }

    /// Upstream status if one was received
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Transient { status } | Self::UnexpectedStatus { status, .. } => Some(*status),
            Self::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}
