//! Relay error taxonomy.
//!
//! Per-message failures (`ClientFrameMalformed`, `UnexpectedBinaryFromClient`,
//! `BackendTransportError`) are logged and the relay keeps going. Only
//! `BackendOpenFailed` and `ClientSendFailed` end a session.

use thiserror::Error;

use crate::core::speak::SpeakError;

/// Errors raised while relaying one client connection.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Client text frame was not a usable synthesis request
    #[error("Malformed client frame: {0}")]
    ClientFrameMalformed(String),

    /// Client sent a binary frame
    #[error("Unexpected binary frame from client ({len} bytes)")]
    UnexpectedBinaryFromClient { len: usize },

    /// Backend session could not be established
    #[error("Backend open failed: {0}")]
    BackendOpenFailed(String),

    /// Backend reported a fault on an open session
    #[error("Backend transport error: {0}")]
    BackendTransportError(String),

    /// Writing to the client connection failed
    #[error("Client send failed: {0}")]
    ClientSendFailed(String),
}

impl RelayError {
    /// Whether this error ends the relay session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::BackendOpenFailed(_) | Self::ClientSendFailed(_))
    }
}

impl From<SpeakError> for RelayError {
    fn from(err: SpeakError) -> Self {
        Self::BackendOpenFailed(err.to_string())
    }
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
