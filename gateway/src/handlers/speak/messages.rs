//! Speak WebSocket message types
//!
//! Clients send JSON text frames `{"text": "..."}`. The server answers with
//! binary frames (WAV header or raw PCM) and JSON status text frames.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::errors::RelayError;

/// Maximum allowed size for a client text frame (50 KB)
pub const MAX_TEXT_SIZE: usize = 50 * 1024;

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

/// Incoming synthesis request. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct IncomingSpeakMessage {
    /// Text to synthesize
    #[serde(default)]
    pub text: Option<String>,
}

impl IncomingSpeakMessage {
    /// Decode a client text frame into the text to synthesize.
    ///
    /// # Errors
    /// [`RelayError::ClientFrameMalformed`] for oversized frames, invalid JSON,
    /// or a missing or empty `text`.
    pub fn decode(raw: &str) -> Result<String, RelayError> {
        if raw.len() > MAX_TEXT_SIZE {
            return Err(RelayError::ClientFrameMalformed(format!(
                "Text too large: {} bytes (max: {} bytes)",
                raw.len(),
                MAX_TEXT_SIZE
            )));
        }

        let message: IncomingSpeakMessage = serde_json::from_str(raw)
            .map_err(|e| RelayError::ClientFrameMalformed(format!("Invalid message format: {e}")))?;

        match message.text {
            Some(text) if !text.is_empty() => Ok(text),
            Some(_) => Err(RelayError::ClientFrameMalformed(
                "Empty text field".to_string(),
            )),
            None => Err(RelayError::ClientFrameMalformed(
                "Missing text field".to_string(),
            )),
        }
    }
}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

/// Status frame sent to the client as JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutgoingStatus {
    /// Backend session established
    Open,
    /// Backend flushed buffered audio
    Flushed,
    /// Backend session ended
    Close,
    /// Backend reported an error
    Error {
        /// Error message
        message: String,
    },
}

// =============================================================================
// Message Routing
// =============================================================================

/// Frames queued for the client writer task
#[derive(Debug)]
pub enum SpeakMessageRoute {
    /// JSON status text frame
    Status(OutgoingStatus),
    /// Binary audio data (header or PCM)
    Audio(Bytes),
    /// Close connection
    Close,
}
