//! Deepgram Speak WebSocket message types.
//!
//! Control messages are JSON text frames tagged by `type`. Audio arrives as
//! binary frames and never goes through these types.

use serde::{Deserialize, Serialize};

// =============================================================================
// Client -> Server
// =============================================================================

/// Messages sent to the Speak service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum SpeakClientMessage {
    /// Text to synthesize
    Speak { text: String },
    /// Emit buffered audio now
    Flush,
    /// Finish outstanding audio and close the connection
    Close,
}

// =============================================================================
// Server -> Client
// =============================================================================

/// Text messages received from the Speak service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum SpeakServerMessage {
    /// Sent once after the connection is established
    Metadata {
        #[serde(default)]
        request_id: Option<String>,
        #[serde(default)]
        model_name: Option<String>,
        #[serde(default)]
        model_version: Option<String>,
    },
    /// Acknowledges a Flush
    Flushed {
        #[serde(default)]
        sequence_id: Option<u64>,
    },
    /// Acknowledges a Clear
    Cleared {
        #[serde(default)]
        sequence_id: Option<u64>,
    },
    /// Non-fatal notice from the service
    Warning {
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        code: Option<String>,
    },
    /// Request-level failure
    Error {
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        err_msg: Option<String>,
        #[serde(default)]
        err_code: Option<String>,
    },
    /// Any message type this client does not know about
    #[serde(other)]
    Unknown,
}

impl SpeakServerMessage {
    /// Human readable message for an `Error` frame.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Error {
                description,
                err_msg,
                err_code,
            } => {
                let text = description
                    .as_deref()
                    .or(err_msg.as_deref())
                    .unwrap_or("Unknown Deepgram error");
                Some(match err_code {
                    Some(code) => format!("{code}: {text}"),
                    None => text.to_string(),
                })
            }
            _ => None,
        }
    }
}
