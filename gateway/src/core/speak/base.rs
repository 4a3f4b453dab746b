//! Base traits and types for streaming speech-synthesis ("speak") backends.
//!
//! A backend hands out one session handle per client connection. The handle
//! is created unopened with its event channel already attached, then opened.
//! It reports everything it observes as a [`SpeakEvent`] on that single
//! ordered channel, so the consumer sees events in exactly the order the
//! remote service produced them.
//!
//! # Audio Format
//!
//! Sessions deliver raw linear16 PCM. Container framing is left to the relay.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::core::diagnostics::SharedDiagnostics;

/// Channel capacity for session events.
pub const SPEAK_EVENT_CHANNEL_CAPACITY: usize = 1024;

// =============================================================================
// Error Types
// =============================================================================

/// Errors returned by speak backends.
///
/// Only backend construction and [`SpeakSession::open`] return errors. Faults on an
/// open session are reported as [`SpeakEvent::Error`].
#[derive(Debug, Error)]
pub enum SpeakError {
    /// The remote service could not be reached or refused the session
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type for speak operations.
pub type SpeakResult<T> = Result<T, SpeakError>;

// =============================================================================
// Events
// =============================================================================

/// Normalized event emitted by a speak session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakEvent {
    /// The remote session is established
    Opened,
    /// A chunk of synthesized PCM audio
    AudioChunk(Bytes),
    /// The service acknowledged a flush
    Flushed,
    /// The remote session ended. Always the last event of a session.
    Closed,
    /// A non-fatal fault on the session
    Error(String),
}

impl SpeakEvent {
    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::AudioChunk(_) => "audio_chunk",
            Self::Flushed => "flushed",
            Self::Closed => "closed",
            Self::Error(_) => "error",
        }
    }
}

// =============================================================================
// Traits
// =============================================================================

/// Factory for speak sessions.
pub trait SpeakBackend: Send + Sync {
    /// Create an unopened session handle for `model`.
    ///
    /// `events` must already be consumed by the caller: every event of the
    /// session, including [`SpeakEvent::Opened`], is sent on it.
    fn create_session(
        &self,
        model: &str,
        events: mpsc::Sender<SpeakEvent>,
        diagnostics: SharedDiagnostics,
    ) -> Box<dyn SpeakSession>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// Handle to one speak session.
///
/// Apart from `open`, none of these methods fail across the boundary:
/// transport faults are delivered as [`SpeakEvent::Error`] on the session's
/// event channel.
#[async_trait]
pub trait SpeakSession: Send {
    /// Establish the remote session. [`SpeakEvent::Opened`] is sent on success.
    ///
    /// # Errors
    /// [`SpeakError::BackendUnavailable`] if the remote session cannot be established.
    async fn open(&mut self) -> SpeakResult<()>;

    /// Queue `text` for synthesis.
    async fn send_text(&mut self, text: &str);

    /// Ask the service to emit any buffered audio now.
    async fn flush(&mut self);

    /// End the session. Closing twice, or closing a handle that never opened, is a no-op.
    async fn close(&mut self);

    /// Whether the session can still accept requests.
    fn is_open(&self) -> bool;
}
