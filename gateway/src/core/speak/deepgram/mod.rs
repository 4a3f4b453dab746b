//! Deepgram streaming Speak (text-to-speech) backend.
//!
//! # Example
//!
//! ```rust,ignore
//! use speak_gateway::core::speak::{DeepgramSpeak, DeepgramSpeakConfig, SpeakBackend};
//! use speak_gateway::core::diagnostics::TracingDiagnostics;
//! use tokio::sync::mpsc;
//!
//! let backend = DeepgramSpeak::new(DeepgramSpeakConfig::new("dg-key"))?;
//! let (tx, mut rx) = mpsc::channel(1024);
//! let mut session =
//!     backend.create_session("aura-asteria-en", tx, TracingDiagnostics::shared("demo"));
//! session.open().await?;
//!
//! session.send_text("Hello there").await;
//! session.flush().await;
//! while let Some(event) = rx.recv().await {
//!     // Opened, AudioChunk(..), Flushed, ..., Closed
//! }
//! ```

mod client;
mod config;
mod messages;

pub use client::{DeepgramSpeak, DeepgramSpeakSession};
pub use config::{
    DEEPGRAM_MAX_TEXT_CHARS, DEEPGRAM_SPEAK_ENCODING, DEEPGRAM_SPEAK_URL, DeepgramSpeakConfig,
};
pub use messages::{SpeakClientMessage, SpeakServerMessage};
