//! Streaming speech-synthesis backends.
//!
//! [`SpeakBackend`] opens sessions, [`SpeakSession`] drives one of them, and
//! every observation flows back as a [`SpeakEvent`].

pub mod base;
pub mod deepgram;

pub use base::{
    SPEAK_EVENT_CHANNEL_CAPACITY, SpeakBackend, SpeakError, SpeakEvent, SpeakResult, SpeakSession,
};
pub use deepgram::{DeepgramSpeak, DeepgramSpeakConfig, DeepgramSpeakSession};
