//! Deepgram Speak configuration.

use std::fmt;

use url::Url;
use zeroize::Zeroize;

use crate::core::speak::base::{SpeakError, SpeakResult};
use crate::core::wav::{MAX_SAMPLE_RATE, STREAM_SAMPLE_RATE};

/// Deepgram streaming Speak WebSocket endpoint.
pub const DEEPGRAM_SPEAK_URL: &str = "wss://api.deepgram.com/v1/speak";

/// Audio encoding requested from the service. Must stay raw PCM for the WAV framing.
pub const DEEPGRAM_SPEAK_ENCODING: &str = "linear16";

/// Maximum characters accepted by a single Speak message.
pub const DEEPGRAM_MAX_TEXT_CHARS: usize = 2000;

/// Connection settings for [`DeepgramSpeak`](super::DeepgramSpeak).
#[derive(Clone)]
pub struct DeepgramSpeakConfig {
    /// Deepgram API key, sent as `Authorization: Token <key>`
    pub api_key: String,
    /// Base WebSocket URL, without query parameters
    pub url: String,
    /// Output sample rate in Hz
    pub sample_rate: u32,
}

impl DeepgramSpeakConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            url: DEEPGRAM_SPEAK_URL.to_string(),
            sample_rate: STREAM_SAMPLE_RATE,
        }
    }

    /// Validate the settings without touching the network.
    pub fn validate(&self) -> SpeakResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(SpeakError::InvalidConfiguration(
                "Deepgram API key is required".to_string(),
            ));
        }
        if self.sample_rate == 0 || self.sample_rate > MAX_SAMPLE_RATE {
            return Err(SpeakError::InvalidConfiguration(format!(
                "sample_rate must be between 1 and {MAX_SAMPLE_RATE}, got {}",
                self.sample_rate
            )));
        }
        self.base_url().map(|_| ())
    }

    /// Build the session URL for `model`.
    ///
    /// `<url>?model=<model>&encoding=linear16&sample_rate=<rate>`
    pub fn session_url(&self, model: &str) -> SpeakResult<Url> {
        let mut url = self.base_url()?;
        url.query_pairs_mut()
            .append_pair("model", model)
            .append_pair("encoding", DEEPGRAM_SPEAK_ENCODING)
            .append_pair("sample_rate", &self.sample_rate.to_string());
        Ok(url)
    }

    fn base_url(&self) -> SpeakResult<Url> {
        let url = Url::parse(&self.url).map_err(|e| {
            SpeakError::InvalidConfiguration(format!("Invalid speak URL '{}': {}", self.url, e))
        })?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(SpeakError::InvalidConfiguration(format!(
                "Speak URL must use ws or wss, got '{other}'"
            ))),
        }
    }
}

impl Default for DeepgramSpeakConfig {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl fmt::Debug for DeepgramSpeakConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeepgramSpeakConfig")
            .field("api_key", &"<redacted>")
            .field("url", &self.url)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

impl Drop for DeepgramSpeakConfig {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeepgramSpeakConfig::default();
        assert_eq!(config.url, DEEPGRAM_SPEAK_URL);
        assert_eq!(config.sample_rate, 48000);
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn test_session_url() {
        let config = DeepgramSpeakConfig::new("key");
        let url = config.session_url("aura-asteria-en").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://api.deepgram.com/v1/speak?model=aura-asteria-en&encoding=linear16&sample_rate=48000"
        );
    }

    #[test]
    fn test_session_url_escapes_model() {
        let config = DeepgramSpeakConfig::new("key");
        let url = config.session_url("aura a&b").unwrap();
        assert!(url.as_str().contains("model=aura+a%26b"));
    }

    #[test]
    fn test_validate_requires_api_key() {
        let config = DeepgramSpeakConfig::new("   ");
        assert!(matches!(
            config.validate(),
            Err(SpeakError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_http_scheme() {
        let mut config = DeepgramSpeakConfig::new("key");
        config.url = "https://api.deepgram.com/v1/speak".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ws or wss"));
    }

    #[test]
    fn test_validate_rejects_zero_sample_rate() {
        let mut config = DeepgramSpeakConfig::new("key");
        config.sample_rate = 0;
        assert!(config.validate().is_err());

        config.sample_rate = 3_000_000_000;
        assert!(config.validate().is_err());

        config.sample_rate = MAX_SAMPLE_RATE;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = DeepgramSpeakConfig::new("super-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
