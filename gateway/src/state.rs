//! Shared application state.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::core::speak::{DeepgramSpeak, SpeakBackend, SpeakError};

/// State shared by every request handler.
pub struct AppState {
    pub config: ServerConfig,
    /// Backend that opens one speak session per WebSocket connection
    pub backend: Arc<dyn SpeakBackend>,
    /// Process-wide shutdown signal; each relay runs on a child token
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Build state backed by Deepgram Speak.
    ///
    /// # Errors
    /// [`SpeakError::InvalidConfiguration`] if the Deepgram settings are missing or invalid.
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, SpeakError> {
        let backend = DeepgramSpeak::new(config.deepgram_speak_config()?)?;
        Ok(Self::with_backend(config, Arc::new(backend)))
    }

    /// Build state around an already constructed backend.
    pub fn with_backend(config: ServerConfig, backend: Arc<dyn SpeakBackend>) -> Arc<Self> {
        Arc::new(Self {
            config,
            backend,
            shutdown: CancellationToken::new(),
        })
    }
}
