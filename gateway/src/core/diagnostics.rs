//! Injected diagnostics sink.
//!
//! The relay and the speak session adapters never call the `tracing` macros
//! directly. They log through a [`Diagnostics`] handle so every line carries
//! the connection's session id, and so tests can capture what was reported.

use std::sync::Arc;

/// Log-level sink threaded through a relay session and its backend adapter.
pub trait Diagnostics: Send + Sync {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Shared handle to a diagnostics sink.
pub type SharedDiagnostics = Arc<dyn Diagnostics>;

/// Production sink that forwards to `tracing` with a `session_id` field.
#[derive(Debug, Clone)]
pub struct TracingDiagnostics {
    session_id: String,
}

impl TracingDiagnostics {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }

    /// Create a sink and wrap it as a [`SharedDiagnostics`].
    pub fn shared(session_id: impl Into<String>) -> SharedDiagnostics {
        Arc::new(Self::new(session_id))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Diagnostics for TracingDiagnostics {
    fn debug(&self, message: &str) {
        tracing::debug!(session_id = %self.session_id, "{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!(session_id = %self.session_id, "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(session_id = %self.session_id, "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(session_id = %self.session_id, "{}", message);
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingDiagnostics;
    use super::*;

    #[test]
    fn test_tracing_diagnostics_keeps_session_id() {
        let diagnostics = TracingDiagnostics::new("abc-123");
        assert_eq!(diagnostics.session_id(), "abc-123");

        // Must not panic without a subscriber installed
        diagnostics.debug("debug line");
        diagnostics.info("info line");
        diagnostics.warn("warn line");
        diagnostics.error("error line");
    }

    #[test]
    fn test_recording_diagnostics_through_shared_handle() {
        let recorder = Arc::new(RecordingDiagnostics::default());
        let shared: SharedDiagnostics = recorder.clone();

        shared.warn("dropped binary frame");
        shared.error("backend failed");
        shared.warn("empty text");

        assert_eq!(recorder.count("warn"), 2);
        assert_eq!(recorder.count("error"), 1);
        assert!(recorder.contains("error", "backend"));
        assert!(!recorder.contains("info", "backend"));
    }
}
