pub mod diagnostics;
pub mod speak;
pub mod wav;

// Re-export commonly used types for convenience
pub use diagnostics::{Diagnostics, SharedDiagnostics, TracingDiagnostics};

pub use speak::{
    DeepgramSpeak, DeepgramSpeakConfig, SpeakBackend, SpeakError, SpeakEvent, SpeakResult,
    SpeakSession,
};
