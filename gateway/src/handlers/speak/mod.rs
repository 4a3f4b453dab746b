//! Text-to-speech relay WebSocket handlers
//!
//! Each connection on `/ws` gets one relay and one backend speak session.
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - **Text frames**: `{"text": "..."}`. Each message is synthesized and flushed on its own.
//!   Empty or malformed messages are dropped.
//! - **Binary frames**: not accepted, dropped.
//!
//! ## Server → Client
//!
//! - **Binary frames**: a 44-byte WAV header at the start of each audio burst, then raw
//!   PCM (linear16, mono).
//! - **Text frames**: `{"type":"Open"}`, `{"type":"Flushed"}`, `{"type":"Close"}`,
//!   `{"type":"Error","message":"..."}`.

mod handler;
pub mod messages;
pub mod relay;

pub use handler::{SpeakQuery, speak_handler};
pub use relay::{CloseReason, RelaySession};
