//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `speak` - Text-to-speech relay WebSocket

pub mod api;
pub mod speak;

pub use speak::speak_handler;
