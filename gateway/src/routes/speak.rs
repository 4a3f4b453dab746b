//! Speak WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::speak::speak_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the speak WebSocket router
///
/// # Endpoint
///
/// `GET /ws?model=<id>` - WebSocket upgrade for text-to-speech streaming
///
/// # Example
///
/// ```json
/// // Client sends
/// {"text": "Hello there"}
///
/// // Server responds
/// {"type": "Open"}
/// // binary: 44-byte WAV header, then PCM chunks
/// {"type": "Flushed"}
/// ```
pub fn create_speak_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws", get(speak_handler))
        .layer(TraceLayer::new_for_http())
}
