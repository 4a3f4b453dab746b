//! Speak WebSocket handler
//!
//! Accepts `GET /ws?model=<id>` upgrades and runs one [`RelaySession`] per connection.

use axum::{
    extract::{
        Query, State,
        ws::{WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::core::diagnostics::TracingDiagnostics;
use crate::state::AppState;

use super::relay::{RelaySession, resolve_model};

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Query parameters of the speak endpoint
#[derive(Debug, Default, Deserialize)]
pub struct SpeakQuery {
    /// Voice/model identifier; the configured default is used when absent or empty
    #[serde(default)]
    pub model: Option<String>,
}

/// Speak WebSocket handler
///
/// Upgrades the HTTP connection to a WebSocket that relays text to the speech
/// backend and streams audio back. Plain HTTP requests get `400 Bad Request`.
pub async fn speak_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    Query(query): Query<SpeakQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            warn!("Rejected non-WebSocket request to speak endpoint: {}", rejection);
            return (StatusCode::BAD_REQUEST, "Expected a WebSocket upgrade request")
                .into_response();
        }
    };

    let model = resolve_model(query.model.as_deref(), &state.config.default_speak_model);
    info!(model = %model, "Speak WebSocket connection upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_speak_socket(socket, state, model))
}

/// Handle one speak WebSocket connection
async fn handle_speak_socket(socket: WebSocket, app_state: Arc<AppState>, model: String) {
    let session_id = Uuid::new_v4().to_string();
    info!(session_id = %session_id, model = %model, "Speak WebSocket connection established");

    let (sender, receiver) = socket.split();
    let relay = RelaySession::new(
        model,
        app_state.shutdown.child_token(),
        TracingDiagnostics::shared(session_id.clone()),
    )
    .with_sample_rate(app_state.config.speak_sample_rate);

    match relay.run(app_state.backend.clone(), sender, receiver).await {
        Ok(reason) => {
            info!(session_id = %session_id, reason = %reason, "Speak WebSocket connection terminated");
        }
        Err(e) => {
            error!(session_id = %session_id, "Speak session failed: {}", e);
        }
    }
}
