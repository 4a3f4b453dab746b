//! Mock Deepgram Speak server
//!
//! Speaks just enough of the streaming Speak protocol for tests:
//! - checks `Authorization: Token <key>` on the upgrade
//! - sends `Metadata` after the handshake
//! - answers each `Speak` with one binary PCM chunk (or an `Error` for [`TRIGGER_ERROR_TEXT`])
//! - answers `Flush` with `Flushed`
//! - answers `Close` with a close frame

// Not every test binary uses every helper
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

/// Bytes in each mock audio chunk (10 ms of 48 kHz mono linear16)
pub const CHUNK_LEN: usize = 960;

/// `Speak` text that makes the mock answer with an `Error` frame
pub const TRIGGER_ERROR_TEXT: &str = "trigger-error";

/// Upgrade request as seen by the mock
#[derive(Debug, Clone)]
pub struct RecordedConnection {
    pub uri: String,
    pub authorization: Option<String>,
}

#[derive(Default)]
pub struct MockSpeakState {
    pub connections: Mutex<Vec<RecordedConnection>>,
    pub messages: Mutex<Vec<Value>>,
}

pub struct MockSpeakServer {
    pub addr: SocketAddr,
    pub state: Arc<MockSpeakState>,
    handle: JoinHandle<()>,
}

impl MockSpeakServer {
    /// Start a server that accepts `api_key`.
    pub async fn start(api_key: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockSpeakState::default());
        let expected = format!("Token {api_key}");

        let accept_state = state.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = accept_state.clone();
                let expected = expected.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(stream, state, expected).await;
                });
            }
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Base URL to configure as the speak endpoint
    pub fn url(&self) -> String {
        format!("ws://{}/v1/speak", self.addr)
    }

    pub fn connections(&self) -> Vec<RecordedConnection> {
        self.state.connections.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<Value> {
        self.state.messages.lock().unwrap().clone()
    }

    /// `type` fields of every control message received, in order
    pub fn message_types(&self) -> Vec<String> {
        self.messages()
            .iter()
            .filter_map(|m| m["type"].as_str().map(str::to_string))
            .collect()
    }
}

impl Drop for MockSpeakServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<MockSpeakState>,
    expected_auth: String,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let callback_state = state.clone();
    let callback = move |req: &Request, response: Response| {
        let authorization = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        callback_state
            .connections
            .lock()
            .unwrap()
            .push(RecordedConnection {
                uri: req.uri().to_string(),
                authorization: authorization.clone(),
            });

        if authorization.as_deref() == Some(expected_auth.as_str()) {
            Ok(response)
        } else {
            let mut error = ErrorResponse::new(Some("unauthorized".to_string()));
            *error.status_mut() = StatusCode::UNAUTHORIZED;
            Err(error)
        }
    };

    let ws_stream = accept_hdr_async(stream, callback).await?;
    let (mut write, mut read) = ws_stream.split();

    let metadata = json!({
        "type": "Metadata",
        "request_id": "mock-request",
        "model_name": "aura-asteria-en",
        "model_version": "mock",
    });
    write.send(Message::Text(metadata.to_string().into())).await?;

    let mut sequence_id = 0u64;

    while let Some(msg) = read.next().await {
        let text = match msg? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let value: Value = serde_json::from_str(&text)?;
        state.messages.lock().unwrap().push(value.clone());

        match value["type"].as_str() {
            Some("Speak") if value["text"] == TRIGGER_ERROR_TEXT => {
                let error = json!({
                    "type": "Error",
                    "err_code": "INVALID_INPUT",
                    "description": "Text rejected",
                });
                write.send(Message::Text(error.to_string().into())).await?;
            }
            Some("Speak") => {
                let chunk = vec![0x11u8; CHUNK_LEN];
                write.send(Message::Binary(chunk.into())).await?;
            }
            Some("Flush") => {
                let flushed = json!({"type": "Flushed", "sequence_id": sequence_id});
                sequence_id += 1;
                write.send(Message::Text(flushed.to_string().into())).await?;
            }
            Some("Close") => {
                write.send(Message::Close(None)).await?;
                break;
            }
            _ => {
                let error = json!({
                    "type": "Error",
                    "err_code": "INVALID_MESSAGE",
                    "description": "Unknown message type",
                });
                write.send(Message::Text(error.to_string().into())).await?;
            }
        }
    }

    Ok(())
}
