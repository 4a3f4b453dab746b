//! Deepgram streaming Speak client.
//!
//! Implements [`SpeakBackend`] over Deepgram's WebSocket Speak API.
//!
//! # API Reference
//!
//! - Endpoint: `wss://api.deepgram.com/v1/speak?model=<model>&encoding=linear16&sample_rate=<rate>`
//! - Auth: `Authorization: Token <api key>`
//! - Protocol: JSON control messages, binary PCM audio frames
//!
//! # Event Ordering
//!
//! `Opened` is sent by `open` before the connection task starts, so it precedes every
//! other event. The connection task is the only producer afterwards, and a
//! `Closed` event is sent exactly once when it ends (or when `close` has to
//! abort it), which makes `Closed` the last event of every session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header::AUTHORIZATION};
use tokio_tungstenite::tungstenite::{self, Message};

use super::config::{DEEPGRAM_MAX_TEXT_CHARS, DeepgramSpeakConfig};
use super::messages::{SpeakClientMessage, SpeakServerMessage};
use crate::core::diagnostics::SharedDiagnostics;
use crate::core::speak::base::{
    SpeakBackend, SpeakError, SpeakEvent, SpeakResult, SpeakSession,
};

/// Channel capacity for outgoing control messages.
const WS_CHANNEL_CAPACITY: usize = 256;

/// How long `close` waits for the service to drain before aborting.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

// =============================================================================
// Backend
// =============================================================================

/// Deepgram Speak backend. Opens one WebSocket per session.
#[derive(Debug)]
pub struct DeepgramSpeak {
    config: DeepgramSpeakConfig,
}

impl DeepgramSpeak {
    /// Create a backend from validated settings.
    ///
    /// # Errors
    /// [`SpeakError::InvalidConfiguration`] if the API key is missing or the URL is unusable.
    pub fn new(config: DeepgramSpeakConfig) -> SpeakResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DeepgramSpeakConfig {
        &self.config
    }

    /// Build the authenticated upgrade request for `model`.
    pub fn build_request(
        &self,
        model: &str,
    ) -> SpeakResult<tungstenite::handshake::client::Request> {
        build_request(&self.config, model)
    }
}

impl SpeakBackend for DeepgramSpeak {
    fn create_session(
        &self,
        model: &str,
        events: mpsc::Sender<SpeakEvent>,
        diagnostics: SharedDiagnostics,
    ) -> Box<dyn SpeakSession> {
        Box::new(DeepgramSpeakSession {
            config: self.config.clone(),
            model: model.to_string(),
            sender: None,
            events,
            open: Arc::new(AtomicBool::new(false)),
            closed_sent: Arc::new(AtomicBool::new(false)),
            closing: false,
            connection_handle: None,
            diagnostics,
        })
    }

    fn name(&self) -> &'static str {
        "deepgram"
    }
}

fn build_request(
    config: &DeepgramSpeakConfig,
    model: &str,
) -> SpeakResult<tungstenite::handshake::client::Request> {
    let url = config.session_url(model)?;
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| SpeakError::InvalidConfiguration(e.to_string()))?;

    let token = HeaderValue::from_str(&format!("Token {}", config.api_key))
        .map_err(|e| SpeakError::InvalidConfiguration(format!("Invalid API key: {e}")))?;
    request.headers_mut().insert(AUTHORIZATION, token);

    Ok(request)
}

// =============================================================================
// Session
// =============================================================================

/// One Deepgram Speak connection, unopened until [`SpeakSession::open`].
pub struct DeepgramSpeakSession {
    config: DeepgramSpeakConfig,
    model: String,
    sender: Option<mpsc::Sender<SpeakClientMessage>>,
    events: mpsc::Sender<SpeakEvent>,
    /// Set on a successful open, cleared by the connection task when the socket ends
    open: Arc<AtomicBool>,
    /// Set once `Closed` has been emitted
    closed_sent: Arc<AtomicBool>,
    closing: bool,
    connection_handle: Option<JoinHandle<()>>,
    diagnostics: SharedDiagnostics,
}

impl DeepgramSpeakSession {
    /// Report a fault without blocking on the event consumer.
    fn report_error(&self, message: String) {
        self.diagnostics.warn(&message);
        if self.events.try_send(SpeakEvent::Error(message)).is_err() {
            self.diagnostics
                .warn("Dropped Deepgram error event: event channel full or closed");
        }
    }

    async fn enqueue(&mut self, message: SpeakClientMessage) {
        if !self.is_open() {
            self.report_error("Deepgram session is not open".to_string());
            return;
        }

        let Some(sender) = self.sender.as_ref() else {
            self.report_error("Deepgram session is not open".to_string());
            return;
        };

        if sender.send(message).await.is_err() {
            self.report_error("Failed to send to Deepgram: connection task ended".to_string());
        }
    }
}

#[async_trait]
impl SpeakSession for DeepgramSpeakSession {
    async fn open(&mut self) -> SpeakResult<()> {
        if self.closing {
            return Err(SpeakError::BackendUnavailable(
                "Deepgram session already closed".to_string(),
            ));
        }
        if self.connection_handle.is_some() {
            return Ok(());
        }

        let request = build_request(&self.config, &self.model)?;

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| SpeakError::BackendUnavailable(e.to_string()))?;

        self.diagnostics
            .info(&format!("Connected to Deepgram Speak (model={})", self.model));

        let (ws_sink, ws_stream) = ws_stream.split();
        let (tx, rx) = mpsc::channel::<SpeakClientMessage>(WS_CHANNEL_CAPACITY);
        self.open.store(true, Ordering::SeqCst);

        // Receiver dropped means nobody is listening, which is not an open failure
        let _ = self.events.send(SpeakEvent::Opened).await;

        self.connection_handle = Some(tokio::spawn(run_connection(
            ws_sink,
            ws_stream,
            rx,
            self.events.clone(),
            self.open.clone(),
            self.closed_sent.clone(),
            self.diagnostics.clone(),
        )));
        self.sender = Some(tx);

        Ok(())
    }

    async fn send_text(&mut self, text: &str) {
        let chars = text.chars().count();
        if chars > DEEPGRAM_MAX_TEXT_CHARS {
            self.report_error(format!(
                "Text is {chars} characters, Deepgram accepts at most {DEEPGRAM_MAX_TEXT_CHARS}"
            ));
            return;
        }

        self.enqueue(SpeakClientMessage::Speak {
            text: text.to_string(),
        })
        .await;
    }

    async fn flush(&mut self) {
        self.enqueue(SpeakClientMessage::Flush).await;
    }

    async fn close(&mut self) {
        if self.closing {
            return;
        }
        self.closing = true;

        let Some(mut handle) = self.connection_handle.take() else {
            self.diagnostics.debug("Deepgram session never opened, nothing to close");
            return;
        };

        if let Some(sender) = self.sender.take() {
            if self.open.load(Ordering::SeqCst) {
                let _ = tokio::time::timeout(CLOSE_GRACE, sender.send(SpeakClientMessage::Close))
                    .await;
            }
        }

        match tokio::time::timeout(CLOSE_GRACE, &mut handle).await {
            Ok(_) => self.diagnostics.debug("Deepgram connection task finished"),
            Err(_) => {
                self.diagnostics
                    .warn("Deepgram did not close in time, aborting connection");
                handle.abort();
                let _ = handle.await;
            }
        }

        self.open.store(false, Ordering::SeqCst);
        if !self.closed_sent.swap(true, Ordering::SeqCst) {
            let _ = self.events.try_send(SpeakEvent::Closed);
        }

        self.diagnostics.info("Disconnected from Deepgram Speak");
    }

    fn is_open(&self) -> bool {
        !self.closing && self.open.load(Ordering::SeqCst)
    }
}

impl Drop for DeepgramSpeakSession {
    fn drop(&mut self) {
        if let Some(handle) = self.connection_handle.take() {
            handle.abort();
        }
    }
}

// =============================================================================
// Connection Task
// =============================================================================

async fn run_connection<W, R>(
    mut ws_sink: W,
    mut ws_stream: R,
    mut rx: mpsc::Receiver<SpeakClientMessage>,
    events: mpsc::Sender<SpeakEvent>,
    open: Arc<AtomicBool>,
    closed_sent: Arc<AtomicBool>,
    diagnostics: SharedDiagnostics,
) where
    W: Sink<Message, Error = tungstenite::Error> + Unpin,
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let mut outgoing_open = true;

    loop {
        tokio::select! {
            outgoing = rx.recv(), if outgoing_open => {
                let Some(message) = outgoing else {
                    // Session handle dropped its sender; keep reading until the service closes
                    outgoing_open = false;
                    continue;
                };

                let json = match serde_json::to_string(&message) {
                    Ok(j) => j,
                    Err(e) => {
                        diagnostics.error(&format!("Failed to serialize Deepgram message: {e}"));
                        continue;
                    }
                };

                if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                    let error = format!("Failed to send to Deepgram: {e}");
                    diagnostics.error(&error);
                    let _ = events.send(SpeakEvent::Error(error)).await;
                    break;
                }
            }

            incoming = ws_stream.next() => {
                match incoming {
                    Some(Ok(Message::Binary(data))) => {
                        let _ = events.send(SpeakEvent::AudioChunk(data)).await;
                    }
                    Some(Ok(Message::Text(text))) => {
                        if let Some(event) = handle_server_text(&text, &diagnostics) {
                            let _ = events.send(event).await;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        diagnostics.info(&format!("Deepgram closed the connection: {frame:?}"));
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                            diagnostics.warn(&format!("Failed to send pong: {e}"));
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let error = format!("Deepgram WebSocket error: {e}");
                        diagnostics.error(&error);
                        let _ = events.send(SpeakEvent::Error(error)).await;
                        break;
                    }
                    None => {
                        diagnostics.info("Deepgram stream ended");
                        break;
                    }
                }
            }
        }
    }

    open.store(false, Ordering::SeqCst);
    if !closed_sent.swap(true, Ordering::SeqCst) {
        let _ = events.send(SpeakEvent::Closed).await;
    }
}

/// Map a text frame from the service to an event, logging the rest.
fn handle_server_text(text: &str, diagnostics: &SharedDiagnostics) -> Option<SpeakEvent> {
    let message = match serde_json::from_str::<SpeakServerMessage>(text) {
        Ok(m) => m,
        Err(e) => {
            diagnostics.warn(&format!("Failed to parse Deepgram message: {e} - {text}"));
            return None;
        }
    };

    match message {
        SpeakServerMessage::Metadata {
            request_id,
            model_name,
            ..
        } => {
            diagnostics.debug(&format!(
                "Deepgram metadata: request_id={request_id:?} model={model_name:?}"
            ));
            None
        }
        SpeakServerMessage::Flushed { .. } => Some(SpeakEvent::Flushed),
        SpeakServerMessage::Cleared { sequence_id } => {
            diagnostics.debug(&format!("Deepgram cleared: sequence_id={sequence_id:?}"));
            None
        }
        SpeakServerMessage::Warning { description, code } => {
            diagnostics.warn(&format!(
                "Deepgram warning {}: {}",
                code.as_deref().unwrap_or("-"),
                description.as_deref().unwrap_or("")
            ));
            None
        }
        ref error @ SpeakServerMessage::Error { .. } => error.error_message().map(SpeakEvent::Error),
        SpeakServerMessage::Unknown => {
            diagnostics.debug(&format!("Ignoring Deepgram message: {text}"));
            None
        }
    }
}
