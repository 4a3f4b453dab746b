//! Per-connection relay between a client WebSocket and a speak session.
//!
//! One [`RelaySession`] owns one client connection and at most one backend
//! session. Three tasks cooperate per connection:
//! - the relay loop reads client frames and drives the backend session,
//! - the event forwarder turns backend events into client frames,
//! - the writer is the only task that writes to the client.
//!
//! The forwarder never waits on the relay loop, so a backend call blocked on
//! a full event channel still sees that channel drain. Every wait in the relay
//! loop and the forwarder also races the session's cancellation token.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::ws::Message;
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::core::diagnostics::SharedDiagnostics;
use crate::core::speak::{SPEAK_EVENT_CHANNEL_CAPACITY, SpeakBackend, SpeakEvent, SpeakSession};
use crate::core::wav;
use crate::errors::{RelayError, RelayResult};

use super::messages::{IncomingSpeakMessage, OutgoingStatus, SpeakMessageRoute};

/// Channel buffer size for frames queued to the client writer
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Silence gap after which the next audio chunk gets a fresh WAV header
pub const HEADER_QUIESCENCE: Duration = Duration::from_secs(3);

/// How long the writer gets to flush queued frames on teardown
const WRITER_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Pick the requested model, or `default_model` when none or empty was given.
pub fn resolve_model(requested: Option<&str>, default_model: &str) -> String {
    match requested.map(str::trim) {
        Some(model) if !model.is_empty() => model.to_string(),
        _ => default_model.to_string(),
    }
}

/// Log a relay error at a level matching its severity.
fn report(diagnostics: &SharedDiagnostics, error: &RelayError) {
    if error.is_fatal() {
        diagnostics.error(&error.to_string());
    } else {
        diagnostics.warn(&error.to_string());
    }
}

/// Queue a frame for the writer unless `stop` fires first.
///
/// Returns false if the frame was not queued.
async fn queue_route(
    routes: &mpsc::Sender<SpeakMessageRoute>,
    route: SpeakMessageRoute,
    stop: &CancellationToken,
) -> bool {
    tokio::select! {
        result = routes.send(route) => result.is_ok(),
        _ = stop.cancelled() => false,
    }
}

// =============================================================================
// State
// =============================================================================

/// Lifecycle of a relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayState {
    Idle,
    SessionStarting,
    Streaming,
    Closing,
    Closed,
}

/// Backend session handle owned by the relay.
enum BackendSlot {
    NoSession,
    Active(Box<dyn SpeakSession>),
}

impl BackendSlot {
    fn session_mut(&mut self) -> Option<&mut (dyn SpeakSession + 'static)> {
        match self {
            Self::Active(session) => Some(session.as_mut()),
            Self::NoSession => None,
        }
    }

    fn take(&mut self) -> BackendSlot {
        std::mem::replace(self, Self::NoSession)
    }
}

impl fmt::Debug for BackendSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSession => write!(f, "NoSession"),
            Self::Active(_) => write!(f, "Active"),
        }
    }
}

/// Decides which audio chunks start a new burst and need a WAV header.
///
/// A header is due on the first chunk ever, and afterwards whenever more than
/// the quiescence interval has passed since the previous header.
#[derive(Debug, Clone)]
pub struct HeaderInjector {
    last_injection: Option<Instant>,
    quiescence: Duration,
}

impl HeaderInjector {
    pub fn new(quiescence: Duration) -> Self {
        Self {
            last_injection: None,
            quiescence,
        }
    }

    /// Returns true if a header must precede a chunk arriving at `now`,
    /// and records the injection.
    pub fn should_inject(&mut self, now: Instant) -> bool {
        let due = match self.last_injection {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.quiescence,
        };
        if due {
            self.last_injection = Some(now);
        }
        due
    }
}

impl Default for HeaderInjector {
    fn default() -> Self {
        Self::new(HEADER_QUIESCENCE)
    }
}

/// Why a relay session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent a close frame
    ClientClosed,
    /// Client stream ended without a close frame
    ClientDisconnected,
    /// Client stream yielded an error
    ClientError(String),
    /// A write to the client failed
    ClientSendFailed,
    /// The session's cancellation token fired
    Cancelled,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientClosed => write!(f, "client closed"),
            Self::ClientDisconnected => write!(f, "client disconnected"),
            Self::ClientError(e) => write!(f, "client error: {e}"),
            Self::ClientSendFailed => write!(f, "client send failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// How the client writer is stopped on teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterExit {
    /// Nothing more may reach the client
    Abort,
    /// Queue a close frame and let pending frames go out first
    Drain,
}

/// Tasks and channels spawned for one `run`.
struct Pumps {
    routes: mpsc::Sender<SpeakMessageRoute>,
    writer: JoinHandle<()>,
    forwarder: JoinHandle<()>,
    forward_stop: CancellationToken,
}

// =============================================================================
// Event Forwarder
// =============================================================================

/// Turns backend events into client frames.
struct EventForwarder {
    header: HeaderInjector,
    header_bytes: Bytes,
    /// Cleared once the client must not receive any more frames
    client_open: Arc<AtomicBool>,
    routes: mpsc::Sender<SpeakMessageRoute>,
    stop: CancellationToken,
    diagnostics: SharedDiagnostics,
}

impl EventForwarder {
    /// Drain `events` until the channel ends or `stop` fires.
    async fn run(mut self, mut events: mpsc::Receiver<SpeakEvent>) {
        loop {
            let event = tokio::select! {
                biased;

                _ = self.stop.cancelled() => break,

                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.forward(event).await;
        }
    }

    /// Encode one backend event and queue it for the client.
    async fn forward(&mut self, event: SpeakEvent) {
        let kind = event.kind();
        let mut frames: Vec<SpeakMessageRoute> = Vec::with_capacity(2);

        match event {
            SpeakEvent::Opened => {
                self.diagnostics.debug("Backend session opened");
                frames.push(SpeakMessageRoute::Status(OutgoingStatus::Open));
            }
            SpeakEvent::AudioChunk(data) => {
                if data.is_empty() {
                    self.diagnostics.warn("Dropping empty audio chunk");
                    return;
                }
                if self.header.should_inject(Instant::now()) {
                    frames.push(SpeakMessageRoute::Audio(self.header_bytes.clone()));
                }
                frames.push(SpeakMessageRoute::Audio(data));
            }
            SpeakEvent::Flushed => {
                frames.push(SpeakMessageRoute::Status(OutgoingStatus::Flushed));
            }
            SpeakEvent::Closed => {
                self.diagnostics.info("Backend session closed");
                if self.client_open.load(Ordering::SeqCst) {
                    frames.push(SpeakMessageRoute::Status(OutgoingStatus::Close));
                }
            }
            SpeakEvent::Error(message) => {
                report(
                    &self.diagnostics,
                    &RelayError::BackendTransportError(message.clone()),
                );
                if self.client_open.load(Ordering::SeqCst) {
                    frames.push(SpeakMessageRoute::Status(OutgoingStatus::Error { message }));
                }
            }
        }

        for frame in frames {
            if !queue_route(&self.routes, frame, &self.stop).await {
                self.diagnostics
                    .debug(&format!("Client writer unavailable, dropping {kind} event"));
                return;
            }
        }
    }
}

// =============================================================================
// Relay Session
// =============================================================================

/// Relay for one accepted client connection.
pub struct RelaySession {
    model: String,
    state: RelayState,
    backend: BackendSlot,
    /// Container header sent at the start of each burst
    header_bytes: Bytes,
    cancel: CancellationToken,
    /// Cleared once the client must not receive any more frames
    client_open: Arc<AtomicBool>,
    /// Set by the writer when a client write fails
    send_failed: Arc<AtomicBool>,
    diagnostics: SharedDiagnostics,
}

impl RelaySession {
    pub fn new(model: String, cancel: CancellationToken, diagnostics: SharedDiagnostics) -> Self {
        Self {
            model,
            state: RelayState::Idle,
            backend: BackendSlot::NoSession,
            header_bytes: Bytes::copy_from_slice(&wav::streaming_header()),
            cancel,
            client_open: Arc::new(AtomicBool::new(true)),
            send_failed: Arc::new(AtomicBool::new(false)),
            diagnostics,
        }
    }

    /// Describe audio at `sample_rate` in injected headers instead of 48 kHz.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.header_bytes = Bytes::copy_from_slice(&wav::build_header(
            sample_rate,
            wav::STREAM_CHANNELS,
            wav::STREAM_BITS_PER_SAMPLE,
        ));
        self
    }

    fn transition(&mut self, next: RelayState) {
        self.diagnostics
            .debug(&format!("Relay state {:?} -> {:?}", self.state, next));
        self.state = next;
    }

    fn forwarder(
        &self,
        routes: mpsc::Sender<SpeakMessageRoute>,
        stop: CancellationToken,
    ) -> EventForwarder {
        EventForwarder {
            header: HeaderInjector::default(),
            header_bytes: self.header_bytes.clone(),
            client_open: self.client_open.clone(),
            routes,
            stop,
            diagnostics: self.diagnostics.clone(),
        }
    }

    /// Close reason once the cancellation token has fired.
    fn cancel_reason(&self) -> CloseReason {
        if self.send_failed.load(Ordering::SeqCst) {
            CloseReason::ClientSendFailed
        } else {
            CloseReason::Cancelled
        }
    }

    /// Run the relay until the client leaves, a write fails, or the token is cancelled.
    ///
    /// The backend session is closed exactly once on every exit path, including
    /// a failed or cancelled open.
    ///
    /// # Errors
    /// [`RelayError::BackendOpenFailed`] if the backend session cannot be opened.
    /// The client receives an `Error` status and a close frame first.
    pub async fn run<S, R, E>(
        mut self,
        backend: Arc<dyn SpeakBackend>,
        client_sink: S,
        mut client_stream: R,
    ) -> RelayResult<CloseReason>
    where
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: fmt::Display + Send,
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: fmt::Display,
    {
        let (route_tx, route_rx) = mpsc::channel::<SpeakMessageRoute>(CHANNEL_BUFFER_SIZE);
        let writer = tokio::spawn(write_client(
            client_sink,
            route_rx,
            self.client_open.clone(),
            self.send_failed.clone(),
            self.cancel.clone(),
            self.diagnostics.clone(),
        ));

        // Consumer is running before open so no event can be missed
        let (events_tx, events_rx) = mpsc::channel::<SpeakEvent>(SPEAK_EVENT_CHANNEL_CAPACITY);
        let forward_stop = self.cancel.child_token();
        let forwarder = tokio::spawn(
            self.forwarder(route_tx.clone(), forward_stop.clone())
                .run(events_rx),
        );

        let pumps = Pumps {
            routes: route_tx,
            writer,
            forwarder,
            forward_stop,
        };

        self.transition(RelayState::SessionStarting);
        self.diagnostics.info(&format!(
            "Opening {} speak session (model={})",
            backend.name(),
            self.model
        ));

        let cancel = self.cancel.clone();
        let mut session = backend.create_session(&self.model, events_tx, self.diagnostics.clone());
        let opened = tokio::select! {
            result = session.open() => Some(result),
            _ = cancel.cancelled() => None,
        };
        // Held whatever the outcome so teardown closes it
        self.backend = BackendSlot::Active(session);

        match opened {
            Some(Ok(())) => self.transition(RelayState::Streaming),
            Some(Err(e)) => {
                let error = RelayError::from(e);
                report(&self.diagnostics, &error);
                queue_route(
                    &pumps.routes,
                    SpeakMessageRoute::Status(OutgoingStatus::Error {
                        message: error.to_string(),
                    }),
                    &cancel,
                )
                .await;
                self.teardown(WriterExit::Drain, pumps).await;
                return Err(error);
            }
            None => {
                self.diagnostics
                    .info("Relay cancelled while opening backend session");
                self.teardown(WriterExit::Drain, pumps).await;
                return Ok(self.cancel_reason());
            }
        }

        let reason = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break self.cancel_reason(),

                frame = client_stream.next() => {
                    match frame {
                        Some(Ok(msg)) => {
                            if let Some(reason) = self.handle_client_frame(msg).await {
                                break reason;
                            }
                        }
                        Some(Err(e)) => {
                            self.diagnostics.warn(&format!("Client WebSocket error: {e}"));
                            break CloseReason::ClientError(e.to_string());
                        }
                        None => {
                            self.diagnostics.info("Client connection ended");
                            break CloseReason::ClientDisconnected;
                        }
                    }
                }
            }
        };

        self.diagnostics.info(&format!("Relay closing: {reason}"));
        let exit = match reason {
            CloseReason::ClientClosed | CloseReason::ClientSendFailed => WriterExit::Abort,
            _ => WriterExit::Drain,
        };
        self.teardown(exit, pumps).await;
        Ok(reason)
    }

    /// Handle one client frame. Returns a close reason when the loop must stop.
    async fn handle_client_frame(&mut self, msg: Message) -> Option<CloseReason> {
        match msg {
            Message::Text(text) => {
                let request = match IncomingSpeakMessage::decode(&text) {
                    Ok(request) => request,
                    Err(e) => {
                        report(&self.diagnostics, &e);
                        return None;
                    }
                };

                let cancel = self.cancel.clone();
                let Some(session) = self.backend.session_mut() else {
                    self.diagnostics
                        .warn("Dropping client text: no backend session");
                    return None;
                };

                let delivered = tokio::select! {
                    _ = async {
                        session.send_text(&request).await;
                        session.flush().await;
                    } => true,
                    _ = cancel.cancelled() => false,
                };

                if delivered {
                    None
                } else {
                    Some(self.cancel_reason())
                }
            }
            Message::Binary(data) => {
                report(
                    &self.diagnostics,
                    &RelayError::UnexpectedBinaryFromClient { len: data.len() },
                );
                None
            }
            Message::Ping(_) | Message::Pong(_) => None,
            Message::Close(frame) => {
                self.diagnostics
                    .info(&format!("Client close received: {frame:?}"));
                Some(CloseReason::ClientClosed)
            }
        }
    }

    /// Stop the forwarder and the writer, close the backend, and move to `Closed`.
    async fn teardown(&mut self, exit: WriterExit, pumps: Pumps) {
        let Pumps {
            routes,
            mut writer,
            forwarder,
            forward_stop,
        } = pumps;

        if self.state == RelayState::Streaming {
            self.transition(RelayState::Closing);
        }

        // Dropping the event receiver here releases a backend blocked on it
        forward_stop.cancel();
        let _ = forwarder.await;

        match exit {
            WriterExit::Abort => {
                self.client_open.store(false, Ordering::SeqCst);
                writer.abort();
                let _ = writer.await;
            }
            WriterExit::Drain => {
                let _ = routes.try_send(SpeakMessageRoute::Close);
                drop(routes);
                if tokio::time::timeout(WRITER_DRAIN_GRACE, &mut writer)
                    .await
                    .is_err()
                {
                    self.diagnostics
                        .warn("Client writer did not drain in time, aborting");
                    writer.abort();
                    let _ = writer.await;
                }
                self.client_open.store(false, Ordering::SeqCst);
            }
        }

        if let BackendSlot::Active(mut session) = self.backend.take() {
            session.close().await;
        }

        self.transition(RelayState::Closed);
    }
}

// =============================================================================
// Client Writer
// =============================================================================

async fn write_client<S>(
    mut sink: S,
    mut routes: mpsc::Receiver<SpeakMessageRoute>,
    client_open: Arc<AtomicBool>,
    send_failed: Arc<AtomicBool>,
    cancel: CancellationToken,
    diagnostics: SharedDiagnostics,
) where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display + Send,
{
    while let Some(route) = routes.recv().await {
        let should_close = matches!(route, SpeakMessageRoute::Close);

        let message = match route {
            SpeakMessageRoute::Status(status) => match serde_json::to_string(&status) {
                Ok(json) => Message::Text(json.into()),
                Err(e) => {
                    diagnostics.error(&format!("Failed to serialize status: {e}"));
                    continue;
                }
            },
            SpeakMessageRoute::Audio(data) => Message::Binary(data),
            SpeakMessageRoute::Close => Message::Close(None),
        };

        if let Err(e) = sink.send(message).await {
            report(&diagnostics, &RelayError::ClientSendFailed(e.to_string()));
            client_open.store(false, Ordering::SeqCst);
            send_failed.store(true, Ordering::SeqCst);
            cancel.cancel();
            break;
        }

        if should_close {
            client_open.store(false, Ordering::SeqCst);
            break;
        }
    }
}
