//! Gemini Live API client implementation.
//!
//! # API Reference
//!
//! - Endpoint: `wss://generativelanguage.googleapis.com/ws/...BidiGenerateContent?key=<key>`
//! - Protocol: WebSocket with JSON frames (text or binary)
//! - Handshake: `setup` → `setupComplete`
//! - Audio: PCM 16-bit, mono, little-endian, base64 encoded
//!
//! A dedicated task owns the socket. Outgoing messages reach it through an
//! mpsc channel; decoded server events leave it through another one, which is
//! what [`UpstreamConnection::receive`] drains.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::config::{GEMINI_INPUT_AUDIO_MIME, GeminiLiveConfig};
use super::messages::{
    ClientMessage, Content, FunctionDeclaration, GenerationConfig, PrebuiltVoiceConfig,
    ServerMessage, Setup, SpeechConfig, TextPart, Tool, VoiceConfig,
};
use crate::core::realtime::base::{
    ConnectionState, FunctionCall, RealtimeError, RealtimeResult, SessionSetup, SharedUpstream,
    UpstreamConnection, UpstreamConnector, UpstreamEvent,
};

/// Channel capacity for WebSocket message sending.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Channel capacity for decoded server events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long `close` waits for the connection task before aborting it.
const CLOSE_GRACE_PERIOD: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// Connector
// =============================================================================

/// Opens Gemini Live sessions.
#[derive(Debug, Clone)]
pub struct GeminiLiveConnector {
    config: GeminiLiveConfig,
}

impl GeminiLiveConnector {
    pub fn new(config: GeminiLiveConfig) -> RealtimeResult<Self> {
        if config.api_key.is_empty() {
            return Err(RealtimeError::AuthenticationFailed(
                "Gemini API key is required".to_string(),
            ));
        }
        build_ws_url(&config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GeminiLiveConfig {
        &self.config
    }
}

#[async_trait]
impl UpstreamConnector for GeminiLiveConnector {
    async fn open(&self, setup: SessionSetup) -> RealtimeResult<SharedUpstream> {
        let session = GeminiLiveSession::connect(&self.config, setup).await?;
        Ok(Arc::new(session))
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}

/// Build the WebSocket URL with the API key parameter.
fn build_ws_url(config: &GeminiLiveConfig) -> RealtimeResult<Url> {
    let mut url = Url::parse(&config.endpoint)
        .map_err(|e| RealtimeError::InvalidConfiguration(format!("Invalid endpoint: {e}")))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(RealtimeError::InvalidConfiguration(format!(
            "Endpoint scheme must be ws or wss, got: {}",
            url.scheme()
        )));
    }
    url.query_pairs_mut().append_pair("key", &config.api_key);
    Ok(url)
}

/// Build the setup frame for a session.
fn build_setup(config: &GeminiLiveConfig, setup: SessionSetup) -> Setup {
    let function_declarations: Vec<FunctionDeclaration> =
        setup.tools.iter().map(FunctionDeclaration::from).collect();

    Setup {
        model: config.model_resource(),
        generation_config: GenerationConfig {
            response_modalities: vec!["AUDIO".to_string()],
            speech_config: Some(SpeechConfig {
                language_code: setup.language_code,
                voice_config: Some(VoiceConfig {
                    prebuilt_voice_config: PrebuiltVoiceConfig {
                        voice_name: config.voice.clone(),
                    },
                }),
            }),
        },
        system_instruction: Some(Content {
            role: Some("model".to_string()),
            parts: vec![TextPart {
                text: setup.instructions,
            }],
        }),
        tools: if function_declarations.is_empty() {
            Vec::new()
        } else {
            vec![Tool {
                function_declarations,
            }]
        },
    }
}

// =============================================================================
// Session
// =============================================================================

/// An open Gemini Live session.
pub struct GeminiLiveSession {
    /// Outgoing message channel into the connection task
    ws_sender: mpsc::Sender<ClientMessage>,
    /// Decoded server events from the connection task
    events: Mutex<mpsc::Receiver<RealtimeResult<UpstreamEvent>>>,
    /// Cancels the connection task
    shutdown: CancellationToken,
    /// Connection state shared with the connection task
    state: Arc<RwLock<ConnectionState>>,
    /// Connection task handle
    connection_handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl GeminiLiveSession {
    /// Connect, send `setup` and wait for `setupComplete`.
    pub async fn connect(config: &GeminiLiveConfig, setup: SessionSetup) -> RealtimeResult<Self> {
        let url = build_ws_url(config)?;
        let state = Arc::new(RwLock::new(ConnectionState::Connecting));

        let (mut ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        let setup = ClientMessage::Setup(build_setup(config, setup));
        let json = serde_json::to_string(&setup)
            .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;
        ws_stream
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| RealtimeError::WebSocketError(e.to_string()))?;

        tokio::time::timeout(config.setup_timeout, await_setup_complete(&mut ws_stream))
            .await
            .map_err(|_| {
                RealtimeError::Timeout(format!(
                    "No setupComplete within {}s",
                    config.setup_timeout.as_secs()
                ))
            })??;

        tracing::info!(model = %config.model, "Connected to Gemini Live API");

        let (ws_sink, ws_stream) = ws_stream.split();
        let (ws_sender, ws_receiver) = mpsc::channel::<ClientMessage>(WS_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let shutdown = CancellationToken::new();

        *state.write() = ConnectionState::Connected;

        let handle = tokio::spawn(run_connection(
            ws_sink,
            ws_stream,
            ws_receiver,
            event_tx,
            shutdown.clone(),
            state.clone(),
        ));

        Ok(Self {
            ws_sender,
            events: Mutex::new(event_rx),
            shutdown,
            state,
            connection_handle: parking_lot::Mutex::new(Some(handle)),
        })
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.read()
    }

    async fn send_message(&self, message: ClientMessage) -> RealtimeResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(RealtimeError::NotConnected);
        }
        self.ws_sender
            .send(message)
            .await
            .map_err(|_| RealtimeError::NotConnected)
    }
}

impl Drop for GeminiLiveSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl UpstreamConnection for GeminiLiveSession {
    async fn send_audio(&self, audio: Bytes) -> RealtimeResult<()> {
        self.send_message(ClientMessage::audio(GEMINI_INPUT_AUDIO_MIME, &audio))
            .await
    }

    async fn send_text(&self, text: &str) -> RealtimeResult<()> {
        self.send_message(ClientMessage::user_text(text)).await
    }

    async fn receive(&self) -> RealtimeResult<UpstreamEvent> {
        let mut events = self.events.lock().await;
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(RealtimeError::NotConnected),
            event = events.recv() => event.unwrap_or(Err(RealtimeError::NotConnected)),
        }
    }

    async fn send_tool_response(&self, call: &FunctionCall) -> RealtimeResult<()> {
        self.send_message(ClientMessage::tool_ack(call)).await
    }

    async fn close(&self) -> RealtimeResult<()> {
        self.shutdown.cancel();

        let handle = self.connection_handle.lock().take();
        if let Some(mut handle) = handle
            && tokio::time::timeout(CLOSE_GRACE_PERIOD, &mut handle)
                .await
                .is_err()
        {
            tracing::warn!("Gemini connection task did not stop in time, aborting");
            handle.abort();
        }

        *self.state.write() = ConnectionState::Closed;
        Ok(())
    }
}

// =============================================================================
// Connection Task
// =============================================================================

/// Read frames until `setupComplete` arrives.
async fn await_setup_complete(ws_stream: &mut WsStream) -> RealtimeResult<()> {
    loop {
        match ws_stream.next().await {
            Some(Ok(Message::Text(text))) => {
                if ServerMessage::parse(text.as_bytes())?.is_setup_complete() {
                    return Ok(());
                }
            }
            Some(Ok(Message::Binary(data))) => {
                if ServerMessage::parse(&data)?.is_setup_complete() {
                    return Ok(());
                }
            }
            Some(Ok(Message::Ping(data))) => {
                ws_stream
                    .send(Message::Pong(data))
                    .await
                    .map_err(|e| RealtimeError::WebSocketError(e.to_string()))?;
            }
            Some(Ok(Message::Close(frame))) => {
                let reason = frame
                    .map(|f| f.reason.as_str().to_string())
                    .unwrap_or_else(|| "no reason".to_string());
                return Err(RealtimeError::ConnectionFailed(format!(
                    "Closed during setup: {reason}"
                )));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(RealtimeError::WebSocketError(e.to_string())),
            None => {
                return Err(RealtimeError::ConnectionFailed(
                    "Connection ended during setup".to_string(),
                ));
            }
        }
    }
}

/// Hand an item to the session, giving up if the session is shutting down.
async fn deliver(
    event_tx: &mpsc::Sender<RealtimeResult<UpstreamEvent>>,
    shutdown: &CancellationToken,
    item: RealtimeResult<UpstreamEvent>,
) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        sent = event_tx.send(item) => sent.is_ok(),
    }
}

/// Decode one server frame and forward any resulting event.
async fn forward_frame(
    payload: &[u8],
    event_tx: &mpsc::Sender<RealtimeResult<UpstreamEvent>>,
    shutdown: &CancellationToken,
) -> bool {
    let message = match ServerMessage::parse(payload) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Failed to parse Gemini server message: {}", e);
            return true;
        }
    };

    if let Some(go_away) = &message.go_away {
        tracing::warn!(time_left = ?go_away.time_left, "Gemini server is going away");
    }

    let event = message.into_event();
    if event.is_empty() {
        return true;
    }
    deliver(event_tx, shutdown, Ok(event)).await
}

async fn run_connection(
    mut ws_sink: SplitSink<WsStream, Message>,
    mut ws_stream: SplitStream<WsStream>,
    mut outgoing: mpsc::Receiver<ClientMessage>,
    event_tx: mpsc::Sender<RealtimeResult<UpstreamEvent>>,
    shutdown: CancellationToken,
    state: Arc<RwLock<ConnectionState>>,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::debug!("Closing Gemini Live connection");
                let _ = ws_sink.send(Message::Close(None)).await;
                break;
            }

            Some(message) = outgoing.recv() => {
                let json = match serde_json::to_string(&message) {
                    Ok(j) => j,
                    Err(e) => {
                        tracing::error!("Failed to serialize Gemini message: {}", e);
                        continue;
                    }
                };

                if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                    tracing::error!("Failed to send Gemini message: {}", e);
                    deliver(
                        &event_tx,
                        &shutdown,
                        Err(RealtimeError::WebSocketError(e.to_string())),
                    )
                    .await;
                    break;
                }
            }

            frame = ws_stream.next() => {
                let keep_going = match frame {
                    Some(Ok(Message::Text(text))) => {
                        forward_frame(text.as_bytes(), &event_tx, &shutdown).await
                    }
                    Some(Ok(Message::Binary(data))) => {
                        forward_frame(&data, &event_tx, &shutdown).await
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                            tracing::error!("Failed to send pong: {}", e);
                        }
                        true
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.as_str().to_string())
                            .unwrap_or_default();
                        tracing::info!(reason = %reason, "Gemini Live connection closed by server");
                        deliver(
                            &event_tx,
                            &shutdown,
                            Err(RealtimeError::ConnectionFailed(format!("Closed by server: {reason}"))),
                        )
                        .await;
                        false
                    }
                    Some(Ok(_)) => true,
                    Some(Err(e)) => {
                        tracing::warn!("Gemini WebSocket error: {}", e);
                        deliver(
                            &event_tx,
                            &shutdown,
                            Err(RealtimeError::WebSocketError(e.to_string())),
                        )
                        .await;
                        false
                    }
                    None => {
                        deliver(
                            &event_tx,
                            &shutdown,
                            Err(RealtimeError::ConnectionFailed("Connection ended".to_string())),
                        )
                        .await;
                        false
                    }
                };

                if !keep_going {
                    break;
                }
            }
        }
    }

    *state.write() = ConnectionState::Closed;
}
