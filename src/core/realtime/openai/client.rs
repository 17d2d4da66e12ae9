//! OpenAI Realtime API client implementation.
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Auth: `Authorization: Bearer <key>` plus `OpenAI-Beta: realtime=v1`
//! - Handshake: `session.update` → `session.updated`
//! - Audio: `pcm16`, base64 encoded in both directions
//!
//! The socket is owned by a connection task, exactly like the Gemini client.
//! Function call names arrive in `response.output_item.added` and are
//! remembered per item until the arguments are complete.

use std::collections::HashMap;
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
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::config::{OPENAI_AUDIO_FORMAT, OPENAI_OUTPUT_AUDIO_MIME, OpenAIRealtimeConfig};
use super::messages::{ClientEvent, ServerEvent, SessionConfig, ToolDef, TurnDetection};
use crate::core::realtime::base::{
    ConnectionState, FunctionCall, RealtimeError, RealtimeResult, SessionSetup, SharedUpstream,
    UpstreamConnection, UpstreamConnector, UpstreamEvent, UpstreamPart,
};

/// Channel capacity for WebSocket message sending.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Channel capacity for decoded server events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

const CLOSE_GRACE_PERIOD: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// Connector
// =============================================================================

/// Opens OpenAI Realtime sessions.
#[derive(Debug, Clone)]
pub struct OpenAIRealtimeConnector {
    config: OpenAIRealtimeConfig,
}

impl OpenAIRealtimeConnector {
    pub fn new(config: OpenAIRealtimeConfig) -> RealtimeResult<Self> {
        if config.api_key.is_empty() {
            return Err(RealtimeError::AuthenticationFailed(
                "OpenAI API key is required".to_string(),
            ));
        }
        build_ws_url(&config)?;
        Ok(Self { config })
    }
}

#[async_trait]
impl UpstreamConnector for OpenAIRealtimeConnector {
    async fn open(&self, setup: SessionSetup) -> RealtimeResult<SharedUpstream> {
        let session = OpenAIRealtimeSession::connect(&self.config, setup).await?;
        Ok(Arc::new(session))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

fn build_ws_url(config: &OpenAIRealtimeConfig) -> RealtimeResult<Url> {
    let mut url = Url::parse(&config.endpoint)
        .map_err(|e| RealtimeError::InvalidConfiguration(format!("Invalid endpoint: {e}")))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(RealtimeError::InvalidConfiguration(format!(
            "Endpoint scheme must be ws or wss, got: {}",
            url.scheme()
        )));
    }
    url.query_pairs_mut().append_pair("model", &config.model);
    Ok(url)
}

fn build_session_config(config: &OpenAIRealtimeConfig, setup: SessionSetup) -> SessionConfig {
    let tools: Vec<ToolDef> = setup.tools.iter().map(ToolDef::from).collect();
    let tool_choice = (!tools.is_empty()).then(|| "auto".to_string());

    SessionConfig {
        modalities: vec!["audio".to_string(), "text".to_string()],
        instructions: setup.instructions,
        voice: config.voice.clone(),
        input_audio_format: OPENAI_AUDIO_FORMAT.to_string(),
        output_audio_format: OPENAI_AUDIO_FORMAT.to_string(),
        turn_detection: TurnDetection::server_vad(),
        tools,
        tool_choice,
    }
}

// =============================================================================
// Session
// =============================================================================

/// An open OpenAI Realtime session.
pub struct OpenAIRealtimeSession {
    ws_sender: mpsc::Sender<ClientEvent>,
    events: Mutex<mpsc::Receiver<RealtimeResult<UpstreamEvent>>>,
    shutdown: CancellationToken,
    state: Arc<RwLock<ConnectionState>>,
    connection_handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl OpenAIRealtimeSession {
    /// Connect, send `session.update` and wait for `session.updated`.
    pub async fn connect(
        config: &OpenAIRealtimeConfig,
        setup: SessionSetup,
    ) -> RealtimeResult<Self> {
        let url = build_ws_url(config)?;
        let state = Arc::new(RwLock::new(ConnectionState::Connecting));

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;
        request.headers_mut().insert("Authorization", bearer);
        request
            .headers_mut()
            .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let (mut ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        let update = ClientEvent::SessionUpdate {
            session: build_session_config(config, setup),
        };
        let json = serde_json::to_string(&update)
            .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;
        ws_stream
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| RealtimeError::WebSocketError(e.to_string()))?;

        tokio::time::timeout(config.setup_timeout, await_session_updated(&mut ws_stream))
            .await
            .map_err(|_| {
                RealtimeError::Timeout(format!(
                    "No session.updated within {}s",
                    config.setup_timeout.as_secs()
                ))
            })??;

        tracing::info!(model = %config.model, "Connected to OpenAI Realtime API");

        let (ws_sink, ws_stream) = ws_stream.split();
        let (ws_sender, ws_receiver) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);
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

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.read()
    }

    async fn send_event(&self, event: ClientEvent) -> RealtimeResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(RealtimeError::NotConnected);
        }
        self.ws_sender
            .send(event)
            .await
            .map_err(|_| RealtimeError::NotConnected)
    }
}

impl Drop for OpenAIRealtimeSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl UpstreamConnection for OpenAIRealtimeSession {
    async fn send_audio(&self, audio: Bytes) -> RealtimeResult<()> {
        self.send_event(ClientEvent::audio_append(&audio)).await
    }

    async fn send_text(&self, text: &str) -> RealtimeResult<()> {
        self.send_event(ClientEvent::user_text(text)).await?;
        self.send_event(ClientEvent::ResponseCreate).await
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
        let Some(call_id) = call.id.as_deref() else {
            tracing::debug!(name = %call.name, "Function call without id, nothing to acknowledge");
            return Ok(());
        };
        self.send_event(ClientEvent::function_output(call_id)).await
    }

    async fn close(&self) -> RealtimeResult<()> {
        self.shutdown.cancel();

        let handle = self.connection_handle.lock().take();
        if let Some(mut handle) = handle
            && tokio::time::timeout(CLOSE_GRACE_PERIOD, &mut handle)
                .await
                .is_err()
        {
            tracing::warn!("OpenAI connection task did not stop in time, aborting");
            handle.abort();
        }

        *self.state.write() = ConnectionState::Closed;
        Ok(())
    }
}

// =============================================================================
// Connection Task
// =============================================================================

async fn await_session_updated(ws_stream: &mut WsStream) -> RealtimeResult<()> {
    loop {
        match ws_stream.next().await {
            Some(Ok(Message::Text(text))) => match ServerEvent::parse(text.as_str()) {
                Ok(ServerEvent::SessionUpdated) => return Ok(()),
                Ok(ServerEvent::Error { error }) => {
                    return Err(RealtimeError::ProviderError(error.to_string()));
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to parse OpenAI event during setup: {}", e),
            },
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

/// Translate one server event. Function call names are tracked in `call_names`.
fn translate_event(
    event: ServerEvent,
    call_names: &mut HashMap<String, String>,
) -> Option<RealtimeResult<UpstreamEvent>> {
    match event {
        ServerEvent::Error { error } => Some(Err(RealtimeError::ProviderError(error.to_string()))),
        ServerEvent::OutputItemAdded { item } => {
            if item.item_type == "function_call"
                && let Some(name) = item.name
            {
                call_names.insert(item.id, name);
            }
            None
        }
        ServerEvent::AudioDelta { delta, .. } => match ServerEvent::decode_audio_delta(&delta) {
            Ok(data) => Some(Ok(UpstreamEvent::new(vec![UpstreamPart::InlineData {
                mime_type: OPENAI_OUTPUT_AUDIO_MIME.to_string(),
                data: Bytes::from(data),
            }]))),
            Err(e) => {
                tracing::warn!("Failed to decode OpenAI audio delta: {}", e);
                None
            }
        },
        ServerEvent::FunctionCallArgumentsDone {
            item_id,
            call_id,
            name,
            arguments,
        } => {
            let tracked = call_names.remove(&item_id);
            let Some(name) = name.or(tracked) else {
                tracing::warn!(call_id = %call_id, "Function call without a name, dropping");
                return None;
            };
            let args = serde_json::from_str(&arguments).unwrap_or_else(|e| {
                tracing::warn!("Invalid function call arguments for {}: {}", name, e);
                serde_json::Value::Null
            });
            Some(Ok(UpstreamEvent::new(vec![UpstreamPart::FunctionCall(
                FunctionCall {
                    id: Some(call_id),
                    name,
                    args,
                },
            )])))
        }
        ServerEvent::SessionUpdated | ServerEvent::Other => None,
    }
}

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

async fn run_connection(
    mut ws_sink: SplitSink<WsStream, Message>,
    mut ws_stream: SplitStream<WsStream>,
    mut outgoing: mpsc::Receiver<ClientEvent>,
    event_tx: mpsc::Sender<RealtimeResult<UpstreamEvent>>,
    shutdown: CancellationToken,
    state: Arc<RwLock<ConnectionState>>,
) {
    let mut call_names = HashMap::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::debug!("Closing OpenAI Realtime connection");
                let _ = ws_sink.send(Message::Close(None)).await;
                break;
            }

            Some(event) = outgoing.recv() => {
                let json = match serde_json::to_string(&event) {
                    Ok(j) => j,
                    Err(e) => {
                        tracing::error!("Failed to serialize OpenAI event: {}", e);
                        continue;
                    }
                };

                if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                    tracing::error!("Failed to send OpenAI event: {}", e);
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
                    Some(Ok(Message::Text(text))) => match ServerEvent::parse(text.as_str()) {
                        Ok(event) => match translate_event(event, &mut call_names) {
                            Some(item) => {
                                let fatal = item.is_err();
                                deliver(&event_tx, &shutdown, item).await && !fatal
                            }
                            None => true,
                        },
                        Err(e) => {
                            tracing::warn!("Failed to parse OpenAI event: {}", e);
                            true
                        }
                    },
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
                        tracing::info!(reason = %reason, "OpenAI Realtime connection closed by server");
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
                        tracing::warn!("OpenAI WebSocket error: {}", e);
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
