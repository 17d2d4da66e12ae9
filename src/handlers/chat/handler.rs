//! Chat WebSocket handler
//!
//! Adapts an axum WebSocket to the session's [`ClientSource`] and
//! [`ClientSink`] and runs one [`ChatSession`] per connection.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::HeaderMap,
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth::Auth;
use crate::core::session::{
    ChatRequest, ChatResponse, ChatSession, ClientSink, ClientSource, RequestContext, SessionError,
};
use crate::handlers::request_language;
use crate::middleware::ClientIp;
use crate::state::AppState;

use super::messages::{ChatMessageRoute, ChatOutgoingMessage, parse_client_message};

/// Channel buffer between the session and the socket writer
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// How long the writer may take to flush the final frames
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Releases the connection slot taken by the connection limit middleware.
///
/// Moved into the upgrade callback, so a failed upgrade releases it too.
struct ConnectionSlot {
    state: Arc<AppState>,
    ip: Option<IpAddr>,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        if let Some(ip) = self.ip {
            self.state.release_connection(ip);
            debug!(ip = %ip, "Connection slot released");
        }
    }
}

/// Chat WebSocket handler
///
/// Upgrades `GET /chat` to a WebSocket and relays audio between the client and
/// the configured realtime provider.
pub async fn chat_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
    client_ip: Option<Extension<ClientIp>>,
    headers: HeaderMap,
) -> Response {
    let language = request_language(&headers);
    info!(
        auth_id = ?auth.id,
        language = %language,
        "Chat WebSocket connection upgrade requested"
    );

    let slot = ConnectionSlot {
        state: state.clone(),
        ip: client_ip.map(|Extension(ClientIp(ip))| ip),
    };

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_chat_socket(socket, state, auth, language, slot))
}

async fn handle_chat_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    auth: Auth,
    language: String,
    _slot: ConnectionSlot,
) {
    let ctx = RequestContext::new(auth.user_id(), language);
    let session_id = ctx.session_id.clone();
    info!(session_id = %session_id, auth_id = ?auth.id, "Chat WebSocket connection established");

    let (sender, receiver) = socket.split();
    let (message_tx, message_rx) = mpsc::channel::<ChatMessageRoute>(CHANNEL_BUFFER_SIZE);
    let cancel = CancellationToken::new();

    let mut writer = tokio::spawn(run_writer(sender, message_rx, cancel.clone()));

    let source = WsClientSource {
        receiver,
        replies: message_tx.clone(),
    };
    let sink = ChannelSink {
        tx: message_tx.clone(),
    };

    let session = ChatSession::new(
        ctx,
        Box::new(source),
        Arc::new(sink),
        state.services.clone(),
        cancel,
    );
    let result = session.run().await;

    // A client that stopped reading can leave the channel full; the trailing
    // frames share the drain deadline with the writer.
    let drained = tokio::time::timeout(WRITER_DRAIN_TIMEOUT, async {
        if let Err(e) = &result
            && !matches!(e, SessionError::Cancelled)
        {
            let _ = message_tx
                .send(ChatMessageRoute::Outgoing(ChatOutgoingMessage::error(
                    e.code(),
                    e.to_string(),
                )))
                .await;
        }
        let _ = message_tx.send(ChatMessageRoute::Close).await;
        drop(message_tx);
        (&mut writer).await
    })
    .await;

    if drained.is_err() {
        warn!(session_id = %session_id, "Timed out flushing the chat WebSocket");
        writer.abort();
    }

    info!(session_id = %session_id, "Chat WebSocket connection terminated");
}

/// Write routed messages to the socket until `Close` or a write failure.
///
/// A write failure means the client is gone, so the session is cancelled.
async fn run_writer(
    mut sender: SplitSink<WebSocket, Message>,
    mut message_rx: mpsc::Receiver<ChatMessageRoute>,
    cancel: CancellationToken,
) {
    while let Some(route) = message_rx.recv().await {
        let should_close = matches!(route, ChatMessageRoute::Close);

        let result = match route {
            ChatMessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                Err(e) => {
                    error!("Failed to serialize outgoing message: {}", e);
                    continue;
                }
            },
            ChatMessageRoute::Audio(data) => sender.send(Message::Binary(data)).await,
            ChatMessageRoute::Close => {
                debug!("Closing chat WebSocket connection");
                sender.send(Message::Close(None)).await
            }
        };

        if let Err(e) = result {
            debug!("Failed to send WebSocket message: {}", e);
            cancel.cancel();
            break;
        }

        if should_close {
            break;
        }
    }
}

/// Client messages read from the WebSocket.
struct WsClientSource {
    receiver: SplitStream<WebSocket>,
    /// Used to answer rejected frames with an `error` message
    replies: mpsc::Sender<ChatMessageRoute>,
}

#[async_trait]
impl ClientSource for WsClientSource {
    async fn receive(&mut self) -> Result<Option<ChatRequest>, SessionError> {
        loop {
            let message = match self.receiver.next().await {
                None => return Ok(None),
                Some(Err(e)) => return Err(SessionError::ClientTransport(e.to_string())),
                Some(Ok(message)) => message,
            };

            match message {
                Message::Binary(data) => return Ok(Some(ChatRequest::Audio(data))),
                Message::Text(text) => match parse_client_message(text.as_str()) {
                    Ok(request) => return Ok(Some(request)),
                    Err(e) => {
                        warn!("Rejected client message: {}", e);
                        self.replies
                            .send(ChatMessageRoute::Outgoing(ChatOutgoingMessage::error(
                                e.code(),
                                e.to_string(),
                            )))
                            .await
                            .map_err(|_| {
                                SessionError::ClientTransport("client writer closed".to_string())
                            })?;
                    }
                },
                Message::Close(_) => {
                    debug!("Chat WebSocket close received");
                    return Ok(None);
                }
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    }
}

/// Session output queued for the socket writer.
struct ChannelSink {
    tx: mpsc::Sender<ChatMessageRoute>,
}

#[async_trait]
impl ClientSink for ChannelSink {
    async fn send(&self, response: ChatResponse) -> Result<(), SessionError> {
        self.tx
            .send(ChatMessageRoute::from(response))
            .await
            .map_err(|_| SessionError::ClientTransport("client writer closed".to_string()))
    }
}
