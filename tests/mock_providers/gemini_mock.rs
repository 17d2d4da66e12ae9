//! Gemini Live Mock Server
//!
//! Accepts the BidiGenerateContent handshake, echoes every `realtimeInput`
//! audio chunk back as model audio and records what the client sent.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::prelude::*;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// How the mock answers the `setup` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetupBehavior {
    /// Reply with `setupComplete`
    #[default]
    Complete,
    /// Never reply
    Stall,
    /// Close the socket with a policy violation
    Reject,
}

/// What the mock saw, shared with the test.
#[derive(Debug, Default)]
pub struct GeminiMockState {
    pub setup_behavior: SetupBehavior,
    /// Issue a `navigate_to_step` tool call after the priming turn
    pub tool_call_after_greeting: bool,
    pub connection_count: AtomicUsize,
    pub close_count: AtomicUsize,
    pub query_keys: Mutex<Vec<String>>,
    pub setups: Mutex<Vec<Value>>,
    pub user_texts: Mutex<Vec<String>>,
    pub audio_chunks: Mutex<Vec<Vec<u8>>>,
    pub tool_responses: Mutex<Vec<Value>>,
}

impl GeminiMockState {
    pub fn new(setup_behavior: SetupBehavior) -> Self {
        Self {
            setup_behavior,
            ..Default::default()
        }
    }

    pub fn with_tool_call() -> Self {
        Self {
            tool_call_after_greeting: true,
            ..Default::default()
        }
    }

    pub fn closes(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }
}

/// A running mock server.
pub struct GeminiMockServer {
    pub addr: SocketAddr,
    pub state: Arc<GeminiMockState>,
}

impl GeminiMockServer {
    /// Bind to an ephemeral port and serve connections in the background.
    pub async fn start(state: GeminiMockState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        let state = Arc::new(state);

        let server_state = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = server_state.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, state).await {
                        eprintln!("Gemini mock connection error: {}", e);
                    }
                });
            }
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws/BidiGenerateContent", self.addr)
    }
}

fn audio_frame(data: &[u8]) -> Message {
    let frame = json!({
        "serverContent": {
            "modelTurn": {
                "parts": [{
                    "inlineData": {
                        "mimeType": "audio/pcm;rate=24000",
                        "data": BASE64_STANDARD.encode(data)
                    }
                }]
            }
        }
    });
    Message::Text(frame.to_string().into())
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<GeminiMockState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let handshake_state = state.clone();
    let ws_stream = accept_hdr_async(stream, move |request: &Request, response: Response| {
        let key = request
            .uri()
            .query()
            .and_then(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .find(|(k, _)| k == "key")
                    .map(|(_, v)| v.into_owned())
            })
            .unwrap_or_default();
        handshake_state.query_keys.lock().push(key);
        Ok(response)
    })
    .await?;
    let (mut write, mut read) = ws_stream.split();
    state.connection_count.fetch_add(1, Ordering::SeqCst);

    while let Some(msg) = read.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Binary(data)) => String::from_utf8_lossy(&data).into_owned(),
            Ok(Message::Close(_)) => {
                state.close_count.fetch_add(1, Ordering::SeqCst);
                break;
            }
            Ok(Message::Ping(data)) => {
                write.send(Message::Pong(data)).await?;
                continue;
            }
            Ok(_) => continue,
            Err(_) => break,
        };

        let Ok(frame) = serde_json::from_str::<Value>(&text) else {
            continue;
        };

        if let Some(setup) = frame.get("setup") {
            state.setups.lock().push(setup.clone());
            match state.setup_behavior {
                SetupBehavior::Complete => {
                    write
                        .send(Message::Text(json!({"setupComplete": {}}).to_string().into()))
                        .await?;
                }
                SetupBehavior::Stall => {}
                SetupBehavior::Reject => {
                    write
                        .send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Policy,
                            reason: "API key not valid".into(),
                        })))
                        .await?;
                    break;
                }
            }
        } else if let Some(content) = frame.get("clientContent") {
            let text = content["turns"][0]["parts"][0]["text"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            state.user_texts.lock().push(text);
            if state.tool_call_after_greeting {
                let call = json!({
                    "toolCall": {
                        "functionCalls": [{
                            "id": "call-1",
                            "name": "navigate_to_step",
                            "args": {"step": 1}
                        }]
                    }
                });
                write.send(Message::Text(call.to_string().into())).await?;
            }
        } else if let Some(input) = frame.get("realtimeInput") {
            let data = input["audio"]["data"].as_str().unwrap_or_default();
            let pcm = BASE64_STANDARD.decode(data)?;
            state.audio_chunks.lock().push(pcm.clone());
            write.send(audio_frame(&pcm)).await?;
        } else if let Some(response) = frame.get("toolResponse") {
            state.tool_responses.lock().push(response.clone());
        }
    }

    Ok(())
}
