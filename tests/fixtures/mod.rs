//! Test Fixtures Module
//!
//! In-process doubles for the session seams:
//! - `ChannelSource` / `RecordingSink` stand in for the client WebSocket
//! - `FailingSink` / `StalledSink` model a dropped or non-reading client
//! - `MockUpstream` / `MockConnector` stand in for a realtime provider
//! - `test_catalog` provides a small recipe and plan catalog

// Not every test binary uses every fixture
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use cookchat_gateway::core::catalog::InMemoryCatalog;
use cookchat_gateway::core::realtime::{
    FunctionCall, RealtimeError, RealtimeResult, SessionSetup, SharedUpstream,
    UpstreamConnection, UpstreamConnector, UpstreamEvent,
};
use cookchat_gateway::core::session::{
    ChatRequest, ChatResponse, ClientSink, ClientSource, SeedResolver, SessionError,
    SessionServices,
};

pub const CATALOG_JSON: &str = r#"{
    "recipes": [
        {
            "id": "nikujaga",
            "languageCode": "ja",
            "imageUrl": "https://cdn.example.com/nikujaga.jpg",
            "content": {
                "title": "肉じゃが",
                "ingredients": [{"name": "じゃがいも", "quantity": "3個"}],
                "steps": [{"description": "じゃがいもを切る"}, {"description": "煮る"}]
            },
            "localizedContent": {
                "en": {
                    "title": "Nikujaga",
                    "ingredients": [{"name": "Potato", "quantity": "3"}],
                    "steps": [{"description": "Cut the potatoes"}, {"description": "Simmer"}]
                }
            }
        },
        {"id": "miso-soup", "languageCode": "en", "content": {"title": "Miso soup"}}
    ],
    "plans": {
        "user-1": {
            "2025-03-14": {
                "recipes": ["nikujaga", "miso-soup"],
                "stepGroups": [{"label": "Prep", "steps": [{"description": "Wash rice"}]}]
            }
        }
    }
}"#;

pub fn test_catalog() -> Arc<InMemoryCatalog> {
    Arc::new(InMemoryCatalog::from_json(CATALOG_JSON).expect("test catalog must parse"))
}

/// Wait until `condition` holds, polling every few milliseconds.
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

// =============================================================================
// Client side
// =============================================================================

/// Client source fed by the test through an unbounded channel.
///
/// Dropping the sender ends the stream (`Ok(None)`).
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<Result<ChatRequest, SessionError>>,
}

pub type ClientFeed = mpsc::UnboundedSender<Result<ChatRequest, SessionError>>;

impl ChannelSource {
    pub fn new() -> (Self, ClientFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, tx)
    }

    /// A source that yields `messages` and then ends the stream.
    pub fn scripted(messages: Vec<ChatRequest>) -> Self {
        let (source, feed) = Self::new();
        for message in messages {
            let _ = feed.send(Ok(message));
        }
        source
    }
}

#[async_trait]
impl ClientSource for ChannelSource {
    async fn receive(&mut self) -> Result<Option<ChatRequest>, SessionError> {
        match self.rx.recv().await {
            Some(Ok(message)) => Ok(Some(message)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

/// Client sink that records every response, in order.
pub struct RecordingSink {
    tx: mpsc::UnboundedSender<ChatResponse>,
    sent: Mutex<Vec<ChatResponse>>,
}

impl RecordingSink {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ChatResponse>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                tx,
                sent: Mutex::new(Vec::new()),
            }),
            rx,
        )
    }

    pub fn sent(&self) -> Vec<ChatResponse> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl ClientSink for RecordingSink {
    async fn send(&self, response: ChatResponse) -> Result<(), SessionError> {
        self.sent.lock().push(response.clone());
        let _ = self.tx.send(response);
        Ok(())
    }
}

/// Client sink whose every send fails, as if the socket writer had gone away.
pub struct FailingSink;

#[async_trait]
impl ClientSink for FailingSink {
    async fn send(&self, _response: ChatResponse) -> Result<(), SessionError> {
        Err(SessionError::ClientTransport("client writer closed".to_string()))
    }
}

/// Client sink that never completes a send, like a client that stopped
/// reading with a full write buffer.
pub struct StalledSink {
    attempts: AtomicUsize,
}

impl StalledSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientSink for StalledSink {
    async fn send(&self, _response: ChatResponse) -> Result<(), SessionError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

// =============================================================================
// Upstream side
// =============================================================================

pub type UpstreamFeed = mpsc::UnboundedSender<RealtimeResult<UpstreamEvent>>;

/// Scripted upstream connection recording everything the session sends.
pub struct MockUpstream {
    events: tokio::sync::Mutex<mpsc::UnboundedReceiver<RealtimeResult<UpstreamEvent>>>,
    closed: CancellationToken,
    close_count: AtomicUsize,
    fail_audio: AtomicBool,
    fail_text: AtomicBool,
    audio: Mutex<Vec<Bytes>>,
    texts: Mutex<Vec<String>>,
    tool_acks: Mutex<Vec<String>>,
}

impl MockUpstream {
    pub fn new() -> (Arc<Self>, UpstreamFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                events: tokio::sync::Mutex::new(rx),
                closed: CancellationToken::new(),
                close_count: AtomicUsize::new(0),
                fail_audio: AtomicBool::new(false),
                fail_text: AtomicBool::new(false),
                audio: Mutex::new(Vec::new()),
                texts: Mutex::new(Vec::new()),
                tool_acks: Mutex::new(Vec::new()),
            }),
            tx,
        )
    }

    /// Make every later `send_audio` fail with a WebSocket error.
    pub fn fail_audio_sends(&self) {
        self.fail_audio.store(true, Ordering::SeqCst);
    }

    /// Make every later `send_text` fail with a WebSocket error.
    pub fn fail_text_sends(&self) {
        self.fail_text.store(true, Ordering::SeqCst);
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    pub fn audio(&self) -> Vec<Bytes> {
        self.audio.lock().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().clone()
    }

    pub fn tool_acks(&self) -> Vec<String> {
        self.tool_acks.lock().clone()
    }
}

#[async_trait]
impl UpstreamConnection for MockUpstream {
    async fn send_audio(&self, audio: Bytes) -> RealtimeResult<()> {
        if self.closed.is_cancelled() {
            return Err(RealtimeError::NotConnected);
        }
        if self.fail_audio.load(Ordering::SeqCst) {
            return Err(RealtimeError::WebSocketError("broken pipe".to_string()));
        }
        self.audio.lock().push(audio);
        Ok(())
    }

    async fn send_text(&self, text: &str) -> RealtimeResult<()> {
        if self.fail_text.load(Ordering::SeqCst) {
            return Err(RealtimeError::WebSocketError("broken pipe".to_string()));
        }
        self.texts.lock().push(text.to_string());
        Ok(())
    }

    async fn receive(&self) -> RealtimeResult<UpstreamEvent> {
        let mut events = self.events.lock().await;
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(RealtimeError::NotConnected),
            event = events.recv() => match event {
                Some(event) => event,
                // Script exhausted; stay open until closed
                None => {
                    self.closed.cancelled().await;
                    Err(RealtimeError::NotConnected)
                }
            },
        }
    }

    async fn send_tool_response(&self, call: &FunctionCall) -> RealtimeResult<()> {
        self.tool_acks.lock().push(call.name.clone());
        Ok(())
    }

    async fn close(&self) -> RealtimeResult<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        self.closed.cancel();
        Ok(())
    }
}

/// Connector handing out one `MockUpstream`, or failing every open.
pub struct MockConnector {
    upstream: Option<Arc<MockUpstream>>,
    open_delay: Duration,
    open_count: AtomicUsize,
    setups: Mutex<Vec<SessionSetup>>,
}

impl MockConnector {
    pub fn new(upstream: Arc<MockUpstream>) -> Arc<Self> {
        Arc::new(Self {
            upstream: Some(upstream),
            open_delay: Duration::ZERO,
            open_count: AtomicUsize::new(0),
            setups: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            upstream: None,
            open_delay: Duration::ZERO,
            open_count: AtomicUsize::new(0),
            setups: Mutex::new(Vec::new()),
        })
    }

    pub fn slow(upstream: Arc<MockUpstream>, open_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            upstream: Some(upstream),
            open_delay,
            open_count: AtomicUsize::new(0),
            setups: Mutex::new(Vec::new()),
        })
    }

    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    pub fn setups(&self) -> Vec<SessionSetup> {
        self.setups.lock().clone()
    }
}

#[async_trait]
impl UpstreamConnector for MockConnector {
    async fn open(&self, setup: SessionSetup) -> RealtimeResult<SharedUpstream> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        self.setups.lock().push(setup);
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        match &self.upstream {
            Some(upstream) => Ok(upstream.clone()),
            None => Err(RealtimeError::ConnectionFailed(
                "mock provider refused the connection".to_string(),
            )),
        }
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

pub fn services(connector: Arc<MockConnector>, relay_tool_calls: bool) -> SessionServices {
    SessionServices {
        connector,
        resolver: Arc::new(SeedResolver::new(test_catalog())),
        relay_tool_calls,
    }
}
