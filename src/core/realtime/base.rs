//! Base traits and types for realtime upstream connections.
//!
//! A realtime upstream is a bidirectional session with a generative AI backend
//! that accepts streamed audio and answers with streamed audio. The chat relay
//! only depends on the abstractions in this module, so providers can be swapped
//! (or mocked in tests) without touching the session logic.
//!
//! # Supported Providers
//!
//! - Gemini Live API (default)
//! - OpenAI Realtime API
//!
//! # Audio Format
//!
//! Client audio is PCM 16-bit signed little-endian mono. Upstream audio is
//! forwarded untouched; its MIME type always starts with `audio/pcm`.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during realtime operations.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Provider-specific error
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The connection is gone (closed locally or by the server)
    #[error("Not connected")]
    NotConnected,
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Session Setup
// =============================================================================

/// Function definition for tool calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name
    pub name: String,
    /// Function description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema for parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
    /// Whether the model may keep talking while the call is handled
    #[serde(default)]
    pub non_blocking: bool,
}

/// Everything a provider needs to open a session.
#[derive(Debug, Clone, Default)]
pub struct SessionSetup {
    /// System instruction text
    pub instructions: String,
    /// Tool declarations offered to the model
    pub tools: Vec<FunctionDefinition>,
    /// BCP-47 speech locale, e.g. "ja-JP"
    pub language_code: String,
}

// =============================================================================
// Upstream Events
// =============================================================================

/// A function call issued by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// Provider call id, used to acknowledge the call
    pub id: Option<String>,
    /// Function name
    pub name: String,
    /// Parsed JSON arguments (`Null` when absent)
    pub args: serde_json::Value,
}

/// One payload part of an upstream event.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamPart {
    /// Inline binary data, e.g. an audio chunk
    InlineData { mime_type: String, data: Bytes },
    /// Text produced by the model
    Text(String),
    /// Tool invocation
    FunctionCall(FunctionCall),
}

impl UpstreamPart {
    /// Returns the audio payload if this part is PCM audio.
    pub fn pcm_audio(&self) -> Option<&Bytes> {
        match self {
            UpstreamPart::InlineData { mime_type, data } if mime_type.starts_with("audio/pcm") => {
                Some(data)
            }
            _ => None,
        }
    }
}

/// An event received from the upstream, carrying zero or more parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpstreamEvent {
    pub parts: Vec<UpstreamPart>,
}

impl UpstreamEvent {
    pub fn new(parts: Vec<UpstreamPart>) -> Self {
        Self { parts }
    }

    /// Convenience constructor for a single PCM audio chunk.
    pub fn audio(data: impl Into<Bytes>) -> Self {
        Self::new(vec![UpstreamPart::InlineData {
            mime_type: "audio/pcm".to_string(),
            data: data.into(),
        }])
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

// =============================================================================
// Connection State
// =============================================================================

/// Connection state for realtime providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected to the provider
    #[default]
    Disconnected,
    /// Waiting for the provider to acknowledge setup
    Connecting,
    /// Connected and ready
    Connected,
    /// Closed locally or by the provider
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

// =============================================================================
// Base Traits
// =============================================================================

/// An opened realtime session with an upstream provider.
///
/// All methods take `&self` so a single connection can be shared between the
/// task that sends client audio and the task that drains upstream events.
/// `receive` is only ever called from one task at a time.
#[async_trait]
pub trait UpstreamConnection: Send + Sync {
    /// Send a chunk of PCM audio.
    async fn send_audio(&self, audio: Bytes) -> RealtimeResult<()>;

    /// Send a complete user text turn (used to prime the model's first turn).
    async fn send_text(&self, text: &str) -> RealtimeResult<()>;

    /// Wait for the next event. Returns an error once the connection is gone.
    async fn receive(&self) -> RealtimeResult<UpstreamEvent>;

    /// Acknowledge a function call that was handled downstream.
    async fn send_tool_response(&self, _call: &FunctionCall) -> RealtimeResult<()> {
        Ok(())
    }

    /// Close the connection. Pending and future `receive` calls fail afterwards.
    async fn close(&self) -> RealtimeResult<()>;
}

/// Shared handle to an upstream connection.
pub type SharedUpstream = Arc<dyn UpstreamConnection>;

/// Opens upstream connections.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    /// Open a new session. Resolves once the provider is ready for input.
    async fn open(&self, setup: SessionSetup) -> RealtimeResult<SharedUpstream>;

    /// Provider name for logging.
    fn provider_name(&self) -> &'static str;
}
