//! Client-facing message types and the transport seams.

use async_trait::async_trait;
use bytes::Bytes;

use super::SessionError;

/// Reference to the context that seeds the model's instruction.
///
/// At most one source is consulted, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedRequest {
    pub recipe_text: Option<String>,
    pub recipe_id: Option<String>,
    pub plan_id: Option<String>,
}

impl SeedRequest {
    pub fn recipe_text(text: impl Into<String>) -> Self {
        Self {
            recipe_text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn recipe_id(id: impl Into<String>) -> Self {
        Self {
            recipe_id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn plan_id(id: impl Into<String>) -> Self {
        Self {
            plan_id: Some(id.into()),
            ..Default::default()
        }
    }
}

/// A message received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatRequest {
    /// Seed context for the session
    Start(SeedRequest),
    /// PCM audio chunk
    Audio(Bytes),
    /// Liveness ping, carries nothing
    KeepAlive,
}

/// A message sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatResponse {
    /// PCM audio chunk from the model
    Audio(Bytes),
    /// Move the UI to a step (`group` is set for plan sessions)
    NavigateToStep { step: u32, group: Option<u32> },
    /// Move the UI to the ingredient list
    NavigateToIngredients,
}

/// Receiving half of the client transport.
#[async_trait]
pub trait ClientSource: Send {
    /// Next client message; `Ok(None)` once the client has ended the stream.
    async fn receive(&mut self) -> Result<Option<ChatRequest>, SessionError>;
}

/// Sending half of the client transport.
#[async_trait]
pub trait ClientSink: Send + Sync {
    async fn send(&self, response: ChatResponse) -> Result<(), SessionError>;
}
