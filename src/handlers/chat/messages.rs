//! Chat WebSocket message types
//!
//! Text frames carry JSON tagged by `type`; binary frames carry raw PCM audio
//! in both directions.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::session::{ChatRequest, ChatResponse, SeedRequest};

/// Maximum allowed size for inline recipe text (100 KB)
pub const MAX_RECIPE_TEXT_SIZE: usize = 100 * 1024;

/// Maximum allowed size for recipe and plan ids
pub const MAX_ID_SIZE: usize = 256;

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

/// Incoming JSON messages from the client
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatIncomingMessage {
    /// Seed context for the session
    Start {
        #[serde(default)]
        recipe_text: Option<String>,
        #[serde(default)]
        recipe_id: Option<String>,
        #[serde(default)]
        plan_id: Option<String>,
    },

    /// Audio chunk as base64 PCM
    Audio { data: String },

    KeepAlive,
}

/// Errors for client messages that are rejected without ending the session
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatMessageError {
    #[error("Invalid message format: {0}")]
    Parse(String),

    #[error("Recipe text too large: {size} bytes (max {max})")]
    RecipeTextTooLarge { size: usize, max: usize },

    #[error("{field} too large: {size} bytes (max {max})")]
    IdTooLarge {
        field: &'static str,
        size: usize,
        max: usize,
    },

    #[error("Invalid audio payload: {0}")]
    InvalidAudio(String),
}

impl ChatMessageError {
    /// Code sent to the client in the `error` frame.
    pub fn code(&self) -> &'static str {
        match self {
            ChatMessageError::Parse(_) => "parse_error",
            ChatMessageError::RecipeTextTooLarge { .. } | ChatMessageError::IdTooLarge { .. } => {
                "validation_error"
            }
            ChatMessageError::InvalidAudio(_) => "audio_error",
        }
    }
}

fn check_id(field: &'static str, id: &Option<String>) -> Result<(), ChatMessageError> {
    match id {
        Some(id) if id.len() > MAX_ID_SIZE => Err(ChatMessageError::IdTooLarge {
            field,
            size: id.len(),
            max: MAX_ID_SIZE,
        }),
        _ => Ok(()),
    }
}

impl ChatIncomingMessage {
    /// Validate message size limits to prevent memory exhaustion
    pub fn validate_size(&self) -> Result<(), ChatMessageError> {
        match self {
            ChatIncomingMessage::Start {
                recipe_text,
                recipe_id,
                plan_id,
            } => {
                if let Some(text) = recipe_text
                    && text.len() > MAX_RECIPE_TEXT_SIZE
                {
                    return Err(ChatMessageError::RecipeTextTooLarge {
                        size: text.len(),
                        max: MAX_RECIPE_TEXT_SIZE,
                    });
                }
                check_id("recipe_id", recipe_id)?;
                check_id("plan_id", plan_id)
            }
            ChatIncomingMessage::Audio { .. } | ChatIncomingMessage::KeepAlive => Ok(()),
        }
    }

    /// Convert into a session request, decoding inline audio.
    pub fn into_request(self) -> Result<ChatRequest, ChatMessageError> {
        match self {
            ChatIncomingMessage::Start {
                recipe_text,
                recipe_id,
                plan_id,
            } => Ok(ChatRequest::Start(SeedRequest {
                recipe_text,
                recipe_id,
                plan_id,
            })),
            ChatIncomingMessage::Audio { data } => BASE64
                .decode(data.as_bytes())
                .map(|pcm| ChatRequest::Audio(Bytes::from(pcm)))
                .map_err(|e| ChatMessageError::InvalidAudio(e.to_string())),
            ChatIncomingMessage::KeepAlive => Ok(ChatRequest::KeepAlive),
        }
    }
}

/// Parse and validate a text frame.
pub fn parse_client_message(text: &str) -> Result<ChatRequest, ChatMessageError> {
    let message: ChatIncomingMessage =
        serde_json::from_str(text).map_err(|e| ChatMessageError::Parse(e.to_string()))?;
    message.validate_size()?;
    message.into_request()
}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

/// Outgoing JSON messages to the client
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatOutgoingMessage {
    NavigateToStep {
        step: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        group: Option<u32>,
    },

    NavigateToIngredients,

    /// Error message; sent before closing when a session fails, or for a
    /// rejected frame
    Error { code: String, message: String },
}

impl ChatOutgoingMessage {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ChatOutgoingMessage::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Work item for the socket writer task
#[derive(Debug)]
pub enum ChatMessageRoute {
    Outgoing(ChatOutgoingMessage),
    Audio(Bytes),
    Close,
}

impl From<ChatResponse> for ChatMessageRoute {
    fn from(response: ChatResponse) -> Self {
        match response {
            ChatResponse::Audio(data) => ChatMessageRoute::Audio(data),
            ChatResponse::NavigateToStep { step, group } => {
                ChatMessageRoute::Outgoing(ChatOutgoingMessage::NavigateToStep { step, group })
            }
            ChatResponse::NavigateToIngredients => {
                ChatMessageRoute::Outgoing(ChatOutgoingMessage::NavigateToIngredients)
            }
        }
    }
}
