//! OpenAI Realtime API WebSocket message types.
//!
//! Only the events the relay produces or consumes are modeled. Every other
//! server event deserializes to [`ServerEvent::Other`] and is ignored.
//!
//! Client events (sent to server):
//! - session.update
//! - input_audio_buffer.append
//! - conversation.item.create
//! - response.create
//!
//! Server events (consumed):
//! - session.updated
//! - response.output_item.added
//! - response.audio.delta
//! - response.function_call_arguments.done
//! - error

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::realtime::base::FunctionDefinition;

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration sent with `session.update`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionConfig {
    pub modalities: Vec<String>,
    pub instructions: String,
    pub voice: String,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub turn_detection: TurnDetection,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
}

/// Turn detection configuration.
#[derive(Debug, Clone, Serialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub detection_type: String,
}

impl TurnDetection {
    pub fn server_vad() -> Self {
        Self {
            detection_type: "server_vad".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

impl From<&FunctionDefinition> for ToolDef {
    fn from(def: &FunctionDefinition) -> Self {
        Self {
            tool_type: "function".to_string(),
            name: def.name.clone(),
            description: def.description.clone(),
            parameters: def.parameters.clone(),
        }
    }
}

// =============================================================================
// Conversation Items
// =============================================================================

/// Conversation item created by the client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationItem {
    /// A user message
    Message {
        role: String,
        content: Vec<ContentPart>,
    },
    /// Output of a function call handled by the client
    FunctionCallOutput { call_id: String, output: String },
}

/// Content part within a message item.
#[derive(Debug, Clone, Serialize)]
pub struct ContentPart {
    /// Content type (`input_text`)
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

// =============================================================================
// Client Events (sent to server)
// =============================================================================

/// Client events sent to the OpenAI Realtime API.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    /// Append base64 audio to the input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    /// Ask the model to respond
    #[serde(rename = "response.create")]
    ResponseCreate,
}

impl ClientEvent {
    /// Create an audio append event from raw bytes.
    pub fn audio_append(data: &[u8]) -> Self {
        ClientEvent::InputAudioBufferAppend {
            audio: BASE64_STANDARD.encode(data),
        }
    }

    /// A complete user text message.
    pub fn user_text(text: &str) -> Self {
        ClientEvent::ConversationItemCreate {
            item: ConversationItem::Message {
                role: "user".to_string(),
                content: vec![ContentPart {
                    content_type: "input_text".to_string(),
                    text: text.to_string(),
                }],
            },
        }
    }

    /// Acknowledge a function call with an `ok` result.
    pub fn function_output(call_id: &str) -> Self {
        ClientEvent::ConversationItemCreate {
            item: ConversationItem::FunctionCallOutput {
                call_id: call_id.to_string(),
                output: r#"{"result":"ok"}"#.to_string(),
            },
        }
    }
}

// =============================================================================
// Server Events (received from server)
// =============================================================================

/// Server events received from the OpenAI Realtime API.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "error")]
    Error { error: ApiError },

    #[serde(rename = "session.updated")]
    SessionUpdated,

    /// Announces an output item; function call items carry their name here
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded { item: OutputItem },

    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        #[serde(default)]
        item_id: String,
        /// Base64-encoded audio delta
        delta: String,
    },

    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        #[serde(default)]
        item_id: String,
        call_id: String,
        #[serde(default)]
        name: Option<String>,
        /// Full JSON arguments
        arguments: String,
    },

    /// Any event the relay does not act on
    #[serde(other)]
    Other,
}

impl ServerEvent {
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// Decode base64 audio from an AudioDelta event.
    pub fn decode_audio_delta(delta: &str) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_STANDARD.decode(delta)
    }
}

/// Output item announced by `response.output_item.added`.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputItem {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// API error information.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({}): {}", self.error_type, code, self.message),
            None => write!(f, "{}: {}", self.error_type, self.message),
        }
    }
}
