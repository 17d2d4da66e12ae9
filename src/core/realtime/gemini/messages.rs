//! Gemini Live API message types.
//!
//! Every frame is a JSON object with exactly one top-level key naming the
//! message kind (`setup`, `clientContent`, `realtimeInput`, `toolResponse` from
//! the client; `setupComplete`, `serverContent`, `toolCall`, `goAway` from the
//! server). Server frames may arrive as either text or binary WebSocket frames.

use base64::prelude::*;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::core::realtime::base::{
    FunctionCall, FunctionDefinition, RealtimeError, RealtimeResult, UpstreamEvent, UpstreamPart,
};

// =============================================================================
// Client Messages
// =============================================================================

/// Messages sent to the Gemini Live API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    ClientContent(ClientContent),
    RealtimeInput(RealtimeInput),
    ToolResponse(ToolResponse),
}

impl ClientMessage {
    /// A complete user text turn.
    pub fn user_text(text: &str) -> Self {
        ClientMessage::ClientContent(ClientContent {
            turns: vec![Content {
                role: Some("user".to_string()),
                parts: vec![TextPart {
                    text: text.to_string(),
                }],
            }],
            turn_complete: true,
        })
    }

    /// A realtime audio chunk.
    pub fn audio(mime_type: &str, data: &[u8]) -> Self {
        ClientMessage::RealtimeInput(RealtimeInput {
            audio: Blob {
                mime_type: mime_type.to_string(),
                data: BASE64_STANDARD.encode(data),
            },
        })
    }

    /// Acknowledge a function call.
    pub fn tool_ack(call: &FunctionCall) -> Self {
        ClientMessage::ToolResponse(ToolResponse {
            function_responses: vec![FunctionResponse {
                id: call.id.clone(),
                name: call.name.clone(),
                response: serde_json::json!({ "result": "ok" }),
            }],
        })
    }
}

/// Session setup, the first frame of every connection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub language_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_config: Option<VoiceConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behavior: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

impl From<&FunctionDefinition> for FunctionDeclaration {
    fn from(def: &FunctionDefinition) -> Self {
        Self {
            name: def.name.clone(),
            description: def.description.clone(),
            behavior: def.non_blocking.then(|| "NON_BLOCKING".to_string()),
            parameters: def.parameters.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RealtimeInput {
    pub audio: Blob,
}

/// Base64 encoded binary payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: serde_json::Value,
}

// =============================================================================
// Server Messages
// =============================================================================

/// Messages received from the Gemini Live API.
///
/// Unknown keys (usage metadata, session resumption updates, ...) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerMessage {
    pub setup_complete: Option<serde_json::Value>,
    pub server_content: Option<ServerContent>,
    pub tool_call: Option<ToolCall>,
    pub go_away: Option<GoAway>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerContent {
    pub model_turn: Option<ModelTurn>,
    pub turn_complete: Option<bool>,
    pub interrupted: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelTurn {
    pub parts: Vec<ServerPart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerPart {
    pub text: Option<String>,
    pub inline_data: Option<Blob>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolCall {
    pub function_calls: Vec<ServerFunctionCall>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerFunctionCall {
    pub id: Option<String>,
    pub name: String,
    pub args: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoAway {
    pub time_left: Option<String>,
}

impl ServerMessage {
    /// Parse a text or binary frame payload.
    pub fn parse(payload: &[u8]) -> RealtimeResult<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| RealtimeError::SerializationError(e.to_string()))
    }

    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }

    /// Flatten model turn parts and tool calls into an upstream event.
    ///
    /// Inline data that is not valid base64 is dropped with a warning.
    pub fn into_event(self) -> UpstreamEvent {
        let mut parts = Vec::new();

        if let Some(turn) = self.server_content.and_then(|c| c.model_turn) {
            for part in turn.parts {
                if let Some(blob) = part.inline_data {
                    match BASE64_STANDARD.decode(blob.data.as_bytes()) {
                        Ok(data) => parts.push(UpstreamPart::InlineData {
                            mime_type: blob.mime_type,
                            data: Bytes::from(data),
                        }),
                        Err(e) => {
                            tracing::warn!(mime_type = %blob.mime_type, "Failed to decode inline data: {}", e);
                        }
                    }
                } else if let Some(text) = part.text {
                    parts.push(UpstreamPart::Text(text));
                }
            }
        }

        if let Some(call) = self.tool_call {
            parts.extend(call.function_calls.into_iter().map(|f| {
                UpstreamPart::FunctionCall(FunctionCall {
                    id: f.id,
                    name: f.name,
                    args: f.args.unwrap_or(serde_json::Value::Null),
                })
            }));
        }

        UpstreamEvent::new(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_setup_serialization() {
        let setup = ClientMessage::Setup(Setup {
            model: "models/gemini-live".to_string(),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: Some(SpeechConfig {
                    language_code: "ja-JP".to_string(),
                    voice_config: Some(VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: "Leda".to_string(),
                        },
                    }),
                }),
            },
            system_instruction: Some(Content {
                role: Some("model".to_string()),
                parts: vec![TextPart {
                    text: "Be a cook".to_string(),
                }],
            }),
            tools: vec![Tool {
                function_declarations: vec![FunctionDeclaration::from(&FunctionDefinition {
                    name: "navigate_to_step".to_string(),
                    description: Some("Go".to_string()),
                    parameters: Some(json!({"type": "object"})),
                    non_blocking: true,
                })],
            }],
        });

        let value = serde_json::to_value(&setup).unwrap();
        let setup = &value["setup"];
        assert_eq!(setup["model"], "models/gemini-live");
        assert_eq!(setup["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            setup["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Leda"
        );
        assert_eq!(setup["systemInstruction"]["parts"][0]["text"], "Be a cook");
        assert_eq!(
            setup["tools"][0]["functionDeclarations"][0]["behavior"],
            "NON_BLOCKING"
        );
    }

    #[test]
    fn test_user_text_serialization() {
        let value = serde_json::to_value(ClientMessage::user_text("Hello!")).unwrap();
        assert_eq!(value["clientContent"]["turnComplete"], true);
        assert_eq!(value["clientContent"]["turns"][0]["role"], "user");
        assert_eq!(value["clientContent"]["turns"][0]["parts"][0]["text"], "Hello!");
    }

    #[test]
    fn test_audio_is_base64_encoded() {
        let value = serde_json::to_value(ClientMessage::audio("audio/pcm", &[1, 2, 3])).unwrap();
        assert_eq!(value["realtimeInput"]["audio"]["mimeType"], "audio/pcm");
        assert_eq!(value["realtimeInput"]["audio"]["data"], "AQID");
    }

    #[test]
    fn test_server_content_into_event() {
        let frame = json!({
            "serverContent": {
                "modelTurn": {
                    "parts": [
                        {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AQID"}},
                        {"text": "thinking"},
                        {"inlineData": {"mimeType": "audio/pcm", "data": "not base64!"}}
                    ]
                }
            }
        })
        .to_string();

        let event = ServerMessage::parse(frame.as_bytes()).unwrap().into_event();
        assert_eq!(event.parts.len(), 2);
        assert_eq!(
            event.parts[0],
            UpstreamPart::InlineData {
                mime_type: "audio/pcm;rate=24000".to_string(),
                data: Bytes::from_static(&[1, 2, 3]),
            }
        );
        assert_eq!(event.parts[1], UpstreamPart::Text("thinking".to_string()));
    }

    #[test]
    fn test_tool_call_into_event() {
        let frame = br#"{"toolCall":{"functionCalls":[{"id":"c1","name":"navigate_to_step","args":{"step":2}}]}}"#;
        let event = ServerMessage::parse(frame).unwrap().into_event();
        assert_eq!(
            event.parts,
            vec![UpstreamPart::FunctionCall(FunctionCall {
                id: Some("c1".to_string()),
                name: "navigate_to_step".to_string(),
                args: json!({"step": 2}),
            })]
        );
    }

    #[test]
    fn test_setup_complete_and_unknown_keys() {
        let msg = ServerMessage::parse(br#"{"setupComplete":{}}"#).unwrap();
        assert!(msg.is_setup_complete());

        let msg = ServerMessage::parse(br#"{"usageMetadata":{"totalTokenCount":3}}"#).unwrap();
        assert!(!msg.is_setup_complete());
        assert!(msg.into_event().is_empty());
    }

    #[test]
    fn test_invalid_json_is_serialization_error() {
        assert!(matches!(
            ServerMessage::parse(b"{nope"),
            Err(RealtimeError::SerializationError(_))
        ));
    }
}
