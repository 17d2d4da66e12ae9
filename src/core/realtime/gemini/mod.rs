//! Gemini Live API upstream.
//!
//! Speaks the BidiGenerateContent WebSocket protocol: a `setup` handshake
//! followed by streamed `realtimeInput` audio, with model audio coming back as
//! inline data parts of `serverContent.modelTurn`.

mod client;
mod config;
pub mod messages;

pub use client::{GeminiLiveConnector, GeminiLiveSession};
pub use config::{
    DEFAULT_GEMINI_MODEL, DEFAULT_GEMINI_VOICE, DEFAULT_SETUP_TIMEOUT, GEMINI_INPUT_AUDIO_MIME,
    GEMINI_LIVE_URL, GeminiLiveConfig,
};
