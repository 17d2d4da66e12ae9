//! OpenAI Realtime API upstream.
//!
//! Audio goes up as `input_audio_buffer.append` events and comes back as
//! `response.audio.delta` events, both `pcm16`. Turn taking is left to the
//! server-side VAD.

mod client;
mod config;
pub mod messages;

pub use client::{OpenAIRealtimeConnector, OpenAIRealtimeSession};
pub use config::{
    DEFAULT_OPENAI_REALTIME_MODEL, DEFAULT_OPENAI_REALTIME_VOICE, OPENAI_OUTPUT_AUDIO_MIME,
    OPENAI_REALTIME_SAMPLE_RATE, OPENAI_REALTIME_URL, OpenAIRealtimeConfig,
};
