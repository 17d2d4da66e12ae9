//! OpenAI Realtime API configuration types.

use std::time::Duration;

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Default realtime model.
pub const DEFAULT_OPENAI_REALTIME_MODEL: &str = "gpt-realtime-mini";

/// Default realtime voice.
pub const DEFAULT_OPENAI_REALTIME_VOICE: &str = "marin";

/// Output sample rate of `pcm16` audio.
pub const OPENAI_REALTIME_SAMPLE_RATE: u32 = 24000;

/// MIME type attached to audio deltas surfaced as upstream parts.
pub const OPENAI_OUTPUT_AUDIO_MIME: &str = "audio/pcm;rate=24000";

/// Audio format used in both directions.
pub const OPENAI_AUDIO_FORMAT: &str = "pcm16";

/// Connection settings for the OpenAI Realtime provider.
#[derive(Debug, Clone)]
pub struct OpenAIRealtimeConfig {
    /// API key, sent as a bearer token
    pub api_key: String,
    pub model: String,
    pub voice: String,
    /// WebSocket endpoint (overridable for tests and proxies)
    pub endpoint: String,
    /// Maximum wait for `session.updated`
    pub setup_timeout: Duration,
}

impl Default for OpenAIRealtimeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_OPENAI_REALTIME_MODEL.to_string(),
            voice: DEFAULT_OPENAI_REALTIME_VOICE.to_string(),
            endpoint: OPENAI_REALTIME_URL.to_string(),
            setup_timeout: Duration::from_secs(10),
        }
    }
}

impl OpenAIRealtimeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.api_key = api_key.into();
        config
    }
}

impl Drop for OpenAIRealtimeConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.api_key.zeroize();
    }
}
