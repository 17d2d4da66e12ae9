//! Gemini Live API configuration types.

use std::time::Duration;

/// Gemini Live (BidiGenerateContent) WebSocket endpoint.
pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Default native-audio model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-native-audio-preview-12-2025";

/// Default prebuilt voice.
pub const DEFAULT_GEMINI_VOICE: &str = "Leda";

/// MIME type attached to client audio sent upstream.
pub const GEMINI_INPUT_AUDIO_MIME: &str = "audio/pcm;rate=16000";

/// Default time to wait for `setupComplete`.
pub const DEFAULT_SETUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the Gemini Live provider.
#[derive(Debug, Clone)]
pub struct GeminiLiveConfig {
    /// API key, sent as the `key` query parameter
    pub api_key: String,
    /// Model name without the `models/` prefix
    pub model: String,
    /// Prebuilt voice name
    pub voice: String,
    /// WebSocket endpoint (overridable for tests and proxies)
    pub endpoint: String,
    /// Maximum wait for the setup handshake
    pub setup_timeout: Duration,
}

impl Default for GeminiLiveConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            voice: DEFAULT_GEMINI_VOICE.to_string(),
            endpoint: GEMINI_LIVE_URL.to_string(),
            setup_timeout: DEFAULT_SETUP_TIMEOUT,
        }
    }
}

impl GeminiLiveConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.api_key = api_key.into();
        config
    }

    /// Fully qualified model resource name.
    pub fn model_resource(&self) -> String {
        if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        }
    }
}

impl Drop for GeminiLiveConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.api_key.zeroize();
    }
}
