//! Realtime audio-to-audio upstream module.
//!
//! This module provides the upstream abstraction the chat relay talks to and
//! the provider implementations behind it.
//!
//! # Supported Providers
//!
//! - **Gemini Live API** - native-audio Gemini models (default)
//! - **OpenAI Realtime API** - GPT realtime models
//!
//! # Audio Format
//!
//! - Input: PCM 16-bit signed little-endian mono at 16kHz
//! - Gemini output: PCM 16-bit at 24kHz (`audio/pcm;rate=24000`)
//! - OpenAI output: `pcm16` at 24kHz
//!
//! # Example
//!
//! ```rust,ignore
//! use cookchat_gateway::config::ServerConfig;
//! use cookchat_gateway::core::realtime::{SessionSetup, create_connector};
//!
//! let config = ServerConfig::from_env()?;
//! let connector = create_connector(&config)?;
//! let upstream = connector.open(SessionSetup::default()).await?;
//! upstream.send_text("Hello!").await?;
//! ```

mod base;
pub mod gemini;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

pub use base::{
    ConnectionState, FunctionCall, FunctionDefinition, RealtimeError, RealtimeResult,
    SessionSetup, SharedUpstream, UpstreamConnection, UpstreamConnector, UpstreamEvent,
    UpstreamPart,
};
pub use gemini::{GeminiLiveConfig, GeminiLiveConnector};
pub use openai::{OpenAIRealtimeConfig, OpenAIRealtimeConnector};

use crate::config::ServerConfig;

/// Supported realtime providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RealtimeProvider {
    /// Gemini Live API
    #[default]
    Gemini,
    /// OpenAI Realtime API
    OpenAI,
}

impl RealtimeProvider {
    /// Parse provider from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "gemini_live" | "gemini-live" | "google" => Some(RealtimeProvider::Gemini),
            "openai" => Some(RealtimeProvider::OpenAI),
            _ => None,
        }
    }
}

impl std::fmt::Display for RealtimeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RealtimeProvider::Gemini => write!(f, "gemini"),
            RealtimeProvider::OpenAI => write!(f, "openai"),
        }
    }
}

/// Create the upstream connector selected by the server configuration.
pub fn create_connector(config: &ServerConfig) -> RealtimeResult<Arc<dyn UpstreamConnector>> {
    let setup_timeout = Duration::from_secs(config.realtime_setup_timeout_seconds);

    match config.realtime_provider {
        RealtimeProvider::Gemini => {
            let mut gemini =
                GeminiLiveConfig::new(config.gemini_api_key.clone().unwrap_or_default());
            gemini.model = config.gemini_model.clone();
            gemini.voice = config.gemini_voice.clone();
            gemini.endpoint = config.gemini_live_url.clone();
            gemini.setup_timeout = setup_timeout;
            Ok(Arc::new(GeminiLiveConnector::new(gemini)?))
        }
        RealtimeProvider::OpenAI => {
            let mut openai =
                OpenAIRealtimeConfig::new(config.openai_api_key.clone().unwrap_or_default());
            openai.model = config.openai_realtime_model.clone();
            openai.voice = config.openai_realtime_voice.clone();
            openai.endpoint = config.openai_realtime_url.clone();
            openai.setup_timeout = setup_timeout;
            Ok(Arc::new(OpenAIRealtimeConnector::new(openai)?))
        }
    }
}

/// Get list of supported realtime providers.
pub fn get_supported_realtime_providers() -> Vec<&'static str> {
    vec!["gemini", "openai"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_supported_providers() {
        let providers = get_supported_realtime_providers();
        assert!(providers.contains(&"gemini"));
        assert!(providers.contains(&"openai"));
        assert_eq!(providers.len(), 2);
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(RealtimeProvider::parse("gemini"), Some(RealtimeProvider::Gemini));
        assert_eq!(RealtimeProvider::parse("GEMINI"), Some(RealtimeProvider::Gemini));
        assert_eq!(RealtimeProvider::parse("openai"), Some(RealtimeProvider::OpenAI));
        assert_eq!(RealtimeProvider::parse(" OpenAI "), Some(RealtimeProvider::OpenAI));
        assert_eq!(RealtimeProvider::parse("hume"), None);
    }

    #[test]
    fn test_provider_display_round_trips() {
        for provider in [RealtimeProvider::Gemini, RealtimeProvider::OpenAI] {
            assert_eq!(RealtimeProvider::parse(&provider.to_string()), Some(provider));
        }
    }

    #[test]
    fn test_create_connector_gemini() {
        let mut config = ServerConfig::default();
        config.gemini_api_key = Some("test-key".to_string());
        let connector = create_connector(&config).unwrap();
        assert_eq!(connector.provider_name(), "gemini");
    }

    #[test]
    fn test_create_connector_openai() {
        let mut config = ServerConfig::default();
        config.realtime_provider = RealtimeProvider::OpenAI;
        config.openai_api_key = Some("sk-test".to_string());
        let connector = create_connector(&config).unwrap();
        assert_eq!(connector.provider_name(), "openai");
    }

    #[test]
    fn test_create_connector_missing_key() {
        let config = ServerConfig::default();
        assert!(matches!(
            create_connector(&config),
            Err(RealtimeError::AuthenticationFailed(_))
        ));
    }
}
