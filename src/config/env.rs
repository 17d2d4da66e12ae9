//! Environment variable loading.
//!
//! Produces a complete [`ServerConfig`] from the process environment, falling
//! back to defaults for anything unset. Empty variables count as unset.

use std::path::PathBuf;
use std::str::FromStr;

use super::{AuthApiSecret, ServerConfig, TlsConfig, parse_auth_api_secrets_json};
use crate::core::realtime::RealtimeProvider;

pub(super) fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(super) fn parse_env<T>(name: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name}: {e}").into()),
        None => Ok(None),
    }
}

pub(super) fn parse_bool(name: &str) -> Result<Option<bool>, Box<dyn std::error::Error>> {
    match env_var(name).map(|v| v.to_lowercase()) {
        Some(v) if matches!(v.as_str(), "true" | "1" | "yes" | "on") => Ok(Some(true)),
        Some(v) if matches!(v.as_str(), "false" | "0" | "no" | "off") => Ok(Some(false)),
        Some(v) => Err(format!("Invalid boolean for {name}: {v}").into()),
        None => Ok(None),
    }
}

pub(super) fn parse_provider(value: &str) -> Result<RealtimeProvider, Box<dyn std::error::Error>> {
    RealtimeProvider::parse(value).ok_or_else(|| {
        format!("Unsupported realtime provider '{value}'. Supported: gemini, openai").into()
    })
}

/// Auth secrets from `AUTH_API_SECRETS_JSON`, or the single
/// `AUTH_API_SECRET` / `AUTH_API_SECRET_ID` pair.
fn auth_api_secrets() -> Result<Vec<AuthApiSecret>, Box<dyn std::error::Error>> {
    if let Some(json) = env_var("AUTH_API_SECRETS_JSON") {
        return parse_auth_api_secrets_json(&json);
    }
    Ok(env_var("AUTH_API_SECRET")
        .map(|secret| {
            vec![AuthApiSecret {
                id: env_var("AUTH_API_SECRET_ID").unwrap_or_else(|| "default".to_string()),
                secret,
            }]
        })
        .unwrap_or_default())
}

/// Load a configuration from environment variables and defaults.
pub(super) fn load() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = ServerConfig::default();

    if let Some(host) = env_var("HOST") {
        config.host = host;
    }
    if let Some(port) = parse_env::<u16>("PORT")? {
        config.port = port;
    }

    config.tls = match (env_var("TLS_CERT_PATH"), env_var("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None) => None,
        _ => return Err("TLS_CERT_PATH and TLS_KEY_PATH must be set together".into()),
    };

    if let Some(provider) = env_var("REALTIME_PROVIDER") {
        config.realtime_provider = parse_provider(&provider)?;
    }
    if let Some(timeout) = parse_env::<u64>("REALTIME_SETUP_TIMEOUT_SECONDS")? {
        config.realtime_setup_timeout_seconds = timeout;
    }
    if let Some(relay) = parse_bool("REALTIME_RELAY_TOOL_CALLS")? {
        config.relay_tool_calls = relay;
    }

    config.gemini_api_key = env_var("GEMINI_API_KEY");
    if let Some(model) = env_var("GEMINI_MODEL") {
        config.gemini_model = model;
    }
    if let Some(voice) = env_var("GEMINI_VOICE") {
        config.gemini_voice = voice;
    }
    if let Some(url) = env_var("GEMINI_LIVE_URL") {
        config.gemini_live_url = url;
    }

    config.openai_api_key = env_var("OPENAI_API_KEY");
    if let Some(model) = env_var("OPENAI_REALTIME_MODEL") {
        config.openai_realtime_model = model;
    }
    if let Some(voice) = env_var("OPENAI_REALTIME_VOICE") {
        config.openai_realtime_voice = voice;
    }
    if let Some(url) = env_var("OPENAI_REALTIME_URL") {
        config.openai_realtime_url = url;
    }

    config.catalog_path = env_var("CATALOG_PATH").map(PathBuf::from);

    config.auth_api_secrets = auth_api_secrets()?;
    if let Some(required) = parse_bool("AUTH_REQUIRED")? {
        config.auth_required = required;
    }

    config.cors_allowed_origins = env_var("CORS_ALLOWED_ORIGINS");
    if let Some(rps) = parse_env::<u32>("RATE_LIMIT_REQUESTS_PER_SECOND")? {
        config.rate_limit_requests_per_second = rps;
    }
    if let Some(burst) = parse_env::<u32>("RATE_LIMIT_BURST_SIZE")? {
        config.rate_limit_burst_size = burst;
    }
    config.max_websocket_connections = parse_env::<usize>("MAX_WEBSOCKET_CONNECTIONS")?;
    if let Some(per_ip) = parse_env::<u32>("MAX_CONNECTIONS_PER_IP")? {
        config.max_connections_per_ip = per_ip;
    }

    Ok(config)
}
