//! Configuration validation.

use std::collections::HashSet;

use super::{AuthApiSecret, ServerConfig, TlsConfig};
use crate::core::realtime::RealtimeProvider;

type ValidationResult = Result<(), Box<dyn std::error::Error>>;

/// Run every check against a merged configuration.
pub(super) fn validate(config: &ServerConfig) -> ValidationResult {
    validate_realtime_provider(config)?;
    validate_endpoint("GEMINI_LIVE_URL", &config.gemini_live_url)?;
    validate_endpoint("OPENAI_REALTIME_URL", &config.openai_realtime_url)?;
    if config.realtime_setup_timeout_seconds == 0 {
        return Err("REALTIME_SETUP_TIMEOUT_SECONDS must be greater than zero".into());
    }
    validate_auth_api_secrets(&config.auth_api_secrets)?;
    validate_auth_required(config.auth_required, &config.auth_api_secrets)?;
    validate_tls(&config.tls)?;
    Ok(())
}

/// The selected provider must have an API key.
pub(super) fn validate_realtime_provider(config: &ServerConfig) -> ValidationResult {
    let (key, var) = match config.realtime_provider {
        RealtimeProvider::Gemini => (&config.gemini_api_key, "GEMINI_API_KEY"),
        RealtimeProvider::OpenAI => (&config.openai_api_key, "OPENAI_API_KEY"),
    };
    match key.as_deref().map(str::trim) {
        Some(k) if !k.is_empty() => Ok(()),
        _ => Err(format!(
            "Realtime provider '{}' requires {var} to be set",
            config.realtime_provider
        )
        .into()),
    }
}

pub(super) fn validate_endpoint(name: &str, endpoint: &str) -> ValidationResult {
    let url = url::Url::parse(endpoint).map_err(|e| format!("Invalid {name} '{endpoint}': {e}"))?;
    match url.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(format!("{name} must use ws:// or wss://, got {other}://").into()),
    }
}

/// Secret ids must be non-empty and unique, secrets non-empty.
pub(super) fn validate_auth_api_secrets(secrets: &[AuthApiSecret]) -> ValidationResult {
    let mut seen = HashSet::new();
    for entry in secrets {
        if entry.id.trim().is_empty() {
            return Err("Auth API secret id must not be empty".into());
        }
        if entry.secret.is_empty() {
            return Err(format!("Auth API secret '{}' must not be empty", entry.id).into());
        }
        if !seen.insert(entry.id.as_str()) {
            return Err(format!("Duplicate auth API secret id '{}'", entry.id).into());
        }
    }
    Ok(())
}

pub(super) fn validate_auth_required(
    auth_required: bool,
    secrets: &[AuthApiSecret],
) -> ValidationResult {
    if auth_required && secrets.is_empty() {
        return Err(
            "AUTH_REQUIRED is true but no API secret is configured (AUTH_API_SECRET or AUTH_API_SECRETS_JSON)"
                .into(),
        );
    }
    Ok(())
}

pub(super) fn validate_tls(tls: &Option<TlsConfig>) -> ValidationResult {
    if let Some(tls) = tls
        && (tls.cert_path.as_os_str().is_empty() || tls.key_path.as_os_str().is_empty())
    {
        return Err("TLS requires both a certificate path and a key path".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn secret(id: &str, secret: &str) -> AuthApiSecret {
        AuthApiSecret {
            id: id.to_string(),
            secret: secret.to_string(),
        }
    }

    #[test]
    fn test_provider_requires_key() {
        let mut config = ServerConfig::default();
        assert!(validate_realtime_provider(&config).is_err());

        config.gemini_api_key = Some("key".to_string());
        assert!(validate_realtime_provider(&config).is_ok());

        config.realtime_provider = RealtimeProvider::OpenAI;
        let err = validate_realtime_provider(&config).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_endpoint_scheme() {
        assert!(validate_endpoint("URL", "wss://example.com/ws").is_ok());
        assert!(validate_endpoint("URL", "ws://127.0.0.1:9000").is_ok());
        assert!(validate_endpoint("URL", "https://example.com").is_err());
        assert!(validate_endpoint("URL", "not a url").is_err());
    }

    #[test]
    fn test_auth_api_secrets() {
        assert!(validate_auth_api_secrets(&[]).is_ok());
        assert!(validate_auth_api_secrets(&[secret("a", "1"), secret("b", "2")]).is_ok());
        assert!(validate_auth_api_secrets(&[secret("a", "1"), secret("a", "2")]).is_err());
        assert!(validate_auth_api_secrets(&[secret(" ", "1")]).is_err());
        assert!(validate_auth_api_secrets(&[secret("a", "")]).is_err());
    }

    #[test]
    fn test_auth_required() {
        assert!(validate_auth_required(false, &[]).is_ok());
        assert!(validate_auth_required(true, &[]).is_err());
        assert!(validate_auth_required(true, &[secret("a", "1")]).is_ok());
    }

    #[test]
    fn test_tls() {
        assert!(validate_tls(&None).is_ok());
        assert!(
            validate_tls(&Some(TlsConfig {
                cert_path: PathBuf::from("cert.pem"),
                key_path: PathBuf::new(),
            }))
            .is_err()
        );
    }
}
