//! Configuration module for the CookChat gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use cookchat_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

mod env;
mod merge;
mod validation;
mod yaml;

use crate::core::realtime::RealtimeProvider;
use crate::core::realtime::gemini::{DEFAULT_GEMINI_MODEL, DEFAULT_GEMINI_VOICE, GEMINI_LIVE_URL};
use crate::core::realtime::openai::{
    DEFAULT_OPENAI_REALTIME_MODEL, DEFAULT_OPENAI_REALTIME_VOICE, OPENAI_REALTIME_URL,
};

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// API secret authentication entry with a client identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthApiSecret {
    pub id: String,
    pub secret: String,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// TLS configuration; `None` serves plain HTTP/WS
    pub tls: Option<TlsConfig>,

    // Realtime upstream
    pub realtime_provider: RealtimeProvider,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_voice: String,
    pub gemini_live_url: String,
    pub openai_api_key: Option<String>,
    pub openai_realtime_model: String,
    pub openai_realtime_voice: String,
    pub openai_realtime_url: String,
    /// Seconds to wait for the upstream setup handshake
    /// Default: 10
    pub realtime_setup_timeout_seconds: u64,
    /// Forward navigation tool calls from the model to clients
    /// Default: false
    pub relay_tool_calls: bool,

    /// JSON recipe catalog loaded at startup; empty catalog when unset
    pub catalog_path: Option<PathBuf>,

    // Authentication
    pub auth_api_secrets: Vec<AuthApiSecret>,
    pub auth_required: bool,

    // Security
    /// CORS allowed origins (comma-separated list or "*")
    /// Default: None (CORS disabled)
    pub cors_allowed_origins: Option<String>,
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Default: 10
    pub rate_limit_burst_size: u32,
    /// Maximum concurrent WebSocket connections
    /// Default: None (unlimited)
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    /// Default: 100
    pub max_connections_per_ip: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            tls: None,
            realtime_provider: RealtimeProvider::default(),
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_voice: DEFAULT_GEMINI_VOICE.to_string(),
            gemini_live_url: GEMINI_LIVE_URL.to_string(),
            openai_api_key: None,
            openai_realtime_model: DEFAULT_OPENAI_REALTIME_MODEL.to_string(),
            openai_realtime_voice: DEFAULT_OPENAI_REALTIME_VOICE.to_string(),
            openai_realtime_url: OPENAI_REALTIME_URL.to_string(),
            realtime_setup_timeout_seconds: 10,
            relay_tool_calls: false,
            catalog_path: None,
            auth_api_secrets: Vec::new(),
            auth_required: false,
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            max_websocket_connections: None,
            max_connections_per_ip: 100,
        }
    }
}

/// Zeroize all secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.gemini_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
        for secret in &mut self.auth_api_secrets {
            secret.secret.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables and defaults
    ///
    /// The `.env` file is loaded in main.rs, so its values are already part of
    /// the environment by the time this runs.
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or validation fails.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Check if API secret authentication is configured
    pub fn has_api_secret_auth(&self) -> bool {
        !self.auth_api_secrets.is_empty()
    }

    /// Find the API secret identifier that matches a bearer token
    pub fn find_api_secret_id(&self, token: &str) -> Option<&str> {
        crate::auth::match_api_secret_id(token, &self.auth_api_secrets)
    }
}

pub(crate) fn parse_auth_api_secrets_json(
    json_str: &str,
) -> Result<Vec<AuthApiSecret>, Box<dyn std::error::Error>> {
    #[derive(serde::Deserialize)]
    struct AuthApiSecretJson {
        id: String,
        secret: String,
    }

    let secrets: Vec<AuthApiSecretJson> = serde_json::from_str(json_str)
        .map_err(|e| format!("Invalid AUTH_API_SECRETS_JSON format: {e}"))?;

    Ok(secrets
        .into_iter()
        .map(|entry| AuthApiSecret {
            id: entry.id,
            secret: entry.secret,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "HOST",
        "PORT",
        "TLS_CERT_PATH",
        "TLS_KEY_PATH",
        "REALTIME_PROVIDER",
        "REALTIME_SETUP_TIMEOUT_SECONDS",
        "REALTIME_RELAY_TOOL_CALLS",
        "GEMINI_API_KEY",
        "GEMINI_MODEL",
        "GEMINI_VOICE",
        "GEMINI_LIVE_URL",
        "OPENAI_API_KEY",
        "OPENAI_REALTIME_MODEL",
        "OPENAI_REALTIME_VOICE",
        "OPENAI_REALTIME_URL",
        "CATALOG_PATH",
        "AUTH_REQUIRED",
        "AUTH_API_SECRET",
        "AUTH_API_SECRET_ID",
        "AUTH_API_SECRETS_JSON",
        "CORS_ALLOWED_ORIGINS",
        "RATE_LIMIT_REQUESTS_PER_SECOND",
        "RATE_LIMIT_BURST_SIZE",
        "MAX_WEBSOCKET_CONNECTIONS",
        "MAX_CONNECTIONS_PER_IP",
    ];

    // Helper to clean up environment variables
    fn cleanup_env_vars() {
        unsafe {
            for var in ENV_VARS {
                env::remove_var(var);
            }
        }
    }

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.yaml");
        fs::write(&path, contents).unwrap();
        path
    }

    fn secret(id: &str, secret: &str) -> AuthApiSecret {
        AuthApiSecret {
            id: id.to_string(),
            secret: secret.to_string(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.address(), "0.0.0.0:3001");
        assert_eq!(config.realtime_provider, RealtimeProvider::Gemini);
        assert_eq!(config.realtime_setup_timeout_seconds, 10);
        assert!(!config.relay_tool_calls);
        assert!(!config.is_tls_enabled());
        assert_eq!(config.max_connections_per_ip, 100);
        assert_eq!(config.max_websocket_connections, None);
    }

    #[test]
    fn test_find_api_secret_id() {
        let mut config = ServerConfig::default();
        config.auth_api_secrets = vec![secret("web", "secret-a"), secret("ios", "secret-b")];

        assert!(config.has_api_secret_auth());
        assert_eq!(config.find_api_secret_id("secret-a"), Some("web"));
        assert_eq!(config.find_api_secret_id("secret-b"), Some("ios"));
        assert_eq!(config.find_api_secret_id("secret-c"), None);
        assert_eq!(config.find_api_secret_id(""), None);
    }

    #[test]
    fn test_parse_auth_api_secrets_json() {
        let secrets =
            parse_auth_api_secrets_json(r#"[{"id":"a","secret":"1"},{"id":"b","secret":"2"}]"#)
                .unwrap();
        assert_eq!(secrets, vec![secret("a", "1"), secret("b", "2")]);

        assert!(parse_auth_api_secrets_json("{not json").is_err());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PORT", "4000");
            env::set_var("GEMINI_API_KEY", "env-gemini-key");
            env::set_var("REALTIME_RELAY_TOOL_CALLS", "true");
            env::set_var("AUTH_API_SECRET", "env-secret");
            env::set_var("MAX_WEBSOCKET_CONNECTIONS", "50");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.gemini_api_key, Some("env-gemini-key".to_string()));
        assert!(config.relay_tool_calls);
        assert_eq!(config.auth_api_secrets, vec![secret("default", "env-secret")]);
        assert_eq!(config.max_websocket_connections, Some(50));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_missing_provider_key() {
        cleanup_env_vars();
        let err = ServerConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_port() {
        cleanup_env_vars();
        unsafe {
            env::set_var("GEMINI_API_KEY", "key");
            env::set_var("PORT", "not-a-port");
        }
        let err = ServerConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("PORT"));
        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_only() {
        cleanup_env_vars();
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            &temp_dir,
            r#"
server:
  host: "127.0.0.1"
  port: 8080

realtime:
  provider: "openai"
  setup_timeout_seconds: 3
  openai:
    api_key: "yaml-openai-key"
    voice: "alloy"

catalog:
  path: "/tmp/catalog.json"
"#,
        );

        let config = ServerConfig::from_file(&path).unwrap();
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert_eq!(config.realtime_provider, RealtimeProvider::OpenAI);
        assert_eq!(config.realtime_setup_timeout_seconds, 3);
        assert_eq!(config.openai_api_key, Some("yaml-openai-key".to_string()));
        assert_eq!(config.openai_realtime_voice, "alloy");
        assert_eq!(config.openai_realtime_model, DEFAULT_OPENAI_REALTIME_MODEL);
        assert_eq!(config.catalog_path, Some(PathBuf::from("/tmp/catalog.json")));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PORT", "4000");
            env::set_var("GEMINI_API_KEY", "env-key");
            env::set_var("GEMINI_VOICE", "Puck");
        }

        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            &temp_dir,
            r#"
server:
  port: 5000
realtime:
  gemini:
    api_key: "yaml-key"
"#,
        );

        let config = ServerConfig::from_file(&path).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.gemini_api_key, Some("yaml-key".to_string()));
        assert_eq!(config.gemini_voice, "Puck");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_with_auth() {
        cleanup_env_vars();
        unsafe {
            env::set_var("GEMINI_API_KEY", "key");
        }

        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            &temp_dir,
            r#"
auth:
  required: true
  api_secrets:
    - id: "web"
      secret: "s1"
    - id: "ios"
      secret: "s2"
"#,
        );

        let config = ServerConfig::from_file(&path).unwrap();
        assert!(config.auth_required);
        assert_eq!(config.find_api_secret_id("s2"), Some("ios"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_auth_required_without_secret() {
        cleanup_env_vars();
        unsafe {
            env::set_var("GEMINI_API_KEY", "key");
        }

        let temp_dir = TempDir::new().unwrap();
        let path = write_config(&temp_dir, "auth:\n  required: true\n");

        assert!(ServerConfig::from_file(&path).is_err());
        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_unknown_provider() {
        cleanup_env_vars();
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(&temp_dir, "realtime:\n  provider: \"hume\"\n");

        let err = ServerConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Unsupported realtime provider"));
        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();
        let result = ServerConfig::from_file(&PathBuf::from("/nonexistent/config.yaml"));
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }
}
